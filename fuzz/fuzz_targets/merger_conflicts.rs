#![no_main]

use std::collections::BTreeMap;

use hardseal_intrinsics::{
    IntrinsicsRegistry, ObjectHandle, PropertyDescriptor, Value,
};
use libfuzzer_sys::fuzz_target;

const MAX_OPS: usize = 64;
const OP_WIDTH: usize = 4;

const NAME_POOL: &[&str] = &[
    "Array",
    "Math",
    "NaN",
    "undefined",
    "%ArrayPrototype%",
    "%SharedDate%",
    "isFinite",
    "Symbol",
];

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    run_merge_program(data);
});

/// Replay a byte-driven sequence of registrations against both the real
/// registry and a first-writer model map.  The merger must accept exactly
/// the registrations the model accepts, name the right key on conflict, and
/// never let a later registration displace an earlier one.
fn run_merge_program(data: &[u8]) {
    let mut registry = IntrinsicsRegistry::new();
    let mut model: BTreeMap<String, PropertyDescriptor> = BTreeMap::new();

    let ops = (data.len() / OP_WIDTH).min(MAX_OPS);
    for op in 0..ops {
        let base = op * OP_WIDTH;
        let name = NAME_POOL[usize::from(byte(data, base)) % NAME_POOL.len()];
        let desc = make_descriptor(byte(data, base + 1), byte(data, base + 2), byte(data, base + 3));

        let result = registry.define(name, desc.clone());
        match model.get(name) {
            None => {
                assert!(result.is_ok(), "fresh name `{name}` rejected");
                model.insert(name.to_string(), desc);
            }
            Some(existing) if existing.same_descriptor(&desc) => {
                assert!(result.is_ok(), "idempotent redefinition of `{name}` rejected");
            }
            Some(_) => {
                let err = result.expect_err("conflicting redefinition accepted");
                assert_eq!(err.name, name);
            }
        }

        let bound = registry.get(name).expect("defined name lost");
        let expected = model.get(name).expect("model entry");
        assert!(
            bound.same_descriptor(expected),
            "first writer displaced for `{name}`"
        );
    }

    assert_eq!(registry.len(), model.len());
    let names: Vec<&str> = registry.names().collect();
    let expected: Vec<&str> = model.keys().map(String::as_str).collect();
    assert_eq!(names, expected);
}

fn make_descriptor(kind: u8, value_sel: u8, attrs: u8) -> PropertyDescriptor {
    if kind % 4 == 0 {
        PropertyDescriptor::Accessor {
            get: (value_sel % 3 != 0).then_some(ObjectHandle(u32::from(value_sel % 5))),
            set: (value_sel % 2 != 0).then_some(ObjectHandle(u32::from(value_sel % 7))),
            enumerable: attrs & 0b01 != 0,
            configurable: attrs & 0b10 != 0,
        }
    } else {
        PropertyDescriptor::Data {
            value: make_value(value_sel),
            writable: attrs & 0b001 != 0,
            enumerable: attrs & 0b010 != 0,
            configurable: attrs & 0b100 != 0,
        }
    }
}

fn make_value(selector: u8) -> Value {
    match selector % 8 {
        0 => Value::Undefined,
        1 => Value::Null,
        2 => Value::Bool(selector % 2 == 0),
        3 => Value::Number(f64::NAN),
        4 => Value::Number(0.0),
        5 => Value::Number(-0.0),
        6 => Value::Str(format!("s{}", selector / 8)),
        _ => Value::Object(ObjectHandle(u32::from(selector) / 8)),
    }
}

fn byte(data: &[u8], index: usize) -> u8 {
    if data.is_empty() {
        return 0;
    }
    data[index % data.len()]
}
