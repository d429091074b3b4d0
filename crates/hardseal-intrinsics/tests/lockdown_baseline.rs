use hardseal_intrinsics::{
    CollectorError, CollectorState, HostObject, IntrinsicsCollector, IntrinsicsFragment, NameMap,
    NameTables, ObjectHandle, ObjectHeap, Permit, PermitSpec, PropertyDescriptor, Value,
    sample_global_intrinsics, sample_globals,
};
use std::collections::BTreeMap;

fn define_global(heap: &mut ObjectHeap, env: ObjectHandle, name: &str, handle: ObjectHandle) {
    heap.get_mut(env)
        .expect("environment object")
        .define_own_property(name, PropertyDescriptor::data(Value::Object(handle)))
        .expect("define global");
}

/// A host environment exposing a representative slice of the standard
/// globals: constructor pairs, plain builtin functions, and namespaces.
/// Names the standard tables list but this host lacks (typed arrays,
/// `Proxy`, the error subclasses) stay absent on purpose.
fn standard_environment() -> (ObjectHeap, ObjectHandle) {
    let mut heap = ObjectHeap::new();
    let env = heap.alloc_plain();
    for name in [
        "Array", "ArrayBuffer", "Boolean", "Map", "Number", "Object", "Promise", "Set", "String",
        "WeakMap", "Date", "Error", "RegExp", "Symbol",
    ] {
        let (ctor, _) = heap.alloc_constructor(name).expect("constructor pair");
        define_global(&mut heap, env, name, ctor);
    }
    for name in [
        "isFinite",
        "isNaN",
        "parseFloat",
        "parseInt",
        "decodeURI",
        "decodeURIComponent",
        "encodeURI",
        "encodeURIComponent",
        "escape",
        "unescape",
    ] {
        let function = heap.alloc_function();
        define_global(&mut heap, env, name, function);
    }
    for name in ["JSON", "Math", "Reflect"] {
        let namespace = heap.alloc(HostObject::new().with_class_tag(name));
        define_global(&mut heap, env, name, namespace);
    }
    (heap, env)
}

fn global_value(heap: &ObjectHeap, env: ObjectHandle, name: &str) -> Value {
    heap.own_property(env, name)
        .expect("environment object")
        .unwrap_or_else(|| panic!("global `{name}`"))
        .value()
        .cloned()
        .expect("data-valued global")
}

fn prototype_of_global(heap: &ObjectHeap, env: ObjectHandle, name: &str) -> Value {
    let Value::Object(ctor) = global_value(heap, env, name) else {
        panic!("global `{name}` is not an object");
    };
    heap.own_property(ctor, "prototype")
        .expect("constructor")
        .expect("own prototype property")
        .value()
        .cloned()
        .expect("data-valued prototype")
}

// -- Minimal permit scenario -------------------------------------------------

#[test]
fn minimal_permit_scenario_completes_and_freezes() {
    let mut heap = ObjectHeap::new();
    let env = heap.alloc_plain();
    let (array_ctor, array_proto) = heap.alloc_constructor("Array").expect("constructor pair");
    define_global(&mut heap, env, "Array", array_ctor);

    let permits = PermitSpec::new(BTreeMap::from([
        ("Array".to_string(), Permit::with_prototype("ArrayPrototype")),
        ("ArrayPrototype".to_string(), Permit::new()),
    ]))
    .expect("permits");
    let tables = NameTables {
        constants: Vec::new(),
        universal: NameMap::from_pairs(&[("Array", "Array")]).expect("universal"),
        shared_global: NameMap::from_pairs(&[]).expect("shared"),
    };

    let mut collector = IntrinsicsCollector::new(&heap, env, permits, &tables).expect("collector");
    collector.complete_prototypes(&heap).expect("completion");
    let frozen = collector.final_intrinsics(&heap).expect("finalize");

    assert_eq!(frozen.len(), 2);
    assert_eq!(frozen.value_of("Array"), Some(&Value::Object(array_ctor)));
    assert_eq!(
        frozen.value_of("ArrayPrototype"),
        Some(&Value::Object(array_proto))
    );
    assert!(collector
        .is_pseudo_native(&Value::Object(array_ctor))
        .expect("oracle"));
    assert!(!collector
        .is_pseudo_native(&Value::Object(array_proto))
        .expect("oracle"));
}

#[test]
fn conflicting_sources_abort_the_build_naming_the_key() {
    let (mut heap, env) = standard_environment();
    let impostor = heap.alloc(HostObject::constructor().with_class_tag("Array"));

    let mut collector = IntrinsicsCollector::new(
        &heap,
        env,
        PermitSpec::standard(),
        &NameTables::standard(),
    )
    .expect("collector");

    let mut fragment = IntrinsicsFragment::new();
    fragment.insert_value("Array", Value::Object(impostor));
    let err = collector.add_intrinsics(fragment).unwrap_err();
    assert!(matches!(
        err,
        CollectorError::Conflict(ref conflict) if conflict.name == "Array"
    ));
    assert!(err.to_string().contains("Array"));
}

// -- Full standard build -------------------------------------------------------

#[test]
fn full_standard_environment_builds_a_verified_baseline() {
    let (heap, env) = standard_environment();
    let tables = NameTables::standard();
    let mut collector =
        IntrinsicsCollector::new(&heap, env, PermitSpec::standard(), &tables).expect("collector");

    let shared = sample_globals(&heap, env, &tables.shared_global).expect("shared sample");
    collector.add_intrinsics(shared).expect("merge shared");
    collector.complete_prototypes(&heap).expect("completion");
    let frozen = collector.final_intrinsics(&heap).expect("finalize");

    assert_eq!(collector.state(), CollectorState::Finalized);

    // Seeded constants.
    assert_eq!(frozen.value_of("undefined"), Some(&Value::Undefined));
    assert!(frozen
        .value_of("NaN")
        .expect("NaN")
        .same_value(&Value::Number(f64::NAN)));

    // Universal sample, with absent hosts' names skipped.
    assert_eq!(frozen.value_of("Array"), Some(&global_value(&heap, env, "Array")));
    assert!(frozen.contains("Math"));
    assert!(!frozen.contains("EvalError"));
    assert!(!frozen.contains("Proxy"));

    // Shared globals land under their registry names only.
    assert_eq!(
        frozen.value_of("%SharedDate%"),
        Some(&global_value(&heap, env, "Date"))
    );
    assert!(!frozen.contains("Date"));

    // Completion closed every sampled constructor over its prototype.
    assert_eq!(
        frozen.value_of("%ArrayPrototype%"),
        Some(&prototype_of_global(&heap, env, "Array"))
    );
    assert_eq!(
        frozen.value_of("%DatePrototype%"),
        Some(&prototype_of_global(&heap, env, "Date"))
    );
    assert_eq!(
        frozen.value_of("%SymbolPrototype%"),
        Some(&prototype_of_global(&heap, env, "Symbol"))
    );

    // Trust oracle: callables in, namespaces and prototypes out.
    let array = global_value(&heap, env, "Array");
    let math = global_value(&heap, env, "Math");
    assert!(collector.is_pseudo_native(&array).expect("oracle"));
    assert!(!collector.is_pseudo_native(&math).expect("oracle"));
    assert!(!collector
        .is_pseudo_native(&prototype_of_global(&heap, env, "Array"))
        .expect("oracle"));

    assert_eq!(frozen.baseline_digest().expect("digest").len(), 64);
}

#[test]
fn identical_environments_digest_identically_across_collectors() {
    let (heap, env) = standard_environment();
    let build = || {
        let tables = NameTables::standard();
        let mut collector =
            IntrinsicsCollector::new(&heap, env, PermitSpec::standard(), &tables)
                .expect("collector");
        let shared = sample_globals(&heap, env, &tables.shared_global).expect("shared sample");
        collector.add_intrinsics(shared).expect("merge shared");
        collector.complete_prototypes(&heap).expect("completion");
        collector.final_intrinsics(&heap).expect("finalize")
    };
    let first = build().baseline_digest().expect("digest");
    let second = build().baseline_digest().expect("digest");
    assert_eq!(first, second);
}

#[test]
fn post_freeze_mutations_are_rejected_but_reads_survive() {
    let (heap, env) = standard_environment();
    let mut collector = IntrinsicsCollector::new(
        &heap,
        env,
        PermitSpec::standard(),
        &NameTables::standard(),
    )
    .expect("collector");
    collector.complete_prototypes(&heap).expect("completion");
    let frozen = collector.final_intrinsics(&heap).expect("finalize");

    let mut fragment = IntrinsicsFragment::new();
    fragment.insert_value("Sneaky", Value::Null);
    let err = collector.add_intrinsics(fragment).unwrap_err();
    assert!(matches!(err, CollectorError::CollectorFinalized { .. }));

    // The frozen snapshot and the oracle are unaffected by the attempt.
    assert!(!frozen.contains("Sneaky"));
    assert!(!collector.registry().contains("Sneaky"));
    assert!(collector
        .is_pseudo_native(&global_value(&heap, env, "isFinite"))
        .expect("oracle"));
}

// -- Convenience shared sampling ------------------------------------------------

#[test]
fn shared_sampling_freezes_without_prototype_completion() {
    let (heap, env) = standard_environment();
    let frozen = sample_global_intrinsics(
        &heap,
        env,
        PermitSpec::standard(),
        &NameTables::standard(),
    )
    .expect("frozen");

    assert_eq!(
        frozen.value_of("%SharedRegExp%"),
        Some(&global_value(&heap, env, "RegExp"))
    );
    assert!(frozen.contains("Symbol"));
    assert!(frozen.contains("Array"));
    assert!(!frozen.contains("%ArrayPrototype%"));
    assert!(!frozen.contains("%RegExpPrototype%"));
}

// -- Permit authoring ---------------------------------------------------------------

#[test]
fn json_authored_permits_drive_completion() {
    let mut heap = ObjectHeap::new();
    let env = heap.alloc_plain();
    let (point, point_proto) = heap.alloc_constructor("Point").expect("constructor pair");
    define_global(&mut heap, env, "Point", point);

    let permits: PermitSpec = serde_json::from_str(
        r#"{
            "Point": { "prototype": "%PointPrototype%", "from": "host-api" },
            "%PointPrototype%": { "constructor": "Point" }
        }"#,
    )
    .expect("permit document");
    let tables = NameTables {
        constants: Vec::new(),
        universal: NameMap::from_pairs(&[("Point", "Point")]).expect("universal"),
        shared_global: NameMap::from_pairs(&[]).expect("shared"),
    };

    let mut collector = IntrinsicsCollector::new(&heap, env, permits, &tables).expect("collector");
    collector.complete_prototypes(&heap).expect("completion");
    let frozen = collector.final_intrinsics(&heap).expect("finalize");
    assert_eq!(
        frozen.value_of("%PointPrototype%"),
        Some(&Value::Object(point_proto))
    );
}

#[test]
fn standard_permits_cover_every_standard_table_name() {
    let permits = PermitSpec::standard();
    let tables = NameTables::standard();
    for (name, _) in &tables.constants {
        assert!(permits.contains(name), "constant `{name}` lacks a permit");
    }
    for (_, intrinsic) in tables.universal.iter() {
        assert!(permits.contains(intrinsic), "universal `{intrinsic}` lacks a permit");
    }
    for (_, intrinsic) in tables.shared_global.iter() {
        assert!(permits.contains(intrinsic), "shared `{intrinsic}` lacks a permit");
    }
}
