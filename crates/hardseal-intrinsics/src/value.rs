//! Runtime values for sampled host environments.
//!
//! The registry never executes host code; it only records values that an
//! embedder sampled out of an environment object.  Primitives are carried
//! inline, objects by [`ObjectHandle`] so that two values denote the same
//! host object exactly when their handles are equal.
//!
//! Equality on [`Value`] is SameValue (ES2020 §7.2.10), not `==` on the IEEE
//! payload: `NaN` equals `NaN`, and `+0.0` is distinct from `-0.0`.  This is
//! the comparison the conflict detector and the prototype completion pass
//! rely on, so it is the only equality the type exposes.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ObjectHandle — typed reference to heap objects
// ---------------------------------------------------------------------------

/// Opaque handle referencing an object on the managed heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u32);

// ---------------------------------------------------------------------------
// Value — runtime value sampled from a host environment
// ---------------------------------------------------------------------------

/// Serialize/deserialize the `f64` payload of [`Value::Number`] as its
/// IEEE-754 bit pattern.  serde_json encodes non-finite floats as `null`,
/// which would collapse `Infinity`, `-Infinity`, and `NaN` into one byte
/// representation and lose the `-0.0` sign bit; the bit pattern keeps every
/// number distinct and round-trip exact.
mod number_bits {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        value.to_bits().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let bits = u64::deserialize(deserializer)?;
        Ok(f64::from_bits(bits))
    }
}

/// A sampled runtime value.
///
/// `PartialEq`/`Eq` implement SameValue, so `Value` can sit directly inside
/// derived comparisons of descriptors and registry snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(#[serde(with = "number_bits")] f64),
    Str(String),
    Object(ObjectHandle),
}

impl Value {
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
        }
    }

    /// SameValue comparison (ES2020 §7.2.10).
    pub fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => same_value_number(*a, *b),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

// SameValue is reflexive (NaN equals NaN), so total equality holds.
impl Eq for Value {}

/// SameValue on numbers: every NaN equals every NaN, and otherwise two
/// numbers are the same exactly when their bit patterns agree, which keeps
/// `+0.0` and `-0.0` distinct.
fn same_value_number(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    a.to_bits() == b.to_bits()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Object(h) => write!(f, "[object#{}]", h.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
