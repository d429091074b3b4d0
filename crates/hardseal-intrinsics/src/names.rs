//! Name tables: which environment properties get sampled, and under which
//! registry names.
//!
//! A [`NameMap`] pairs an environment-facing property name with the registry
//! name it is collected under.  Universal names map to themselves; shared
//! per-compartment globals are renamed into `%Name%` form so registry keys
//! stay unambiguous about which variant was sampled.

use std::fmt;

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize};

use crate::value::Value;

// ---------------------------------------------------------------------------
// Standard tables
// ---------------------------------------------------------------------------

/// Globals whose registry name equals their environment name.  These are the
/// properties every compartment shares by identity.
pub const UNIVERSAL_PROPERTY_NAMES: &[(&str, &str)] = &[
    // *** Value Properties of the Global Object
    // (constants are seeded directly, not sampled; see `constant_properties`)

    // *** Function Properties of the Global Object
    ("isFinite", "isFinite"),
    ("isNaN", "isNaN"),
    ("parseFloat", "parseFloat"),
    ("parseInt", "parseInt"),
    ("decodeURI", "decodeURI"),
    ("decodeURIComponent", "decodeURIComponent"),
    ("encodeURI", "encodeURI"),
    ("encodeURIComponent", "encodeURIComponent"),
    // *** Constructor Properties of the Global Object
    ("Array", "Array"),
    ("ArrayBuffer", "ArrayBuffer"),
    ("Boolean", "Boolean"),
    ("DataView", "DataView"),
    ("EvalError", "EvalError"),
    ("Float32Array", "Float32Array"),
    ("Float64Array", "Float64Array"),
    ("Int8Array", "Int8Array"),
    ("Int16Array", "Int16Array"),
    ("Int32Array", "Int32Array"),
    ("Map", "Map"),
    ("Number", "Number"),
    ("Object", "Object"),
    ("Promise", "Promise"),
    ("Proxy", "Proxy"),
    ("RangeError", "RangeError"),
    ("ReferenceError", "ReferenceError"),
    ("Set", "Set"),
    ("String", "String"),
    ("SyntaxError", "SyntaxError"),
    ("TypeError", "TypeError"),
    ("Uint8Array", "Uint8Array"),
    ("Uint16Array", "Uint16Array"),
    ("Uint32Array", "Uint32Array"),
    ("URIError", "URIError"),
    ("WeakMap", "WeakMap"),
    ("WeakSet", "WeakSet"),
    // *** Other Properties of the Global Object
    ("JSON", "JSON"),
    ("Math", "Math"),
    ("Reflect", "Reflect"),
    // *** Annex B
    ("escape", "escape"),
    ("unescape", "unescape"),
];

/// Globals that exist once per compartment.  Sampling renames them so the
/// registry records which compartment's copy was audited.
pub const SHARED_GLOBAL_PROPERTY_NAMES: &[(&str, &str)] = &[
    ("Date", "%SharedDate%"),
    ("Error", "%SharedError%"),
    ("RegExp", "%SharedRegExp%"),
    ("Symbol", "Symbol"),
];

/// The value constants every registry starts from.  These never come from
/// the environment; a host that shadows them cannot influence the record.
pub fn constant_properties() -> Vec<(String, Value)> {
    vec![
        ("Infinity".to_string(), Value::Number(f64::INFINITY)),
        ("NaN".to_string(), Value::Number(f64::NAN)),
        ("undefined".to_string(), Value::Undefined),
    ]
}

// ---------------------------------------------------------------------------
// NameMapError
// ---------------------------------------------------------------------------

/// Errors from name table validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameMapError {
    /// A pair has an empty environment or registry name.
    EmptyName,
    /// The same environment name appears twice.
    DuplicateSourceName { name: String },
    /// Two environment names map to the same registry name.
    DuplicateIntrinsicName { name: String },
}

impl fmt::Display for NameMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "name map entries must be non-empty"),
            Self::DuplicateSourceName { name } => {
                write!(f, "environment name `{name}` appears twice in name map")
            }
            Self::DuplicateIntrinsicName { name } => {
                write!(f, "registry name `{name}` appears twice in name map")
            }
        }
    }
}

impl std::error::Error for NameMapError {}

// ---------------------------------------------------------------------------
// NameMap
// ---------------------------------------------------------------------------

/// An ordered environment-name to registry-name table.
///
/// Both columns are unique: a duplicate environment name would make the
/// sample order-dependent, and a duplicate registry name would alias two
/// samples onto one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NameMap {
    pairs: Vec<(String, String)>,
}

impl NameMap {
    /// Validate and wrap a pair list.
    pub fn new(pairs: Vec<(String, String)>) -> Result<Self, NameMapError> {
        for (index, (source, intrinsic)) in pairs.iter().enumerate() {
            if source.is_empty() || intrinsic.is_empty() {
                return Err(NameMapError::EmptyName);
            }
            for (earlier_source, earlier_intrinsic) in &pairs[..index] {
                if earlier_source == source {
                    return Err(NameMapError::DuplicateSourceName {
                        name: source.clone(),
                    });
                }
                if earlier_intrinsic == intrinsic {
                    return Err(NameMapError::DuplicateIntrinsicName {
                        name: intrinsic.clone(),
                    });
                }
            }
        }
        Ok(Self { pairs })
    }

    /// Validate and wrap a borrowed pair table.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self, NameMapError> {
        Self::new(
            pairs
                .iter()
                .map(|(source, intrinsic)| ((*source).to_string(), (*intrinsic).to_string()))
                .collect(),
        )
    }

    /// Iterate `(environment_name, registry_name)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|(source, intrinsic)| (source.as_str(), intrinsic.as_str()))
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<'de> Deserialize<'de> for NameMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pairs = Vec::<(String, String)>::deserialize(deserializer)?;
        Self::new(pairs).map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// NameTables
// ---------------------------------------------------------------------------

/// The three inputs the collector seeds and samples from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameTables {
    /// Seeded value constants, bound before any sampling.
    pub constants: Vec<(String, Value)>,
    /// Universal names sampled during collector construction.
    pub universal: NameMap,
    /// Shared per-compartment names sampled by the global intrinsics pass.
    pub shared_global: NameMap,
}

impl NameTables {
    /// The standard tables.
    pub fn standard() -> Self {
        // The standard tables are duplicate-free by inspection.
        Self {
            constants: constant_properties(),
            universal: NameMap {
                pairs: UNIVERSAL_PROPERTY_NAMES
                    .iter()
                    .map(|(s, i)| ((*s).to_string(), (*i).to_string()))
                    .collect(),
            },
            shared_global: NameMap {
                pairs: SHARED_GLOBAL_PROPERTY_NAMES
                    .iter()
                    .map(|(s, i)| ((*s).to_string(), (*i).to_string()))
                    .collect(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
