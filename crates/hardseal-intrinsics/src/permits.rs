//! Permit specification: the static description of which intrinsics may
//! exist and how constructors link to their prototype objects.
//!
//! A permit record is opaque to the collector except for its optional
//! `prototype` field, which names the registry entry the permitted object's
//! own `prototype` property must resolve to.  Every other attribute rides
//! along untouched so that outer audit layers can keep their per-property
//! permit detail in the same document.
//!
//! A [`PermitSpec`] is validated at construction: every non-empty prototype
//! link must resolve to another permit in the same specification.  The same
//! validation runs on deserialization, so a spec loaded from JSON carries
//! the same guarantee as one built in code.

use std::collections::BTreeMap;

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Standard permit tables
// ---------------------------------------------------------------------------

/// Permitted globals with no prototype link: builtin functions, namespace
/// objects, the three value constants, and `Proxy` (which has no own
/// `prototype` property).
pub const STANDARD_PLAIN_PERMITS: &[&str] = &[
    "Infinity",
    "JSON",
    "Math",
    "NaN",
    "Proxy",
    "Reflect",
    "decodeURI",
    "decodeURIComponent",
    "encodeURI",
    "encodeURIComponent",
    "escape",
    "isFinite",
    "isNaN",
    "parseFloat",
    "parseInt",
    "undefined",
    "unescape",
];

/// Constructor permits paired with the registry name of their prototype
/// object.  Shared (per-compartment) constructors keep the canonical
/// prototype record name.
pub const STANDARD_PROTOTYPE_LINKS: &[(&str, &str)] = &[
    ("Array", "%ArrayPrototype%"),
    ("ArrayBuffer", "%ArrayBufferPrototype%"),
    ("Boolean", "%BooleanPrototype%"),
    ("DataView", "%DataViewPrototype%"),
    ("EvalError", "%EvalErrorPrototype%"),
    ("Float32Array", "%Float32ArrayPrototype%"),
    ("Float64Array", "%Float64ArrayPrototype%"),
    ("Int16Array", "%Int16ArrayPrototype%"),
    ("Int32Array", "%Int32ArrayPrototype%"),
    ("Int8Array", "%Int8ArrayPrototype%"),
    ("Map", "%MapPrototype%"),
    ("Number", "%NumberPrototype%"),
    ("Object", "%ObjectPrototype%"),
    ("Promise", "%PromisePrototype%"),
    ("RangeError", "%RangeErrorPrototype%"),
    ("ReferenceError", "%ReferenceErrorPrototype%"),
    ("Set", "%SetPrototype%"),
    ("String", "%StringPrototype%"),
    ("Symbol", "%SymbolPrototype%"),
    ("SyntaxError", "%SyntaxErrorPrototype%"),
    ("TypeError", "%TypeErrorPrototype%"),
    ("URIError", "%URIErrorPrototype%"),
    ("Uint16Array", "%Uint16ArrayPrototype%"),
    ("Uint32Array", "%Uint32ArrayPrototype%"),
    ("Uint8Array", "%Uint8ArrayPrototype%"),
    ("WeakMap", "%WeakMapPrototype%"),
    ("WeakSet", "%WeakSetPrototype%"),
    ("%SharedDate%", "%DatePrototype%"),
    ("%SharedError%", "%ErrorPrototype%"),
    ("%SharedRegExp%", "%RegExpPrototype%"),
];

// ---------------------------------------------------------------------------
// Permit
// ---------------------------------------------------------------------------

/// A single permit record.
///
/// Only `prototype` is interpreted here.  Everything else in the record is
/// preserved verbatim in `attributes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit {
    /// Registry name the permitted object's own `prototype` property must
    /// resolve to, when the object has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prototype: Option<String>,
    /// Uninterpreted permit detail for outer audit layers.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, JsonValue>,
}

impl Permit {
    /// A permit with no prototype link and no extra attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A permit whose object must link to the named prototype entry.
    pub fn with_prototype(name: impl Into<String>) -> Self {
        Self {
            prototype: Some(name.into()),
            ..Self::default()
        }
    }

    /// Attach an uninterpreted attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// PermitError
// ---------------------------------------------------------------------------

/// Errors raised by permit lookup and specification validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum PermitError {
    /// The specification has no record for the named intrinsic.
    #[error("no permit for intrinsic `{name}`")]
    MissingPermit { name: String },
    /// The record exists but does not permit a prototype link.
    #[error("`{name}.prototype` is not permitted")]
    PrototypeNotPermitted { name: String },
    /// The record names a prototype that is not itself in the specification.
    #[error("`{name}.prototype` names unrecognized permit `{prototype}`")]
    UnresolvedPrototype { name: String, prototype: String },
}

// ---------------------------------------------------------------------------
// PermitSpec
// ---------------------------------------------------------------------------

/// A validated permit specification, keyed by intrinsic name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermitSpec {
    permits: BTreeMap<String, Permit>,
}

impl PermitSpec {
    /// Validate and wrap a permit map.
    ///
    /// Every non-empty `prototype` link must name another permit in the same
    /// map.  An empty-string link is tolerated here and rejected only if the
    /// prototype completion pass reaches it, matching the lookup contract of
    /// [`PermitSpec::prototype_of`].
    pub fn new(permits: BTreeMap<String, Permit>) -> Result<Self, PermitError> {
        for (name, permit) in &permits {
            if let Some(prototype) = permit.prototype.as_deref()
                && !prototype.is_empty()
                && !permits.contains_key(prototype)
            {
                return Err(PermitError::UnresolvedPrototype {
                    name: name.clone(),
                    prototype: prototype.to_string(),
                });
            }
        }
        Ok(Self { permits })
    }

    /// The permit specification for the standard shared globals.
    pub fn standard() -> Self {
        let mut permits = BTreeMap::new();
        for name in STANDARD_PLAIN_PERMITS {
            permits.insert((*name).to_string(), Permit::new());
        }
        for (constructor, prototype) in STANDARD_PROTOTYPE_LINKS {
            permits.insert((*constructor).to_string(), Permit::with_prototype(*prototype));
            permits.insert(
                (*prototype).to_string(),
                Permit::new().with_attribute("constructor", *constructor),
            );
        }
        // Links above all target permits inserted in the same loop.
        Self { permits }
    }

    /// The permit for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Permit> {
        self.permits.get(name)
    }

    /// Is `name` permitted at all?
    pub fn contains(&self, name: &str) -> bool {
        self.permits.contains_key(name)
    }

    /// Resolve the prototype link for `name`.
    ///
    /// Fails fatally rather than degrading: a missing permit, a permit with
    /// no usable `prototype` field, and a dangling link each get their own
    /// error so audits can tell misconfiguration from tampering.
    pub fn prototype_of(&self, name: &str) -> Result<&str, PermitError> {
        let permit = self.permits.get(name).ok_or_else(|| PermitError::MissingPermit {
            name: name.to_string(),
        })?;
        let prototype = permit
            .prototype
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PermitError::PrototypeNotPermitted {
                name: name.to_string(),
            })?;
        if !self.permits.contains_key(prototype) {
            return Err(PermitError::UnresolvedPrototype {
                name: name.to_string(),
                prototype: prototype.to_string(),
            });
        }
        Ok(prototype)
    }

    /// Iterate permits in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Permit)> {
        self.permits.iter().map(|(name, permit)| (name.as_str(), permit))
    }

    /// Number of permit records.
    pub fn len(&self) -> usize {
        self.permits.len()
    }

    /// Is the specification empty?
    pub fn is_empty(&self) -> bool {
        self.permits.is_empty()
    }
}

// Deserialization re-runs construction validation so a JSON-loaded spec is
// as trustworthy as one built in code.
impl<'de> Deserialize<'de> for PermitSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let permits = BTreeMap::<String, Permit>::deserialize(deserializer)?;
        Self::new(permits).map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
