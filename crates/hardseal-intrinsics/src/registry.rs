//! The registry itself: a conflict-detecting map from intrinsic name to
//! property descriptor.
//!
//! Registration never overwrites.  A name may be defined any number of
//! times, but every definition after the first must be the same descriptor
//! under full-descriptor SameValue comparison, or the registration fails
//! and the build aborts.  Two honest sources describing the same
//! environment always agree; disagreement means misconfiguration or a
//! tampered input, and both are fatal.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::object_model::PropertyDescriptor;
use crate::value::Value;

// ---------------------------------------------------------------------------
// ConflictingDefinition
// ---------------------------------------------------------------------------

/// Two registrations disagreed about the named intrinsic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingDefinition {
    /// The registry name both registrations claimed.
    pub name: String,
}

impl fmt::Display for ConflictingDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conflicting definitions of `{}`", self.name)
    }
}

impl std::error::Error for ConflictingDefinition {}

// ---------------------------------------------------------------------------
// IntrinsicsFragment
// ---------------------------------------------------------------------------

/// A batch of named descriptors destined for the registry: the output of a
/// sampling pass or a hand-built set of additional intrinsics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrinsicsFragment {
    entries: BTreeMap<String, PropertyDescriptor>,
}

impl IntrinsicsFragment {
    /// Create an empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor, replacing any previous entry under the same name.
    /// Within one fragment the author is the single source, so this is a
    /// plain map write rather than a merge.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        desc: PropertyDescriptor,
    ) -> Option<PropertyDescriptor> {
        self.entries.insert(name.into(), desc)
    }

    /// Add a value as a default data descriptor (writable, enumerable,
    /// configurable), the shape a literal seed object carries.
    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        self.insert(name, PropertyDescriptor::data(value));
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyDescriptor)> {
        self.entries.iter().map(|(name, desc)| (name.as_str(), desc))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the fragment empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for IntrinsicsFragment {
    type Item = (String, PropertyDescriptor);
    type IntoIter = std::collections::btree_map::IntoIter<String, PropertyDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, PropertyDescriptor)> for IntrinsicsFragment {
    fn from_iter<I: IntoIterator<Item = (String, PropertyDescriptor)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// IntrinsicsRegistry — the safe merger
// ---------------------------------------------------------------------------

/// The conflict-detecting registry.  Grows monotonically; entries are never
/// removed or replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrinsicsRegistry {
    entries: BTreeMap<String, PropertyDescriptor>,
}

impl IntrinsicsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one descriptor.
    ///
    /// A repeat registration must match the existing descriptor under
    /// full-descriptor SameValue comparison; any difference in value,
    /// getter/setter identity, or attributes fails with the offending name.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        desc: PropertyDescriptor,
    ) -> Result<(), ConflictingDefinition> {
        let name = name.into();
        if let Some(existing) = self.entries.get(&name) {
            if !existing.same_descriptor(&desc) {
                return Err(ConflictingDefinition { name });
            }
            return Ok(());
        }
        self.entries.insert(name, desc);
        Ok(())
    }

    /// Register every entry of a fragment, failing on the first conflict.
    pub fn merge(&mut self, fragment: IntrinsicsFragment) -> Result<(), ConflictingDefinition> {
        for (name, desc) in fragment {
            self.define(name, desc)?;
        }
        Ok(())
    }

    /// First-writer insertion used by the prototype completion pass, which
    /// has already ruled the name absent and identity-checked any existing
    /// binding itself.
    pub(crate) fn bind(&mut self, name: String, value: Value) {
        debug_assert!(!self.entries.contains_key(&name));
        self.entries.insert(name, PropertyDescriptor::data(value));
    }

    /// The descriptor bound to `name`, if any.
    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.entries.get(name)
    }

    /// The data value bound to `name`, if the entry is a data descriptor.
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).and_then(PropertyDescriptor::value)
    }

    /// Is `name` bound?
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate bound names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyDescriptor)> {
        self.entries.iter().map(|(name, desc)| (name.as_str(), desc))
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the registry empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clone the entry map, for snapshotting at finalization.
    pub(crate) fn snapshot(&self) -> BTreeMap<String, PropertyDescriptor> {
        self.entries.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
