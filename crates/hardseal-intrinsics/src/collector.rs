//! The intrinsics collector: accumulate, verify, complete, freeze.
//!
//! A collector is born self-seeded (the value constants plus a
//! universal-names sample of the ambient environment), accepts further
//! fragments through the safe merger, closes the registry under permitted
//! `prototype` links, and finalizes exactly once into a [`FrozenIntrinsics`]
//! snapshot plus a trust oracle over callable members.
//!
//! Every build-phase mutation appends a structured [`CollectorEvent`], so a
//! finished or aborted build carries its own audit trail.  All failures are
//! fatal: a partially verified baseline is never trustworthy, so there is no
//! degraded mode and no partial success.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::names::{NameMap, NameTables};
use crate::object_model::{HeapError, ObjectHeap, PropertyDescriptor};
use crate::permits::{PermitError, PermitSpec};
use crate::registry::{ConflictingDefinition, IntrinsicsFragment, IntrinsicsRegistry};
use crate::value::{ObjectHandle, Value};

/// Component tag carried by every event this module records.
pub const COMPONENT: &str = "intrinsics_collector";

// ---------------------------------------------------------------------------
// Error codes (append-only; never renumber)
// ---------------------------------------------------------------------------

/// Two registrations disagreed on a descriptor.
pub const HS_CONFLICTING_DEFINITION: &str = "HS-1001";
/// An object-valued intrinsic with an own `prototype` property has no permit.
pub const HS_MISSING_PERMIT: &str = "HS-1002";
/// The permit exists but its `prototype` field is missing or empty.
pub const HS_PROTOTYPE_NOT_PERMITTED: &str = "HS-1003";
/// The permit's `prototype` field names a key absent from the specification.
pub const HS_UNRESOLVED_PROTOTYPE: &str = "HS-1004";
/// The same prototype name is claimed by two distinct objects.
pub const HS_PROTOTYPE_IDENTITY_CONFLICT: &str = "HS-1005";
/// `is_pseudo_native` was queried before finalization.
pub const HS_TRUST_ORACLE_UNAVAILABLE: &str = "HS-1006";
/// A build-phase operation was invoked after finalization.
pub const HS_COLLECTOR_FINALIZED: &str = "HS-1007";
/// A heap lookup failed during sampling, completion, or finalization.
pub const HS_HEAP_FAULT: &str = "HS-1008";
/// Canonical encoding of the frozen registry failed.
pub const HS_ENCODING: &str = "HS-1009";

// ---------------------------------------------------------------------------
// CollectorError
// ---------------------------------------------------------------------------

/// Errors raised while building or querying an intrinsics baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectorError {
    /// Safe-merger conflict.
    Conflict(ConflictingDefinition),
    /// Permit lookup or validation failure.
    Permit(PermitError),
    /// Two distinct objects claimed the same prototype name.
    PrototypeIdentityConflict { name: String, constructor: String },
    /// Trust oracle queried before `final_intrinsics`.
    TrustOracleUnavailable,
    /// Build-phase operation after `final_intrinsics`.
    CollectorFinalized { operation: String },
    /// Heap lookup failure.
    Heap(HeapError),
    /// Canonical encoding failure while digesting a frozen registry.
    Encoding { detail: String },
}

impl CollectorError {
    /// Stable error code for audit records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict(_) => HS_CONFLICTING_DEFINITION,
            Self::Permit(PermitError::MissingPermit { .. }) => HS_MISSING_PERMIT,
            Self::Permit(PermitError::PrototypeNotPermitted { .. }) => HS_PROTOTYPE_NOT_PERMITTED,
            Self::Permit(PermitError::UnresolvedPrototype { .. }) => HS_UNRESOLVED_PROTOTYPE,
            Self::PrototypeIdentityConflict { .. } => HS_PROTOTYPE_IDENTITY_CONFLICT,
            Self::TrustOracleUnavailable => HS_TRUST_ORACLE_UNAVAILABLE,
            Self::CollectorFinalized { .. } => HS_COLLECTOR_FINALIZED,
            Self::Heap(_) => HS_HEAP_FAULT,
            Self::Encoding { .. } => HS_ENCODING,
        }
    }

    fn outcome(&self) -> CollectorOutcome {
        match self {
            Self::Conflict(_) | Self::PrototypeIdentityConflict { .. } => CollectorOutcome::Conflict,
            Self::Permit(_) | Self::Encoding { .. } => CollectorOutcome::ConfigError,
            Self::TrustOracleUnavailable | Self::CollectorFinalized { .. } => {
                CollectorOutcome::PhaseViolation
            }
            Self::Heap(_) => CollectorOutcome::HeapFault,
        }
    }

    fn subject(&self) -> Option<&str> {
        match self {
            Self::Conflict(conflict) => Some(&conflict.name),
            Self::Permit(
                PermitError::MissingPermit { name }
                | PermitError::PrototypeNotPermitted { name }
                | PermitError::UnresolvedPrototype { name, .. },
            ) => Some(name),
            Self::PrototypeIdentityConflict { name, .. } => Some(name),
            Self::Heap(HeapError::NotExtensible { name } | HeapError::NonConfigurable { name }) => {
                Some(name)
            }
            _ => None,
        }
    }
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict(conflict) => conflict.fmt(f),
            Self::Permit(err) => err.fmt(f),
            Self::PrototypeIdentityConflict { name, constructor } => {
                write!(
                    f,
                    "conflicting bindings of `{name}` while completing `{constructor}.prototype`"
                )
            }
            Self::TrustOracleUnavailable => {
                write!(f, "is_pseudo_native can only be called after final_intrinsics")
            }
            Self::CollectorFinalized { operation } => {
                write!(f, "`{operation}` called after final_intrinsics")
            }
            Self::Heap(err) => err.fmt(f),
            Self::Encoding { detail } => write!(f, "canonical encoding failed: {detail}"),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Conflict(conflict) => Some(conflict),
            Self::Permit(err) => Some(err),
            Self::Heap(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConflictingDefinition> for CollectorError {
    fn from(err: ConflictingDefinition) -> Self {
        Self::Conflict(err)
    }
}

impl From<PermitError> for CollectorError {
    fn from(err: PermitError) -> Self {
        Self::Permit(err)
    }
}

impl From<HeapError> for CollectorError {
    fn from(err: HeapError) -> Self {
        Self::Heap(err)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Which build-phase operation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorEventKind {
    AddIntrinsics,
    CompletePrototypes,
    FinalIntrinsics,
}

/// How the operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorOutcome {
    Pass,
    Conflict,
    ConfigError,
    PhaseViolation,
    HeapFault,
}

/// One structured audit record.  Serializable so the trail can travel with
/// evidence exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorEvent {
    pub component: String,
    pub event: CollectorEventKind,
    pub outcome: CollectorOutcome,
    pub error_code: Option<String>,
    /// Intrinsic name the outcome hinges on, when there is one.
    pub name: Option<String>,
    /// Bindings touched by a successful operation.
    pub count: Option<usize>,
}

impl CollectorEvent {
    fn base(event: CollectorEventKind, outcome: CollectorOutcome) -> Self {
        Self {
            component: COMPONENT.to_string(),
            event,
            outcome,
            error_code: None,
            name: None,
            count: None,
        }
    }
}

// ---------------------------------------------------------------------------
// CollectorState
// ---------------------------------------------------------------------------

/// Build phase: collecting, or irreversibly finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorState {
    Collecting,
    Finalized,
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collecting => write!(f, "collecting"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

// ---------------------------------------------------------------------------
// FrozenIntrinsics
// ---------------------------------------------------------------------------

/// Immutable snapshot of a finalized registry.  Read access only; values are
/// not recursively frozen, only the name-to-descriptor record is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenIntrinsics {
    entries: BTreeMap<String, PropertyDescriptor>,
}

impl FrozenIntrinsics {
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

    /// Is the snapshot empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// SHA-256 over the canonical JSON encoding of the sorted registry.
    /// Equal baselines digest equal; any added, removed, or altered binding
    /// changes the digest.
    pub fn baseline_digest(&self) -> Result<String, CollectorError> {
        let bytes = serde_json::to_vec(&self.entries).map_err(|err| CollectorError::Encoding {
            detail: err.to_string(),
        })?;
        let digest = Sha256::digest(&bytes);
        Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Extract own-property descriptors from an environment object under
/// registry names.
///
/// For each `(environment_name, registry_name)` pair, if `env` has
/// `environment_name` as an own property, the fragment binds its descriptor
/// under `registry_name`.  Absent names are silently skipped: tables list
/// the union of what hosts may provide, not what each host must.
pub fn sample_globals(
    heap: &ObjectHeap,
    env: ObjectHandle,
    names: &NameMap,
) -> Result<IntrinsicsFragment, CollectorError> {
    let object = heap.get(env)?;
    let mut fragment = IntrinsicsFragment::new();
    for (source, intrinsic) in names.iter() {
        if let Some(desc) = object.own_property(source) {
            fragment.insert(intrinsic, desc.clone());
        }
    }
    Ok(fragment)
}

/// Sample and finalize the shared globals of `env` in one step, discarding
/// the collector and its trust oracle.
///
/// The returned bindings reflect whatever currently occupies the sampled
/// slots; nothing here verifies them against expected identities or hardens
/// them.  Callers own that judgment.
pub fn sample_global_intrinsics(
    heap: &ObjectHeap,
    env: ObjectHandle,
    permits: PermitSpec,
    tables: &NameTables,
) -> Result<FrozenIntrinsics, CollectorError> {
    let mut collector = IntrinsicsCollector::new(heap, env, permits, tables)?;
    let shared = sample_globals(heap, env, &tables.shared_global)?;
    collector.add_intrinsics(shared)?;
    collector.final_intrinsics(heap)
}

// ---------------------------------------------------------------------------
// IntrinsicsCollector
// ---------------------------------------------------------------------------

/// Accumulates verified intrinsics, then finalizes exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct IntrinsicsCollector {
    state: CollectorState,
    registry: IntrinsicsRegistry,
    permits: PermitSpec,
    pseudo_natives: Option<BTreeSet<ObjectHandle>>,
    events: Vec<CollectorEvent>,
}

impl IntrinsicsCollector {
    /// Create a collector self-seeded from `ambient_env`: first the value
    /// constants, then a universal-names sample.  Either seed can conflict,
    /// so construction itself is fallible.
    pub fn new(
        heap: &ObjectHeap,
        ambient_env: ObjectHandle,
        permits: PermitSpec,
        tables: &NameTables,
    ) -> Result<Self, CollectorError> {
        let mut collector = Self {
            state: CollectorState::Collecting,
            registry: IntrinsicsRegistry::new(),
            permits,
            pseudo_natives: None,
            events: Vec::new(),
        };
        let mut constants = IntrinsicsFragment::new();
        for (name, value) in &tables.constants {
            constants.insert_value(name.clone(), value.clone());
        }
        collector.add_intrinsics(constants)?;
        let universal = sample_globals(heap, ambient_env, &tables.universal)?;
        collector.add_intrinsics(universal)?;
        Ok(collector)
    }

    /// Merge a fragment through the safe merger.
    pub fn add_intrinsics(&mut self, fragment: IntrinsicsFragment) -> Result<(), CollectorError> {
        self.ensure_collecting(CollectorEventKind::AddIntrinsics, "add_intrinsics")?;
        let count = fragment.len();
        if let Err(conflict) = self.registry.merge(fragment) {
            return Err(self.fail(CollectorEventKind::AddIntrinsics, conflict.into()));
        }
        self.pass(CollectorEventKind::AddIntrinsics, count);
        Ok(())
    }

    /// Close the registry under permitted prototype links.
    ///
    /// Every object-valued entry with an own `prototype` data property must
    /// have a permit resolving that link; the resolved name is either
    /// identity-checked against its existing binding or inserted
    /// first-writer as a plain data binding.  Re-runnable while collecting;
    /// a second pass over a closed registry adds nothing.
    pub fn complete_prototypes(&mut self, heap: &ObjectHeap) -> Result<(), CollectorError> {
        self.ensure_collecting(CollectorEventKind::CompletePrototypes, "complete_prototypes")?;
        let additions = match self.plan_completions(heap) {
            Ok(additions) => additions,
            Err(err) => return Err(self.fail(CollectorEventKind::CompletePrototypes, err)),
        };
        let count = additions.len();
        for (name, value) in additions {
            self.registry.bind(name, value);
        }
        self.pass(CollectorEventKind::CompletePrototypes, count);
        Ok(())
    }

    /// Freeze the registry, derive the pseudo-native set, and transition to
    /// `Finalized`.  The snapshot is the only mutable-free view handed out;
    /// the trust oracle stays with the collector.
    pub fn final_intrinsics(&mut self, heap: &ObjectHeap) -> Result<FrozenIntrinsics, CollectorError> {
        self.ensure_collecting(CollectorEventKind::FinalIntrinsics, "final_intrinsics")?;
        let mut natives = BTreeSet::new();
        for (_, desc) in self.registry.iter() {
            if let Some(value) = desc.value()
                && let Value::Object(handle) = value
                && heap.is_callable(value)
            {
                natives.insert(*handle);
            }
        }
        self.pseudo_natives = Some(natives);
        self.state = CollectorState::Finalized;
        let frozen = FrozenIntrinsics {
            entries: self.registry.snapshot(),
        };
        self.pass(CollectorEventKind::FinalIntrinsics, frozen.len());
        Ok(frozen)
    }

    /// Is `value` one of the finalized callable intrinsics, by reference
    /// identity?
    ///
    /// Valid only after finalization; before it the oracle has no basis to
    /// answer, and guessing `false` would let a forgery probe the build
    /// window, so the premature call is an error instead.
    pub fn is_pseudo_native(&self, value: &Value) -> Result<bool, CollectorError> {
        let Some(natives) = self.pseudo_natives.as_ref() else {
            return Err(CollectorError::TrustOracleUnavailable);
        };
        Ok(match value {
            Value::Object(handle) => natives.contains(handle),
            _ => false,
        })
    }

    /// Current build phase.
    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Read-only view of the registry as collected so far.
    pub fn registry(&self) -> &IntrinsicsRegistry {
        &self.registry
    }

    /// The permit specification this collector verifies against.
    pub fn permits(&self) -> &PermitSpec {
        &self.permits
    }

    /// The audit trail, in operation order.
    pub fn events(&self) -> &[CollectorEvent] {
        &self.events
    }

    // -- internals ----------------------------------------------------------

    fn ensure_collecting(
        &mut self,
        kind: CollectorEventKind,
        operation: &str,
    ) -> Result<(), CollectorError> {
        if self.state == CollectorState::Finalized {
            let err = CollectorError::CollectorFinalized {
                operation: operation.to_string(),
            };
            return Err(self.fail(kind, err));
        }
        Ok(())
    }

    /// Scan the registry for prototype links to insert.  Pure with respect
    /// to the collector: all writes happen after the scan fully succeeds, so
    /// iteration order cannot affect which bindings a successful pass makes.
    fn plan_completions(&self, heap: &ObjectHeap) -> Result<BTreeMap<String, Value>, CollectorError> {
        let mut additions: BTreeMap<String, Value> = BTreeMap::new();
        for (name, desc) in self.registry.iter() {
            let Some(value) = desc.value() else { continue };
            let Value::Object(handle) = value else { continue };
            let object = heap.get(*handle)?;
            let Some(prototype_desc) = object.own_property("prototype") else {
                continue;
            };
            // An accessor-shaped `prototype` has no value to record without
            // calling host code, which this crate never does.
            let Some(claimed) = prototype_desc.value() else { continue };

            let prototype_name = self.permits.prototype_of(name)?;
            if self.registry.contains(prototype_name) {
                match self.registry.value_of(prototype_name) {
                    Some(existing) if existing.same_value(claimed) => {}
                    _ => {
                        return Err(CollectorError::PrototypeIdentityConflict {
                            name: prototype_name.to_string(),
                            constructor: name.to_string(),
                        });
                    }
                }
            } else if let Some(pending) = additions.get(prototype_name) {
                if !pending.same_value(claimed) {
                    return Err(CollectorError::PrototypeIdentityConflict {
                        name: prototype_name.to_string(),
                        constructor: name.to_string(),
                    });
                }
            } else {
                additions.insert(prototype_name.to_string(), claimed.clone());
            }
        }
        Ok(additions)
    }

    fn pass(&mut self, kind: CollectorEventKind, count: usize) {
        let mut event = CollectorEvent::base(kind, CollectorOutcome::Pass);
        event.count = Some(count);
        self.events.push(event);
    }

    fn fail(&mut self, kind: CollectorEventKind, err: CollectorError) -> CollectorError {
        let mut event = CollectorEvent::base(kind, err.outcome());
        event.error_code = Some(err.code().to_string());
        event.name = err.subject().map(str::to_string);
        self.events.push(event);
        err
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
