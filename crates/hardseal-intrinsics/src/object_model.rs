//! Host object substrate the registry samples from.
//!
//! An embedder describes the environment under audit as a set of
//! [`HostObject`]s in an [`ObjectHeap`].  The registry never calls into the
//! host, so the substrate is deliberately small:
//!
//! - **Property descriptors**: data vs accessor, configurable/enumerable/writable
//! - **Own properties only**: no `[[Prototype]]` chain, no traversal
//! - **Callable and constructable flags**: trust classification inputs
//! - **Arena heap**: handles are indices, identity is handle equality
//!
//! `BTreeMap` for deterministic ordering.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{ObjectHandle, Value};

// ---------------------------------------------------------------------------
// PropertyDescriptor
// ---------------------------------------------------------------------------

/// ES2020 property descriptor (§6.2.5).
///
/// Derived equality is full-descriptor SameValue: data descriptors compare
/// value (SameValue) plus all three attributes, accessor descriptors compare
/// getter/setter handle identity plus attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyDescriptor {
    /// Data descriptor: has `value` and `writable`.
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    /// Accessor descriptor: has `get` and/or `set`.
    Accessor {
        get: Option<ObjectHandle>,
        set: Option<ObjectHandle>,
        enumerable: bool,
        configurable: bool,
    },
}

impl PropertyDescriptor {
    /// Create a default data descriptor (writable, enumerable, configurable).
    pub fn data(value: Value) -> Self {
        Self::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Create a non-writable, non-enumerable, non-configurable data descriptor.
    pub fn data_frozen(value: Value) -> Self {
        Self::Data {
            value,
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }

    /// Create an accessor descriptor (enumerable, configurable).
    pub fn accessor(get: Option<ObjectHandle>, set: Option<ObjectHandle>) -> Self {
        Self::Accessor {
            get,
            set,
            enumerable: true,
            configurable: true,
        }
    }

    /// Is this descriptor configurable?
    pub fn is_configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => *configurable,
        }
    }

    /// Is this descriptor enumerable?
    pub fn is_enumerable(&self) -> bool {
        match self {
            Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. } => *enumerable,
        }
    }

    /// Is this a data descriptor?
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    /// Is this an accessor descriptor?
    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }

    /// Get the value if this is a data descriptor.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }

    /// Is this a data descriptor with writable=true?
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Data { writable, .. } => *writable,
            Self::Accessor { .. } => false,
        }
    }

    /// Full-descriptor SameValue comparison: kind, attributes, and value
    /// (SameValue) or getter/setter identity must all agree.
    pub fn same_descriptor(&self, other: &Self) -> bool {
        self == other
    }
}

// ---------------------------------------------------------------------------
// HeapError
// ---------------------------------------------------------------------------

/// Errors from host object operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeapError {
    /// Object not found in the heap.
    ObjectNotFound(ObjectHandle),
    /// Property addition rejected because the object is not extensible.
    NotExtensible { name: String },
    /// Redefinition rejected because the property is non-configurable.
    NonConfigurable { name: String },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectNotFound(h) => write!(f, "object#{} not found", h.0),
            Self::NotExtensible { name } => {
                write!(f, "cannot add property `{name}` to a non-extensible object")
            }
            Self::NonConfigurable { name } => {
                write!(f, "cannot redefine non-configurable property `{name}`")
            }
        }
    }
}

impl std::error::Error for HeapError {}

// ---------------------------------------------------------------------------
// HostObject
// ---------------------------------------------------------------------------

/// A host object as presented to the registry: own properties plus the
/// internal slots trust classification needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostObject {
    /// `[[Extensible]]` internal slot.
    pub extensible: bool,
    /// Own properties with descriptors, in deterministic name order.
    pub properties: BTreeMap<String, PropertyDescriptor>,
    /// `[[Class]]` tag for intrinsic identification.
    pub class_tag: Option<String>,
    /// Is this object callable (i.e. a function)?
    pub callable: bool,
    /// Is this object a constructor?
    pub constructable: bool,
}

impl Default for HostObject {
    fn default() -> Self {
        Self {
            extensible: true,
            properties: BTreeMap::new(),
            class_tag: None,
            callable: false,
            constructable: false,
        }
    }
}

impl HostObject {
    /// Create a plain extensible object with no properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a callable, non-constructable object (a builtin function).
    pub fn function() -> Self {
        Self {
            callable: true,
            ..Self::default()
        }
    }

    /// Create a callable, constructable object (a builtin constructor).
    pub fn constructor() -> Self {
        Self {
            callable: true,
            constructable: true,
            ..Self::default()
        }
    }

    /// Set the `[[Class]]` tag.
    pub fn with_class_tag(mut self, tag: impl Into<String>) -> Self {
        self.class_tag = Some(tag.into());
        self
    }

    /// Does this object have an own property `name`?
    pub fn has_own_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// The own property descriptor for `name`, if present.
    pub fn own_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    /// Define or update an own property.
    ///
    /// Follows the §9.1.6 compatibility rules for existing properties: a
    /// non-configurable property admits no change of kind, enumerability, or
    /// configurability, and a non-writable data property admits no change of
    /// value or writability.
    pub fn define_own_property(
        &mut self,
        name: impl Into<String>,
        desc: PropertyDescriptor,
    ) -> Result<(), HeapError> {
        let name = name.into();
        if let Some(current) = self.properties.get(&name) {
            if !current.is_configurable() {
                if desc.is_configurable()
                    || desc.is_enumerable() != current.is_enumerable()
                    || desc.is_data() != current.is_data()
                {
                    return Err(HeapError::NonConfigurable { name });
                }
                match (current, &desc) {
                    (
                        PropertyDescriptor::Data {
                            value: current_value,
                            writable: false,
                            ..
                        },
                        PropertyDescriptor::Data {
                            value: new_value,
                            writable: new_writable,
                            ..
                        },
                    ) => {
                        if *new_writable || !current_value.same_value(new_value) {
                            return Err(HeapError::NonConfigurable { name });
                        }
                    }
                    (
                        PropertyDescriptor::Accessor {
                            get: current_get,
                            set: current_set,
                            ..
                        },
                        PropertyDescriptor::Accessor {
                            get: new_get,
                            set: new_set,
                            ..
                        },
                    ) => {
                        if current_get != new_get || current_set != new_set {
                            return Err(HeapError::NonConfigurable { name });
                        }
                    }
                    _ => {}
                }
            }
        } else if !self.extensible {
            return Err(HeapError::NotExtensible { name });
        }
        self.properties.insert(name, desc);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ObjectHeap — arena of host objects
// ---------------------------------------------------------------------------

/// Append-only arena of host objects.  Handles index into the arena, so an
/// allocated handle stays valid for the life of the heap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectHeap {
    objects: Vec<HostObject>,
}

impl ObjectHeap {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an object, returning its handle.
    pub fn alloc(&mut self, object: HostObject) -> ObjectHandle {
        let handle = ObjectHandle(self.objects.len() as u32);
        self.objects.push(object);
        handle
    }

    /// Allocate a plain extensible object.
    pub fn alloc_plain(&mut self) -> ObjectHandle {
        self.alloc(HostObject::new())
    }

    /// Allocate a callable, non-constructable object.
    pub fn alloc_function(&mut self) -> ObjectHandle {
        self.alloc(HostObject::function())
    }

    /// Allocate a constructor together with its prototype object, wired the
    /// way ordinary builtin class pairs are: `ctor.prototype` is a
    /// non-enumerable, non-configurable data property naming the prototype,
    /// and `proto.constructor` points back.
    ///
    /// Returns `(constructor, prototype)`.
    pub fn alloc_constructor(
        &mut self,
        class_tag: impl Into<String>,
    ) -> Result<(ObjectHandle, ObjectHandle), HeapError> {
        let proto = self.alloc_plain();
        let ctor = self.alloc(HostObject::constructor().with_class_tag(class_tag));
        self.get_mut(ctor)?.define_own_property(
            "prototype",
            PropertyDescriptor::Data {
                value: Value::Object(proto),
                writable: true,
                enumerable: false,
                configurable: false,
            },
        )?;
        self.get_mut(proto)?.define_own_property(
            "constructor",
            PropertyDescriptor::Data {
                value: Value::Object(ctor),
                writable: true,
                enumerable: false,
                configurable: true,
            },
        )?;
        Ok((ctor, proto))
    }

    /// Look up an object by handle.
    pub fn get(&self, handle: ObjectHandle) -> Result<&HostObject, HeapError> {
        self.objects
            .get(handle.0 as usize)
            .ok_or(HeapError::ObjectNotFound(handle))
    }

    /// Look up an object mutably by handle.
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Result<&mut HostObject, HeapError> {
        self.objects
            .get_mut(handle.0 as usize)
            .ok_or(HeapError::ObjectNotFound(handle))
    }

    /// The own property descriptor for `name` on the object behind `handle`.
    pub fn own_property(
        &self,
        handle: ObjectHandle,
        name: &str,
    ) -> Result<Option<&PropertyDescriptor>, HeapError> {
        Ok(self.get(handle)?.own_property(name))
    }

    /// Is `value` a callable object in this heap?  Primitives and dangling
    /// handles are not callable.
    pub fn is_callable(&self, value: &Value) -> bool {
        match value {
            Value::Object(handle) => self.get(*handle).is_ok_and(|o| o.callable),
            _ => false,
        }
    }

    /// Number of allocated objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Is the heap empty?
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
