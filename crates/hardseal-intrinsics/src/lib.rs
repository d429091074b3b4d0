#![forbid(unsafe_code)]

pub mod collector;
pub mod names;
pub mod object_model;
pub mod permits;
pub mod registry;
pub mod value;

pub use collector::{
    CollectorError, CollectorEvent, CollectorEventKind, CollectorOutcome, CollectorState,
    FrozenIntrinsics, IntrinsicsCollector, sample_global_intrinsics, sample_globals,
};
pub use names::{NameMap, NameMapError, NameTables};
pub use object_model::{HeapError, HostObject, ObjectHeap, PropertyDescriptor};
pub use permits::{Permit, PermitError, PermitSpec};
pub use registry::{ConflictingDefinition, IntrinsicsFragment, IntrinsicsRegistry};
pub use value::{ObjectHandle, Value};

#[cfg(test)]
mod tests {
    use super::{
        IntrinsicsCollector, NameTables, ObjectHeap, PermitSpec, Value, sample_global_intrinsics,
    };

    #[test]
    fn standard_tables_drive_a_collector_out_of_the_box() {
        let mut heap = ObjectHeap::new();
        let env = heap.alloc_plain();
        let collector =
            IntrinsicsCollector::new(&heap, env, PermitSpec::standard(), &NameTables::standard())
                .expect("collector");
        // An empty environment still yields the three seeded constants.
        assert_eq!(collector.registry().len(), 3);
        assert_eq!(collector.registry().value_of("undefined"), Some(&Value::Undefined));
    }

    #[test]
    fn shared_sampling_works_through_the_root_exports() {
        let mut heap = ObjectHeap::new();
        let env = heap.alloc_plain();
        let frozen = sample_global_intrinsics(
            &heap,
            env,
            PermitSpec::standard(),
            &NameTables::standard(),
        )
        .expect("frozen");
        assert!(frozen.contains("NaN"));
        assert_eq!(frozen.baseline_digest().expect("digest").len(), 64);
    }
}
