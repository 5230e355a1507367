//! Workload generation

pub mod counter;
pub mod definition;
pub mod fields;
pub mod generator;
pub mod operation;

pub use phloem_common::distributions;

pub use counter::InsertCounter;
pub use definition::{
    fnv_hash64, KeyNaming, OperationChooser, Phase, WorkerContext, Workload,
};
pub use fields::{FieldGenerator, FieldLengthSpec, DEFAULT_FIELD_PREFIX};
pub use generator::{
    HotspotKeys, KeyGenerator, LatestKeys, SequentialKeys, UniformKeys, ZipfianKeys,
};
pub use operation::{Operation, OperationKind};
