//! phloem core library
//!
//! The engine of the phloem key-value benchmark harness: workload generation
//! (key and field generators, operation mix), the backend capability contract,
//! the threaded executor with its rate policies, and latency measurement.

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod scheduler;
pub mod seed;
pub mod stats;
pub mod threading;
pub mod timing;
pub mod workload;

pub use db::{Db, DbFactory, FieldMap, Properties, Record, Status};
pub use error::{Error, Result};
