//! Common utilities for phloem
//!
//! This crate provides shared utilities used by multiple phloem crates:
//! - `distributions`: Statistical distributions for workload generation

pub mod distributions;

pub use distributions::{ExponentialDistribution, ZipfianGenerator, DEFAULT_ZIPFIAN_THETA};
