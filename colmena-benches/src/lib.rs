//! Benchmark support crate for colmena.
//!
//! Provides seeded synthetic edge lists and parameter types used by the
//! Criterion benchmarks for paged arrays and the disjoint-set engine.

pub mod error;
pub mod params;
pub mod source;
