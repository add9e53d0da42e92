//! Test infrastructure shared by the backend integration tests.

#![allow(dead_code)]

pub mod contract;
pub mod failing_store;
pub mod fixtures;

pub use contract::*;
pub use failing_store::*;
pub use fixtures::*;
