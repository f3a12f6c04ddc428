//! Test utilities
//!
//! In-memory repositories, recording realtime doubles and entity fixtures.
//! The mocks keep their state behind `RwLock`s so tests can inspect what a
//! service wrote after the call returns.

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
