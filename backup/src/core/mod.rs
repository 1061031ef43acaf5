//! Deterministic, pure logic shared by the backup runner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod elapsed;
pub mod invariants;
pub mod naming;
pub mod summary;
pub mod types;
