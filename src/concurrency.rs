//! Concurrency control hooks.
//!
//! Only the page-lock capability lives here; the engine ships without a real
//! lock manager.

pub mod lock;

pub use lock::{LockManager, NoopLockManager, Permissions};
