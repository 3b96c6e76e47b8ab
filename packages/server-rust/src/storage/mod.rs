//! In-memory storage for the sample service modules.
//!
//! - [`Storage`]: the create/get/list/delete contract services program against
//! - [`HashMapStorage`]: the `DashMap`-backed implementation

pub mod engine;
pub mod engines;

pub use engine::{Storage, StoreError};
pub use engines::HashMapStorage;
