//! Concrete [`Storage`](super::Storage) implementations.

pub mod hashmap;

pub use hashmap::HashMapStorage;
