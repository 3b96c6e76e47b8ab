//! Storage contract shared by the sample service modules.
//!
//! Services keep their resources in a [`Storage`] keyed by the resource's
//! unique name. The contract is synchronous: every call completes without
//! awaiting, so handlers can use it from async code without holding locks
//! across `.await` points.

/// Errors surfaced by [`Storage`] operations.
///
/// Services translate these into their own wire error codes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("no entry with key '{key}'")]
    NotFound { key: String },
    #[error("an entry with key '{key}' already exists")]
    AlreadyExists { key: String },
}

/// Create/get/list/delete storage of values of type `T` keyed by string.
///
/// Wrapped in `Arc` for sharing across request tasks.
pub trait Storage<T>: Send + Sync + 'static {
    /// Inserts a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] when `key` is taken.
    fn create(&self, key: &str, value: T) -> Result<(), StoreError>;

    /// Returns a copy of the entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when `key` is absent.
    fn get(&self, key: &str) -> Result<T, StoreError>;

    /// Inserts or replaces an entry, returning the previous value.
    fn put(&self, key: &str, value: T) -> Option<T>;

    /// Applies `update` to the entry in place and returns the updated copy.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when `key` is absent.
    fn update(&self, key: &str, update: &mut dyn FnMut(&mut T)) -> Result<T, StoreError>;

    /// Removes an entry, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when `key` is absent.
    fn delete(&self, key: &str) -> Result<T, StoreError>;

    /// All entries sorted by key.
    fn list(&self) -> Vec<(String, T)>;

    fn contains_key(&self, key: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    fn clear(&self);
}
