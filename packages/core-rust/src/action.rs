//! Reusable `operation → handler` table shared by every service module.
//!
//! A service builds one [`ActionTable`] over its state and hands it to its
//! [`ServiceDescriptor`](crate::descriptor::ServiceDescriptor) as the
//! dispatch capability. Handlers come in two forms:
//!
//! - **raw** ([`ActionTable::action`]): receives the [`OperationInput`] and
//!   returns a JSON value
//! - **typed** ([`ActionTable::typed`]): receives a deserialized input struct
//!   and returns a serializable output struct

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::descriptor::{OperationInput, ServiceHandler};
use crate::error::{HandlerError, ProtocolError};

/// Boxed future returned by every stored action.
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;

type ActionFn<S> = Arc<dyn Fn(Arc<S>, OperationInput) -> ActionFuture + Send + Sync>;

/// In-memory state owned by one service module.
pub trait ServiceState: Send + Sync + 'static {
    /// Clears all state. The default keeps nothing to clear.
    fn reset(&self) {}
}

/// Maps operation names to async handlers over shared state `S`.
pub struct ActionTable<S> {
    state: Arc<S>,
    actions: BTreeMap<&'static str, ActionFn<S>>,
}

impl<S: ServiceState> ActionTable<S> {
    #[must_use]
    pub fn new(state: Arc<S>) -> Self {
        Self {
            state,
            actions: BTreeMap::new(),
        }
    }

    /// Registers a raw handler.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered in this table.
    #[must_use]
    pub fn action<F, Fut>(mut self, name: &'static str, handler: F) -> Self
    where
        F: Fn(Arc<S>, OperationInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        let action: ActionFn<S> =
            Arc::new(move |state, input| -> ActionFuture { Box::pin(handler(state, input)) });
        self.insert(name, action);
        self
    }

    /// Registers a typed handler.
    ///
    /// REST path parameters are merged into the input object before
    /// deserialization; body fields take precedence. A body that does not fit
    /// `I` fails with `SerializationException`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered in this table.
    #[must_use]
    pub fn typed<I, O, F, Fut>(mut self, name: &'static str, handler: F) -> Self
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(Arc<S>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let action: ActionFn<S> = Arc::new(move |state, input| -> ActionFuture {
            Box::pin(call_typed(Arc::clone(&handler), state, input, name))
        });
        self.insert(name, action);
        self
    }

    fn insert(&mut self, name: &'static str, action: ActionFn<S>) {
        let previous = self.actions.insert(name, action);
        assert!(previous.is_none(), "action '{name}' registered twice");
    }

    /// Operation names in sorted order.
    pub fn action_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.actions.keys().copied()
    }

    #[must_use]
    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    #[must_use]
    pub fn into_handler(self) -> Arc<dyn ServiceHandler> {
        Arc::new(self)
    }
}

#[async_trait]
impl<S: ServiceState> ServiceHandler for ActionTable<S> {
    async fn dispatch(&self, operation: &str, input: OperationInput) -> Result<Value, HandlerError> {
        let Some(action) = self.actions.get(operation) else {
            return Err(ProtocolError::unknown_operation(operation).into());
        };
        action(Arc::clone(&self.state), input).await
    }

    async fn reset(&self) {
        self.state.reset();
    }
}

async fn call_typed<S, I, O, F, Fut>(
    handler: Arc<F>,
    state: Arc<S>,
    input: OperationInput,
    name: &'static str,
) -> Result<Value, HandlerError>
where
    I: DeserializeOwned,
    O: Serialize,
    F: Fn(Arc<S>, I) -> Fut,
    Fut: Future<Output = Result<O, HandlerError>>,
{
    let input: I = serde_json::from_value(merge_path_params(input))
        .map_err(|err| ProtocolError::serialization(format!("Invalid input for {name}: {err}")))?;
    let output = handler(state, input).await?;
    Ok(serde_json::to_value(output)?)
}

/// Builds the typed-handler input object: path parameters first, then body
/// fields on top. Non-object bodies are passed through untouched.
fn merge_path_params(input: OperationInput) -> Value {
    if input.path_params.is_empty() {
        return input.body;
    }
    match input.body {
        Value::Object(body) => {
            let mut merged: Map<String, Value> = input
                .path_params
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect();
            merged.extend(body);
            Value::Object(merged)
        }
        Value::Null => Value::Object(
            input
                .path_params
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect(),
        ),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
