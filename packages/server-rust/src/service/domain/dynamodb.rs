//! DynamoDB, JSON 1.0 protocol: tables and single-item reads and writes.
//!
//! Attribute values are kept exactly as the client sent them (`{"S": "..."}`,
//! `{"N": "..."}` and so on); only key attributes are inspected.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cumulus_core::{
    ActionTable, HandlerError, JsonRpcSpec, JsonVersion, ProtocolError, ServiceDescriptor,
    ServiceState,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::epoch_seconds;
use crate::service::config::ServerConfig;
use crate::storage::{HashMapStorage, Storage, StoreError};

pub const NAME: &str = "dynamodb";
pub const TARGET_PREFIX: &str = "DynamoDB_20120810";

const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
const RESOURCE_IN_USE: &str = "ResourceInUseException";
const VALIDATION: &str = "ValidationException";

const MAX_LIST_LIMIT: usize = 100;

type Item = Map<String, Value>;

// ---------------------------------------------------------------------------
// Table model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum KeyType {
    Hash,
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeySchemaElement {
    attribute_name: String,
    key_type: KeyType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeDefinition {
    attribute_name: String,
    attribute_type: String,
}

#[derive(Debug)]
struct Table {
    name: String,
    arn: String,
    key_schema: Vec<KeySchemaElement>,
    attribute_definitions: Vec<AttributeDefinition>,
    billing_mode: String,
    created_at: DateTime<Utc>,
    /// Items keyed by their encoded primary key.
    items: RwLock<BTreeMap<String, Item>>,
}

impl Table {
    fn describe(&self, status: &str) -> Value {
        json!({
            "TableName": self.name,
            "TableArn": self.arn,
            "TableStatus": status,
            "KeySchema": self.key_schema,
            "AttributeDefinitions": self.attribute_definitions,
            "CreationDateTime": epoch_seconds(self.created_at),
            "ItemCount": self.items.read().len(),
            "TableSizeBytes": 0,
            "BillingModeSummary": { "BillingMode": self.billing_mode },
        })
    }

    /// Encodes the primary key of `attrs`: key attribute values in schema order.
    fn primary_key(&self, attrs: &Item, source: &str) -> Result<String, ProtocolError> {
        let mut parts = Vec::with_capacity(self.key_schema.len());
        for element in &self.key_schema {
            let value = attrs.get(&element.attribute_name).ok_or_else(|| {
                validation(format!(
                    "One or more parameter values were invalid: Missing the key {} in the {source}",
                    element.attribute_name
                ))
            })?;
            parts.push(value.to_string());
        }
        Ok(parts.join("\u{1f}"))
    }

    /// Like [`Table::primary_key`] but the map must hold key attributes only.
    fn exact_key(&self, key: &Item) -> Result<String, ProtocolError> {
        if key.len() != self.key_schema.len() {
            return Err(validation(
                "The provided key element does not match the schema",
            ));
        }
        self.primary_key(key, "key")
    }
}

fn validation(message: impl Into<String>) -> ProtocolError {
    ProtocolError::new(VALIDATION, message)
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DynamoDbState {
    config: ServerConfig,
    tables: HashMapStorage<Arc<Table>>,
}

impl DynamoDbState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            tables: HashMapStorage::new(),
        }
    }

    fn table(&self, name: &str) -> Result<Arc<Table>, ProtocolError> {
        self.tables.get(name).map_err(store_error)
    }
}

impl ServiceState for DynamoDbState {
    fn reset(&self) {
        self.tables.clear();
    }
}

fn store_error(err: StoreError) -> ProtocolError {
    match err {
        StoreError::NotFound { key } => ProtocolError::new(
            RESOURCE_NOT_FOUND,
            format!("Requested resource not found: Table: {key} not found"),
        ),
        StoreError::AlreadyExists { key } => {
            ProtocolError::new(RESOURCE_IN_USE, format!("Table already exists: {key}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Table operations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateTableInput {
    #[serde(default)]
    table_name: String,
    #[serde(default)]
    key_schema: Vec<KeySchemaElement>,
    #[serde(default)]
    attribute_definitions: Vec<AttributeDefinition>,
    billing_mode: Option<String>,
}

fn validate_key_schema(input: &CreateTableInput) -> Result<(), ProtocolError> {
    let hash_first = input
        .key_schema
        .first()
        .is_some_and(|element| element.key_type == KeyType::Hash);
    let shape_ok = match input.key_schema.as_slice() {
        [_] => hash_first,
        [_, second] => hash_first && second.key_type == KeyType::Range,
        _ => false,
    };
    if !shape_ok {
        return Err(validation(
            "KeySchema must hold one HASH key optionally followed by one RANGE key",
        ));
    }
    for element in &input.key_schema {
        let defined = input
            .attribute_definitions
            .iter()
            .any(|def| def.attribute_name == element.attribute_name);
        if !defined {
            return Err(validation(format!(
                "One or more parameter values were invalid: Some index key attributes are not defined in AttributeDefinitions. Keys: [{}]",
                element.attribute_name
            )));
        }
    }
    Ok(())
}

async fn create_table(
    state: Arc<DynamoDbState>,
    input: CreateTableInput,
) -> Result<Value, HandlerError> {
    if input.table_name.is_empty() {
        return Err(validation("TableName must not be empty").into());
    }
    validate_key_schema(&input)?;

    let table = Arc::new(Table {
        arn: state
            .config
            .arn("dynamodb", &format!("table/{}", input.table_name)),
        name: input.table_name,
        key_schema: input.key_schema,
        attribute_definitions: input.attribute_definitions,
        billing_mode: input
            .billing_mode
            .unwrap_or_else(|| "PROVISIONED".to_string()),
        created_at: Utc::now(),
        items: RwLock::new(BTreeMap::new()),
    });
    state
        .tables
        .create(&table.name, Arc::clone(&table))
        .map_err(store_error)?;
    debug!(table = %table.name, "table created");
    Ok(json!({ "TableDescription": table.describe("ACTIVE") }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TableNameInput {
    #[serde(default)]
    table_name: String,
}

async fn describe_table(
    state: Arc<DynamoDbState>,
    input: TableNameInput,
) -> Result<Value, HandlerError> {
    let table = state.table(&input.table_name)?;
    Ok(json!({ "Table": table.describe("ACTIVE") }))
}

async fn delete_table(
    state: Arc<DynamoDbState>,
    input: TableNameInput,
) -> Result<Value, HandlerError> {
    let table = state.tables.delete(&input.table_name).map_err(store_error)?;
    debug!(table = %table.name, "table deleted");
    Ok(json!({ "TableDescription": table.describe("DELETING") }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListTablesInput {
    exclusive_start_table_name: Option<String>,
    limit: Option<usize>,
}

async fn list_tables(
    state: Arc<DynamoDbState>,
    input: ListTablesInput,
) -> Result<Value, HandlerError> {
    let limit = match input.limit {
        None => MAX_LIST_LIMIT,
        Some(limit) if (1..=MAX_LIST_LIMIT).contains(&limit) => limit,
        Some(_) => {
            return Err(validation("Limit must be between 1 and 100").into());
        }
    };
    let names: Vec<String> = state
        .tables
        .list()
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| {
            input
                .exclusive_start_table_name
                .as_ref()
                .is_none_or(|start| name > start)
        })
        .collect();

    let mut output = Map::new();
    if names.len() > limit {
        output.insert(
            "LastEvaluatedTableName".to_string(),
            Value::String(names[limit - 1].clone()),
        );
    }
    let page: Vec<String> = names.into_iter().take(limit).collect();
    output.insert("TableNames".to_string(), json!(page));
    Ok(Value::Object(output))
}

// ---------------------------------------------------------------------------
// Item operations
// ---------------------------------------------------------------------------

const RETURN_ALL_OLD: &str = "ALL_OLD";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PutItemInput {
    #[serde(default)]
    table_name: String,
    #[serde(default)]
    item: Item,
    return_values: Option<String>,
}

async fn put_item(state: Arc<DynamoDbState>, input: PutItemInput) -> Result<Value, HandlerError> {
    let table = state.table(&input.table_name)?;
    let key = table.primary_key(&input.item, "item")?;
    let previous = table.items.write().insert(key, input.item);
    Ok(old_attributes(input.return_values.as_deref(), previous))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyInput {
    #[serde(default)]
    table_name: String,
    #[serde(default)]
    key: Item,
    return_values: Option<String>,
}

async fn get_item(state: Arc<DynamoDbState>, input: KeyInput) -> Result<Value, HandlerError> {
    let table = state.table(&input.table_name)?;
    let key = table.exact_key(&input.key)?;
    let item = table.items.read().get(&key).cloned();
    Ok(match item {
        Some(item) => json!({ "Item": item }),
        None => json!({}),
    })
}

async fn delete_item(state: Arc<DynamoDbState>, input: KeyInput) -> Result<Value, HandlerError> {
    let table = state.table(&input.table_name)?;
    let key = table.exact_key(&input.key)?;
    let previous = table.items.write().remove(&key);
    Ok(old_attributes(input.return_values.as_deref(), previous))
}

fn old_attributes(return_values: Option<&str>, previous: Option<Item>) -> Value {
    match (return_values, previous) {
        (Some(RETURN_ALL_OLD), Some(old)) => json!({ "Attributes": old }),
        _ => json!({}),
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

fn action_table(state: Arc<DynamoDbState>) -> ActionTable<DynamoDbState> {
    ActionTable::new(state)
        .typed("CreateTable", create_table)
        .typed("DescribeTable", describe_table)
        .typed("ListTables", list_tables)
        .typed("DeleteTable", delete_table)
        .typed("PutItem", put_item)
        .typed("GetItem", get_item)
        .typed("DeleteItem", delete_item)
}

/// Builds the `dynamodb` descriptor over fresh state.
#[must_use]
pub fn descriptor(config: &ServerConfig) -> ServiceDescriptor {
    let table = action_table(Arc::new(DynamoDbState::new(config.clone())));
    ServiceDescriptor::new(
        NAME,
        JsonRpcSpec::new(TARGET_PREFIX, JsonVersion::V1_0),
        table.into_handler(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
