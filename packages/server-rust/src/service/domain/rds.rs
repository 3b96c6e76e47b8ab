//! RDS, Query protocol: database instance lifecycle.
//!
//! Instances become `available` immediately; nothing is provisioned.
//! Parameters may arrive as JSON values or as form strings, so numeric
//! inputs accept both.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use cumulus_core::{
    ActionTable, HandlerError, ProtocolError, QueryRpcSpec, ServiceDescriptor, ServiceState,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::service::config::ServerConfig;
use crate::storage::{HashMapStorage, Storage, StoreError};

pub const NAME: &str = "rds";
pub const NAMESPACE: &str = "http://rds.amazonaws.com/doc/2014-10-31/";

const ALREADY_EXISTS: &str = "DBInstanceAlreadyExists";
const NOT_FOUND: &str = "DBInstanceNotFound";
const INVALID_PARAMETER: &str = "InvalidParameterValue";

const DEFAULT_ALLOCATED_STORAGE: u64 = 20;
const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, Clone)]
struct DbInstance {
    identifier: String,
    class: String,
    engine: String,
    engine_version: Option<String>,
    master_username: Option<String>,
    db_name: Option<String>,
    allocated_storage: u64,
    port: u64,
    arn: String,
    address: String,
    created_at: DateTime<Utc>,
}

impl DbInstance {
    fn describe(&self, status: &str) -> Value {
        json!({
            "DBInstanceIdentifier": self.identifier,
            "DBInstanceClass": self.class,
            "Engine": self.engine,
            "EngineVersion": self.engine_version,
            "DBInstanceStatus": status,
            "MasterUsername": self.master_username,
            "DBName": self.db_name,
            "AllocatedStorage": self.allocated_storage,
            "InstanceCreateTime": self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "Endpoint": {
                "Address": self.address,
                "Port": self.port,
            },
            "DBInstanceArn": self.arn,
            "MultiAZ": false,
            "StorageType": "gp2",
            "PubliclyAccessible": false,
        })
    }
}

fn default_port(engine: &str) -> u64 {
    if engine.contains("postgres") {
        5432
    } else if engine.starts_with("oracle") {
        1521
    } else if engine.starts_with("sqlserver") {
        1433
    } else {
        3306
    }
}

fn invalid_parameter(message: impl Into<String>) -> ProtocolError {
    ProtocolError::new(INVALID_PARAMETER, message)
}

fn not_found(identifier: &str) -> ProtocolError {
    ProtocolError::new(NOT_FOUND, format!("DBInstance {identifier} not found."))
}

/// Letters, digits and single hyphens; starts with a letter, no trailing hyphen.
fn validate_identifier(identifier: &str) -> Result<(), ProtocolError> {
    let valid = !identifier.is_empty()
        && identifier.len() <= MAX_IDENTIFIER_LEN
        && identifier.starts_with(|c: char| c.is_ascii_alphabetic())
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !identifier.ends_with('-')
        && !identifier.contains("--");
    if valid {
        Ok(())
    } else {
        Err(invalid_parameter(format!(
            "The parameter DBInstanceIdentifier is not a valid identifier: {identifier}"
        )))
    }
}

/// A numeric parameter sent either as a JSON number or as text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberParam {
    Number(u64),
    Text(String),
}

impl NumberParam {
    fn value(&self, name: &str) -> Result<u64, ProtocolError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(text) => text.trim().parse().map_err(|_| {
                invalid_parameter(format!("Invalid value '{text}' for parameter {name}"))
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RdsState {
    config: ServerConfig,
    instances: HashMapStorage<DbInstance>,
}

impl RdsState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            instances: HashMapStorage::new(),
        }
    }
}

impl ServiceState for RdsState {
    fn reset(&self) {
        self.instances.clear();
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateDbInstanceInput {
    #[serde(rename = "DBInstanceIdentifier", default)]
    identifier: String,
    #[serde(rename = "DBInstanceClass", default)]
    class: String,
    #[serde(rename = "Engine", default)]
    engine: String,
    #[serde(rename = "EngineVersion")]
    engine_version: Option<String>,
    #[serde(rename = "MasterUsername")]
    master_username: Option<String>,
    #[serde(rename = "DBName")]
    db_name: Option<String>,
    #[serde(rename = "AllocatedStorage")]
    allocated_storage: Option<NumberParam>,
    #[serde(rename = "Port")]
    port: Option<NumberParam>,
}

async fn create_db_instance(
    state: Arc<RdsState>,
    input: CreateDbInstanceInput,
) -> Result<Value, HandlerError> {
    validate_identifier(&input.identifier)?;
    if input.class.is_empty() {
        return Err(invalid_parameter("DBInstanceClass is required").into());
    }
    if input.engine.is_empty() {
        return Err(invalid_parameter("Engine is required").into());
    }
    let allocated_storage = input
        .allocated_storage
        .as_ref()
        .map(|p| p.value("AllocatedStorage"))
        .transpose()?
        .unwrap_or(DEFAULT_ALLOCATED_STORAGE);
    let port = input
        .port
        .as_ref()
        .map(|p| p.value("Port"))
        .transpose()?
        .unwrap_or_else(|| default_port(&input.engine));

    let config = &state.config;
    let instance = DbInstance {
        arn: config.arn("rds", &format!("db:{}", input.identifier)),
        address: format!(
            "{}.{}.{}.rds.amazonaws.com",
            input.identifier, config.account_id, config.region
        ),
        identifier: input.identifier,
        class: input.class,
        engine: input.engine,
        engine_version: input.engine_version,
        master_username: input.master_username,
        db_name: input.db_name,
        allocated_storage,
        port,
        created_at: Utc::now(),
    };
    state
        .instances
        .create(&instance.identifier, instance.clone())
        .map_err(|err| match err {
            StoreError::AlreadyExists { key } => ProtocolError::new(
                ALREADY_EXISTS,
                format!("DB instance already exists: {key}"),
            ),
            StoreError::NotFound { key } => not_found(&key),
        })?;
    debug!(instance = %instance.identifier, engine = %instance.engine, "db instance created");
    Ok(json!({ "DBInstance": instance.describe("available") }))
}

#[derive(Debug, Deserialize)]
struct IdentifierInput {
    #[serde(rename = "DBInstanceIdentifier")]
    identifier: Option<String>,
}

async fn describe_db_instances(
    state: Arc<RdsState>,
    input: IdentifierInput,
) -> Result<Value, HandlerError> {
    let instances: Vec<Value> = match input.identifier.as_deref() {
        Some(identifier) => {
            let instance = state
                .instances
                .get(identifier)
                .map_err(|_| not_found(identifier))?;
            vec![instance.describe("available")]
        }
        None => state
            .instances
            .list()
            .iter()
            .map(|(_, instance)| instance.describe("available"))
            .collect(),
    };
    Ok(json!({ "DBInstances": instances }))
}

async fn delete_db_instance(
    state: Arc<RdsState>,
    input: IdentifierInput,
) -> Result<Value, HandlerError> {
    let identifier = input.identifier.unwrap_or_default();
    let instance = state
        .instances
        .delete(&identifier)
        .map_err(|_| not_found(&identifier))?;
    debug!(instance = %identifier, "db instance deleted");
    Ok(json!({ "DBInstance": instance.describe("deleting") }))
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

fn action_table(state: Arc<RdsState>) -> ActionTable<RdsState> {
    ActionTable::new(state)
        .typed("CreateDBInstance", create_db_instance)
        .typed("DescribeDBInstances", describe_db_instances)
        .typed("DeleteDBInstance", delete_db_instance)
}

/// Builds the `rds` descriptor; the Query action set is the table's.
#[must_use]
pub fn descriptor(config: &ServerConfig) -> ServiceDescriptor {
    let table = action_table(Arc::new(RdsState::new(config.clone())));
    let spec = QueryRpcSpec::new(NAMESPACE, table.action_names())
        .with_list_member("DBInstances", "DBInstance");
    ServiceDescriptor::new(NAME, spec, table.into_handler())
}
