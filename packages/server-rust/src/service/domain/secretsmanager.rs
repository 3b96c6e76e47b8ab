//! Secrets Manager, JSON 1.1 protocol.
//!
//! Each secret holds a single current version; there is no rotation or
//! staging beyond `AWSCURRENT`. Deletion is immediate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cumulus_core::{
    ActionTable, HandlerError, JsonRpcSpec, JsonVersion, ProtocolError, ServiceDescriptor,
    ServiceState,
};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::epoch_seconds;
use crate::service::config::ServerConfig;
use crate::storage::{HashMapStorage, Storage, StoreError};

pub const NAME: &str = "secretsmanager";
pub const TARGET_PREFIX: &str = "secretsmanager";

const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
const RESOURCE_EXISTS: &str = "ResourceExistsException";
const INVALID_PARAMETER: &str = "InvalidParameterException";

const CURRENT_STAGE: &str = "AWSCURRENT";
const ARN_SUFFIX_LEN: usize = 6;
const MAX_RESULTS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    value: String,
}

#[derive(Debug, Clone)]
struct Secret {
    name: String,
    arn: String,
    description: Option<String>,
    secret_string: Option<String>,
    secret_binary: Option<String>,
    version_id: String,
    tags: Vec<Tag>,
    created_at: DateTime<Utc>,
    last_accessed: Option<DateTime<Utc>>,
}

impl Secret {
    fn has_value(&self) -> bool {
        self.secret_string.is_some() || self.secret_binary.is_some()
    }

    fn describe(&self) -> Value {
        let mut out = Map::new();
        out.insert("ARN".to_string(), json!(self.arn));
        out.insert("Name".to_string(), json!(self.name));
        if let Some(description) = &self.description {
            out.insert("Description".to_string(), json!(description));
        }
        out.insert("CreatedDate".to_string(), json!(epoch_seconds(self.created_at)));
        out.insert(
            "LastChangedDate".to_string(),
            json!(epoch_seconds(self.created_at)),
        );
        if let Some(at) = self.last_accessed {
            out.insert("LastAccessedDate".to_string(), json!(epoch_seconds(at)));
        }
        out.insert("Tags".to_string(), json!(self.tags));
        if self.has_value() {
            let mut stages = Map::new();
            stages.insert(self.version_id.clone(), json!([CURRENT_STAGE]));
            out.insert("VersionIdsToStages".to_string(), Value::Object(stages));
        }
        Value::Object(out)
    }
}

/// `{name}-{six random alphanumerics}`, the suffix AWS appends to secret ARNs.
fn arn_resource(name: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ARN_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("secret:{name}-{suffix}")
}

fn invalid_parameter(message: impl Into<String>) -> ProtocolError {
    ProtocolError::new(INVALID_PARAMETER, message)
}

fn not_found() -> ProtocolError {
    ProtocolError::new(
        RESOURCE_NOT_FOUND,
        "Secrets Manager can't find the specified secret.",
    )
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SecretsState {
    config: ServerConfig,
    secrets: HashMapStorage<Secret>,
}

impl SecretsState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            secrets: HashMapStorage::new(),
        }
    }

    /// Looks a secret up by name or by full ARN.
    fn find(&self, secret_id: &str) -> Result<Secret, ProtocolError> {
        if secret_id.starts_with("arn:") {
            return self
                .secrets
                .list()
                .into_iter()
                .map(|(_, secret)| secret)
                .find(|secret| secret.arn == secret_id)
                .ok_or_else(not_found);
        }
        self.secrets.get(secret_id).map_err(|_| not_found())
    }
}

impl ServiceState for SecretsState {
    fn reset(&self) {
        self.secrets.clear();
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSecretInput {
    #[serde(default)]
    name: String,
    description: Option<String>,
    secret_string: Option<String>,
    secret_binary: Option<String>,
    #[serde(default)]
    tags: Vec<Tag>,
}

async fn create_secret(
    state: Arc<SecretsState>,
    input: CreateSecretInput,
) -> Result<Value, HandlerError> {
    if input.name.is_empty() {
        return Err(invalid_parameter("Name must not be empty").into());
    }
    if input.secret_string.is_some() && input.secret_binary.is_some() {
        return Err(invalid_parameter(
            "You can't specify both a binary secret value and a string secret value in the same secret.",
        )
        .into());
    }

    let secret = Secret {
        arn: state
            .config
            .arn("secretsmanager", &arn_resource(&input.name)),
        name: input.name,
        description: input.description,
        secret_string: input.secret_string,
        secret_binary: input.secret_binary,
        version_id: Uuid::new_v4().to_string(),
        tags: input.tags,
        created_at: Utc::now(),
        last_accessed: None,
    };
    let output = json!({
        "ARN": secret.arn,
        "Name": secret.name,
        "VersionId": secret.has_value().then_some(&secret.version_id),
    });
    state
        .secrets
        .create(&secret.name, secret.clone())
        .map_err(|err| match err {
            StoreError::AlreadyExists { key } => ProtocolError::new(
                RESOURCE_EXISTS,
                format!("The operation failed because the secret {key} already exists."),
            ),
            StoreError::NotFound { .. } => not_found(),
        })?;
    debug!(secret = %secret.name, "secret created");
    Ok(output)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecretIdInput {
    #[serde(default)]
    secret_id: String,
}

async fn get_secret_value(
    state: Arc<SecretsState>,
    input: SecretIdInput,
) -> Result<Value, HandlerError> {
    let found = state.find(&input.secret_id)?;
    let now = Utc::now();
    let secret = state
        .secrets
        .update(&found.name, &mut |secret| secret.last_accessed = Some(now))
        .map_err(|_| not_found())?;
    if !secret.has_value() {
        return Err(ProtocolError::new(
            RESOURCE_NOT_FOUND,
            format!(
                "Secrets Manager can't find the specified secret value for staging label: {CURRENT_STAGE}"
            ),
        )
        .into());
    }
    let mut out = Map::new();
    out.insert("ARN".to_string(), json!(secret.arn));
    out.insert("Name".to_string(), json!(secret.name));
    out.insert("VersionId".to_string(), json!(secret.version_id));
    if let Some(value) = secret.secret_string {
        out.insert("SecretString".to_string(), Value::String(value));
    }
    if let Some(value) = secret.secret_binary {
        out.insert("SecretBinary".to_string(), Value::String(value));
    }
    out.insert("VersionStages".to_string(), json!([CURRENT_STAGE]));
    out.insert(
        "CreatedDate".to_string(),
        json!(epoch_seconds(secret.created_at)),
    );
    Ok(Value::Object(out))
}

async fn describe_secret(
    state: Arc<SecretsState>,
    input: SecretIdInput,
) -> Result<Value, HandlerError> {
    Ok(state.find(&input.secret_id)?.describe())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListSecretsInput {
    max_results: Option<usize>,
    next_token: Option<String>,
}

/// Pages by name; `NextToken` is the last name of the previous page.
async fn list_secrets(
    state: Arc<SecretsState>,
    input: ListSecretsInput,
) -> Result<Value, HandlerError> {
    let limit = match input.max_results {
        None => MAX_RESULTS,
        Some(limit) if (1..=MAX_RESULTS).contains(&limit) => limit,
        Some(_) => return Err(invalid_parameter("MaxResults must be between 1 and 100").into()),
    };
    let remaining: Vec<Secret> = state
        .secrets
        .list()
        .into_iter()
        .filter(|(name, _)| input.next_token.as_ref().is_none_or(|token| name > token))
        .map(|(_, secret)| secret)
        .collect();

    let mut out = Map::new();
    if remaining.len() > limit {
        out.insert(
            "NextToken".to_string(),
            json!(remaining[limit - 1].name),
        );
    }
    let page: Vec<Value> = remaining.iter().take(limit).map(Secret::describe).collect();
    out.insert("SecretList".to_string(), Value::Array(page));
    Ok(Value::Object(out))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteSecretInput {
    #[serde(default)]
    secret_id: String,
    recovery_window_in_days: Option<i64>,
    #[serde(default)]
    force_delete_without_recovery: bool,
}

async fn delete_secret(
    state: Arc<SecretsState>,
    input: DeleteSecretInput,
) -> Result<Value, HandlerError> {
    if let Some(days) = input.recovery_window_in_days {
        if input.force_delete_without_recovery {
            return Err(invalid_parameter(
                "You can't use ForceDeleteWithoutRecovery in conjunction with RecoveryWindowInDays.",
            )
            .into());
        }
        if !(7..=30).contains(&days) {
            return Err(invalid_parameter("RecoveryWindowInDays must be between 7 and 30").into());
        }
    }
    let secret = state.find(&input.secret_id)?;
    state.secrets.delete(&secret.name).map_err(|_| not_found())?;
    debug!(secret = %secret.name, "secret deleted");
    Ok(json!({
        "ARN": secret.arn,
        "Name": secret.name,
        "DeletionDate": epoch_seconds(Utc::now()),
    }))
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

fn action_table(state: Arc<SecretsState>) -> ActionTable<SecretsState> {
    ActionTable::new(state)
        .typed("CreateSecret", create_secret)
        .typed("GetSecretValue", get_secret_value)
        .typed("DescribeSecret", describe_secret)
        .typed("ListSecrets", list_secrets)
        .typed("DeleteSecret", delete_secret)
}

#[must_use]
pub fn descriptor(config: &ServerConfig) -> ServiceDescriptor {
    let table = action_table(Arc::new(SecretsState::new(config.clone())));
    ServiceDescriptor::new(
        NAME,
        JsonRpcSpec::new(TARGET_PREFIX, JsonVersion::V1_1),
        table.into_handler(),
    )
}
