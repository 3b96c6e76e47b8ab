//! Simple Email Service, v2 REST API.
//!
//! Identities are created already verified. `SendEmail` delivers nothing; it
//! records the message so tests can inspect what would have been sent.

use std::sync::Arc;

use cumulus_core::{
    ActionTable, HandlerError, OperationInput, ProtocolError, RestSpec, ServiceDescriptor,
    ServiceState,
};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::service::config::ServerConfig;
use crate::storage::{HashMapStorage, Storage, StoreError};

pub const NAME: &str = "ses";
const PATH_PREFIX: &str = "/ses";

const NOT_FOUND: &str = "NotFoundException";
const ALREADY_EXISTS: &str = "AlreadyExistsException";
const BAD_REQUEST: &str = "BadRequestException";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityType {
    EmailAddress,
    Domain,
}

impl IdentityType {
    fn of(identity: &str) -> Self {
        if identity.contains('@') {
            Self::EmailAddress
        } else {
            Self::Domain
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone)]
struct EmailIdentity {
    identity_type: IdentityType,
    tags: Vec<Tag>,
}

/// A message accepted by `SendEmail`.
#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub message_id: String,
    pub from: String,
    pub to: Vec<String>,
    pub content: Value,
}

#[derive(Debug, Default)]
pub struct SesState {
    identities: HashMapStorage<EmailIdentity>,
    outbox: HashMapStorage<SentEmail>,
}

impl SesState {
    /// Messages accepted so far, ordered by message id.
    #[must_use]
    pub fn sent_messages(&self) -> Vec<SentEmail> {
        self.outbox.list().into_iter().map(|(_, msg)| msg).collect()
    }

    /// Whether `address` may send: either the address itself or its domain
    /// must be a registered identity.
    fn can_send_from(&self, address: &str) -> bool {
        self.identities.contains_key(address)
            || address
                .rsplit_once('@')
                .is_some_and(|(_, domain)| self.identities.contains_key(domain))
    }
}

impl ServiceState for SesState {
    fn reset(&self) {
        self.identities.clear();
        self.outbox.clear();
    }
}

fn store_error(err: StoreError) -> ProtocolError {
    match err {
        StoreError::NotFound { key } => {
            ProtocolError::new(NOT_FOUND, format!("Email identity {key} does not exist."))
        }
        StoreError::AlreadyExists { key } => {
            ProtocolError::new(ALREADY_EXISTS, format!("Email identity {key} already exist."))
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateEmailIdentityInput {
    #[serde(default)]
    email_identity: String,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateEmailIdentityOutput {
    identity_type: IdentityType,
    verified_for_sending_status: bool,
}

async fn create_email_identity(
    state: Arc<SesState>,
    input: CreateEmailIdentityInput,
) -> Result<CreateEmailIdentityOutput, HandlerError> {
    let name = input.email_identity.trim();
    if name.is_empty() {
        return Err(ProtocolError::new(BAD_REQUEST, "EmailIdentity is required").into());
    }
    let identity_type = IdentityType::of(name);
    state
        .identities
        .create(
            name,
            EmailIdentity {
                identity_type,
                tags: input.tags,
            },
        )
        .map_err(store_error)?;
    debug!(identity = name, "email identity created");
    Ok(CreateEmailIdentityOutput {
        identity_type,
        verified_for_sending_status: true,
    })
}

async fn list_email_identities(
    state: Arc<SesState>,
    _input: OperationInput,
) -> Result<Value, HandlerError> {
    let identities: Vec<Value> = state
        .identities
        .list()
        .into_iter()
        .map(|(name, identity)| {
            json!({
                "IdentityType": identity.identity_type,
                "IdentityName": name,
                "SendingEnabled": true,
                "VerificationStatus": "SUCCESS",
            })
        })
        .collect();
    Ok(json!({ "EmailIdentities": identities }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EmailIdentityInput {
    email_identity: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetEmailIdentityOutput {
    identity_type: IdentityType,
    verified_for_sending_status: bool,
    feedback_forwarding_status: bool,
    verification_status: &'static str,
    tags: Vec<Tag>,
}

async fn get_email_identity(
    state: Arc<SesState>,
    input: EmailIdentityInput,
) -> Result<GetEmailIdentityOutput, HandlerError> {
    let identity = state
        .identities
        .get(&input.email_identity)
        .map_err(store_error)?;
    Ok(GetEmailIdentityOutput {
        identity_type: identity.identity_type,
        verified_for_sending_status: true,
        feedback_forwarding_status: true,
        verification_status: "SUCCESS",
        tags: identity.tags,
    })
}

async fn delete_email_identity(
    state: Arc<SesState>,
    input: EmailIdentityInput,
) -> Result<Value, HandlerError> {
    state
        .identities
        .delete(&input.email_identity)
        .map_err(store_error)?;
    Ok(json!({}))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct Destination {
    to_addresses: Vec<String>,
    cc_addresses: Vec<String>,
    bcc_addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailInput {
    #[serde(default)]
    from_email_address: String,
    #[serde(default)]
    destination: Destination,
    #[serde(default)]
    content: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailOutput {
    message_id: String,
}

async fn send_email(
    state: Arc<SesState>,
    input: SendEmailInput,
) -> Result<SendEmailOutput, HandlerError> {
    let from = bare_address(&input.from_email_address);
    if from.is_empty() {
        return Err(ProtocolError::new(BAD_REQUEST, "FromEmailAddress is required").into());
    }
    if !state.can_send_from(from) {
        return Err(ProtocolError::new(
            BAD_REQUEST,
            format!("Email address is not verified. The following identities failed the check: {from}"),
        )
        .into());
    }

    let Destination {
        to_addresses,
        cc_addresses,
        bcc_addresses,
    } = input.destination;
    let recipients: Vec<String> = to_addresses
        .into_iter()
        .chain(cc_addresses)
        .chain(bcc_addresses)
        .collect();
    if recipients.is_empty() {
        return Err(ProtocolError::new(BAD_REQUEST, "Destination has no recipients").into());
    }

    let message_id = Uuid::new_v4().to_string();
    state.outbox.put(
        &message_id,
        SentEmail {
            message_id: message_id.clone(),
            from: from.to_string(),
            to: recipients,
            content: input.content,
        },
    );
    debug!(message_id = %message_id, from, "email accepted");
    Ok(SendEmailOutput { message_id })
}

/// Strips a display name: `Jane <jane@example.com>` becomes `jane@example.com`.
fn bare_address(raw: &str) -> &str {
    let raw = raw.trim();
    match (raw.rfind('<'), raw.rfind('>')) {
        (Some(open), Some(close)) if open < close => raw[open + 1..close].trim(),
        _ => raw,
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

fn action_table(state: Arc<SesState>) -> ActionTable<SesState> {
    ActionTable::new(state)
        .typed("CreateEmailIdentity", create_email_identity)
        .action("ListEmailIdentities", list_email_identities)
        .typed("GetEmailIdentity", get_email_identity)
        .typed("DeleteEmailIdentity", delete_email_identity)
        .typed("SendEmail", send_email)
}

/// Builds the `ses` descriptor over fresh state.
#[must_use]
pub fn descriptor(_config: &ServerConfig) -> ServiceDescriptor {
    let table = action_table(Arc::new(SesState::default()));
    let spec = RestSpec::new(PATH_PREFIX)
        .route(Method::POST, "/v2/email/identities", "CreateEmailIdentity")
        .route(Method::GET, "/v2/email/identities", "ListEmailIdentities")
        .route(
            Method::GET,
            "/v2/email/identities/{EmailIdentity}",
            "GetEmailIdentity",
        )
        .route(
            Method::DELETE,
            "/v2/email/identities/{EmailIdentity}",
            "DeleteEmailIdentity",
        )
        .route(Method::POST, "/v2/email/outbound-emails", "SendEmail");

    ServiceDescriptor::new(NAME, spec, table.into_handler())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use cumulus_core::ServiceHandler;

    use super::*;

    fn table() -> ActionTable<SesState> {
        action_table(Arc::new(SesState::default()))
    }

    fn input(body: Value) -> OperationInput {
        OperationInput {
            body,
            ..OperationInput::default()
        }
    }

    fn with_identity_param(identity: &str) -> OperationInput {
        let mut input = input(json!({}));
        input
            .path_params
            .insert("EmailIdentity".to_string(), identity.to_string());
        input
    }

    fn code(err: HandlerError) -> String {
        match err {
            HandlerError::Protocol(err) => err.code,
            HandlerError::Internal(err) => panic!("unexpected internal error: {err}"),
        }
    }

    #[tokio::test]
    async fn identity_type_follows_at_sign() {
        let table = table();
        let email = table
            .dispatch(
                "CreateEmailIdentity",
                input(json!({"EmailIdentity": "a@example.com"})),
            )
            .await
            .unwrap();
        assert_eq!(email["IdentityType"], "EMAIL_ADDRESS");
        assert_eq!(email["VerifiedForSendingStatus"], true);

        let domain = table
            .dispatch("CreateEmailIdentity", input(json!({"EmailIdentity": "example.org"})))
            .await
            .unwrap();
        assert_eq!(domain["IdentityType"], "DOMAIN");
    }

    #[tokio::test]
    async fn duplicate_identity_is_rejected() {
        let table = table();
        let body = json!({"EmailIdentity": "a@example.com"});
        table
            .dispatch("CreateEmailIdentity", input(body.clone()))
            .await
            .unwrap();
        let err = table
            .dispatch("CreateEmailIdentity", input(body))
            .await
            .unwrap_err();
        assert_eq!(code(err), ALREADY_EXISTS);
    }

    #[tokio::test]
    async fn get_list_and_delete() {
        let table = table();
        table
            .dispatch(
                "CreateEmailIdentity",
                input(json!({"EmailIdentity": "b@example.com", "Tags": [{"Key": "team", "Value": "mail"}]})),
            )
            .await
            .unwrap();

        let got = table
            .dispatch("GetEmailIdentity", with_identity_param("b@example.com"))
            .await
            .unwrap();
        assert_eq!(got["Tags"][0]["Key"], "team");

        let listed = table
            .dispatch("ListEmailIdentities", input(json!({})))
            .await
            .unwrap();
        assert_eq!(listed["EmailIdentities"][0]["IdentityName"], "b@example.com");

        table
            .dispatch("DeleteEmailIdentity", with_identity_param("b@example.com"))
            .await
            .unwrap();
        let err = table
            .dispatch("GetEmailIdentity", with_identity_param("b@example.com"))
            .await
            .unwrap_err();
        assert_eq!(code(err), NOT_FOUND);
    }

    #[tokio::test]
    async fn send_requires_known_sender() {
        let table = table();
        let message = json!({
            "FromEmailAddress": "Sender <news@example.com>",
            "Destination": {"ToAddresses": ["x@y.z"]},
            "Content": {"Simple": {"Subject": {"Data": "hi"}}},
        });
        let err = table
            .dispatch("SendEmail", input(message.clone()))
            .await
            .unwrap_err();
        assert_eq!(code(err), BAD_REQUEST);

        table
            .dispatch("CreateEmailIdentity", input(json!({"EmailIdentity": "example.com"})))
            .await
            .unwrap();
        let sent = table.dispatch("SendEmail", input(message)).await.unwrap();
        assert!(sent["MessageId"].is_string());

        let outbox = table.state().sent_messages();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].from, "news@example.com");
        assert_eq!(outbox[0].to, vec!["x@y.z".to_string()]);
    }

    #[tokio::test]
    async fn send_without_recipients_is_rejected() {
        let table = table();
        table
            .dispatch("CreateEmailIdentity", input(json!({"EmailIdentity": "a@b.c"})))
            .await
            .unwrap();
        let err = table
            .dispatch("SendEmail", input(json!({"FromEmailAddress": "a@b.c"})))
            .await
            .unwrap_err();
        assert_eq!(code(err), BAD_REQUEST);
    }

    #[tokio::test]
    async fn reset_drops_identities() {
        let table = table();
        table
            .dispatch("CreateEmailIdentity", input(json!({"EmailIdentity": "a@b.c"})))
            .await
            .unwrap();
        ServiceHandler::reset(&table).await;
        let listed = table
            .dispatch("ListEmailIdentities", input(json!({})))
            .await
            .unwrap();
        assert_eq!(listed["EmailIdentities"], json!([]));
    }

    #[test]
    fn bare_address_strips_display_name() {
        assert_eq!(bare_address("Jane <jane@example.com>"), "jane@example.com");
        assert_eq!(bare_address(" jane@example.com "), "jane@example.com");
    }

    #[test]
    fn descriptor_declares_rest_routes() {
        let descriptor = descriptor(&ServerConfig::default());
        assert_eq!(descriptor.name(), NAME);
        assert_eq!(descriptor.path_prefix(), "/ses");
    }
}
