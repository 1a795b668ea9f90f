// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Auth Documents
//!
//! Typed documents exchanged through the ledger. The vendor authors request
//! documents, the enduser's wallet authors response documents. Payloads are a
//! tagged union so a `TweetRequest` can never be built without its message and
//! a response can never be mistaken for a request.
//!
//! ## Wire Fields
//!
//! | Payload | Fields |
//! |---------|--------|
//! | `SignupRequest`, `LoginRequest` | `reference`, `uid_pin`, `nonce`, `correlation_token`, `dapp_name` |
//! | `TweetRequest` | request fields + `tweet` (clear text) |
//! | `*Response` | `reference`, `vid_pin`, `status`, `correlation_token` |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::ValidationError;

/// Name of the pseudo-field that matches on the document owner in queries.
pub const OWNER_ID_FIELD: &str = "$ownerId";

// ============================================================================
// Request Kind & Document Types
// ============================================================================

/// The kind of authorisation a vendor asks an enduser for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Signup,
    Login,
    Message,
}

impl RequestKind {
    /// Numeric code used by wallets and the CLI (1 = signup, 2 = login, 3 = message).
    pub fn code(self) -> u8 {
        match self {
            Self::Signup => 1,
            Self::Login => 2,
            Self::Message => 3,
        }
    }

    pub fn request_type(self) -> DocumentType {
        match self {
            Self::Signup => DocumentType::SignupRequest,
            Self::Login => DocumentType::LoginRequest,
            Self::Message => DocumentType::TweetRequest,
        }
    }

    pub fn response_type(self) -> DocumentType {
        match self {
            Self::Signup => DocumentType::SignupResponse,
            Self::Login => DocumentType::LoginResponse,
            Self::Message => DocumentType::TweetResponse,
        }
    }
}

impl TryFrom<u8> for RequestKind {
    type Error = ValidationError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Signup),
            2 => Ok(Self::Login),
            3 => Ok(Self::Message),
            other => Err(ValidationError::InvalidRequestKind(other)),
        }
    }
}

impl std::str::FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "signup" => Ok(Self::Signup),
            "2" | "login" => Ok(Self::Login),
            "3" | "message" | "tweet" => Ok(Self::Message),
            other => Err(format!("unknown request kind '{}'", other)),
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signup => write!(f, "signup"),
            Self::Login => write!(f, "login"),
            Self::Message => write!(f, "message"),
        }
    }
}

/// Semantic document type tag within the login contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    SignupRequest,
    LoginRequest,
    TweetRequest,
    SignupResponse,
    LoginResponse,
    TweetResponse,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignupRequest => "SignupRequest",
            Self::LoginRequest => "LoginRequest",
            Self::TweetRequest => "TweetRequest",
            Self::SignupResponse => "SignupResponse",
            Self::LoginResponse => "LoginResponse",
            Self::TweetResponse => "TweetResponse",
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Self::SignupResponse | Self::LoginResponse | Self::TweetResponse
        )
    }

    /// Fully qualified locator, e.g. `loginContract.LoginRequest`.
    pub fn locator(&self, app_name: &str) -> String {
        format!("{}.{}", app_name, self.as_str())
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Fields common to every request document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequestFields {
    /// Enduser application id the challenge is addressed to.
    pub reference: String,
    /// `encrypt(vendor.priv, hash(vendor.id ‖ enduser.id ‖ pin), enduser.pub)`
    pub uid_pin: String,
    /// `encrypt(vendor.priv, challenge_entropy, enduser.pub)`
    pub nonce: String,
    pub correlation_token: String,
    /// Supplied by the vendor for display only. Not authenticated.
    pub dapp_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetRequestFields {
    #[serde(flatten)]
    pub request: AuthRequestFields,
    /// Message body, sent in clear text.
    pub tweet: String,
}

/// Fields of every response document written by the enduser's wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponseFields {
    /// Vendor application id the response is addressed to.
    pub reference: String,
    /// `encrypt(enduser.priv, hash(entropy ‖ vendor.id ‖ pin), vendor.pub)`
    pub vid_pin: String,
    /// `encrypt(enduser.priv, status_code ‖ entropy, vendor.pub)`
    pub status: String,
    pub correlation_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum DocumentPayload {
    SignupRequest(AuthRequestFields),
    LoginRequest(AuthRequestFields),
    TweetRequest(TweetRequestFields),
    SignupResponse(AuthResponseFields),
    LoginResponse(AuthResponseFields),
    TweetResponse(AuthResponseFields),
}

impl DocumentPayload {
    /// Build the request payload for `kind`. A message request without a
    /// message body is rejected.
    pub fn request(
        kind: RequestKind,
        fields: AuthRequestFields,
        message: Option<&str>,
    ) -> Result<Self, ValidationError> {
        match kind {
            RequestKind::Signup => Ok(Self::SignupRequest(fields)),
            RequestKind::Login => Ok(Self::LoginRequest(fields)),
            RequestKind::Message => match message {
                Some(tweet) if !tweet.is_empty() => Ok(Self::TweetRequest(TweetRequestFields {
                    request: fields,
                    tweet: tweet.to_string(),
                })),
                _ => Err(ValidationError::EmptyMessage),
            },
        }
    }

    pub fn response(kind: RequestKind, fields: AuthResponseFields) -> Self {
        match kind {
            RequestKind::Signup => Self::SignupResponse(fields),
            RequestKind::Login => Self::LoginResponse(fields),
            RequestKind::Message => Self::TweetResponse(fields),
        }
    }

    pub fn document_type(&self) -> DocumentType {
        match self {
            Self::SignupRequest(_) => DocumentType::SignupRequest,
            Self::LoginRequest(_) => DocumentType::LoginRequest,
            Self::TweetRequest(_) => DocumentType::TweetRequest,
            Self::SignupResponse(_) => DocumentType::SignupResponse,
            Self::LoginResponse(_) => DocumentType::LoginResponse,
            Self::TweetResponse(_) => DocumentType::TweetResponse,
        }
    }

    pub fn as_request(&self) -> Option<&AuthRequestFields> {
        match self {
            Self::SignupRequest(fields) | Self::LoginRequest(fields) => Some(fields),
            Self::TweetRequest(tweet) => Some(&tweet.request),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&AuthResponseFields> {
        match self {
            Self::SignupResponse(fields)
            | Self::LoginResponse(fields)
            | Self::TweetResponse(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::TweetRequest(tweet) => Some(&tweet.tweet),
            _ => None,
        }
    }

    /// String value of a named payload field, used for query matching.
    pub fn field(&self, name: &str) -> Option<String> {
        let value = serde_json::to_value(self).ok()?;
        value.get(name)?.as_str().map(str::to_string)
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Store-assigned document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document as authored locally or returned by the ledger.
///
/// `document_id` is `None` until the store accepts the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub contract_id: String,
    pub document_id: Option<DocumentId>,
    pub owner_id: String,
    pub payload: DocumentPayload,
}

impl Document {
    pub fn new(contract_id: impl Into<String>, owner_id: impl Into<String>, payload: DocumentPayload) -> Self {
        Self {
            contract_id: contract_id.into(),
            document_id: None,
            owner_id: owner_id.into(),
            payload,
        }
    }

    pub fn document_type(&self) -> DocumentType {
        self.payload.document_type()
    }
}

/// A document accepted by the store, carrying its assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedDocument {
    pub document_id: DocumentId,
    pub document: Document,
    pub submitted_at: DateTime<Utc>,
}

// ============================================================================
// Queries
// ============================================================================

/// Equality condition on a payload field or on [`OWNER_ID_FIELD`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhereClause {
    pub field: String,
    pub value: String,
}

/// Filter over documents of one type within one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentQuery {
    pub contract_id: String,
    pub document_type: DocumentType,
    pub clauses: Vec<WhereClause>,
}

impl DocumentQuery {
    pub fn new(contract_id: impl Into<String>, document_type: DocumentType) -> Self {
        Self {
            contract_id: contract_id.into(),
            document_type,
            clauses: Vec::new(),
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push(WhereClause {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        if document.contract_id != self.contract_id || document.document_type() != self.document_type {
            return false;
        }
        self.clauses.iter().all(|clause| {
            if clause.field == OWNER_ID_FIELD {
                document.owner_id == clause.value
            } else {
                document.payload.field(&clause.field).as_deref() == Some(clause.value.as_str())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_fields() -> AuthRequestFields {
        AuthRequestFields {
            reference: "enduser-uid".to_string(),
            uid_pin: "enc-uid-pin".to_string(),
            nonce: "enc-nonce".to_string(),
            correlation_token: "1700000000000enduser-uid".to_string(),
            dapp_name: "Web dApp Sample".to_string(),
        }
    }

    fn response_fields() -> AuthResponseFields {
        AuthResponseFields {
            reference: "vendor-uid".to_string(),
            vid_pin: "enc-vid-pin".to_string(),
            status: "enc-status".to_string(),
            correlation_token: "1700000000000enduser-uid".to_string(),
        }
    }

    #[test]
    fn test_request_kind_codes() {
        assert_eq!(RequestKind::try_from(1).unwrap(), RequestKind::Signup);
        assert_eq!(RequestKind::try_from(2).unwrap(), RequestKind::Login);
        assert_eq!(RequestKind::try_from(3).unwrap(), RequestKind::Message);
        assert_eq!(
            RequestKind::try_from(4).unwrap_err(),
            ValidationError::InvalidRequestKind(4)
        );
        assert_eq!("login".parse::<RequestKind>().unwrap(), RequestKind::Login);
    }

    #[test]
    fn test_kind_selects_matching_document_types() {
        assert_eq!(RequestKind::Message.request_type(), DocumentType::TweetRequest);
        assert_eq!(RequestKind::Message.response_type(), DocumentType::TweetResponse);
        assert_eq!(DocumentType::LoginResponse.locator("loginContract"), "loginContract.LoginResponse");
    }

    #[test]
    fn test_message_request_requires_body() {
        assert_eq!(
            DocumentPayload::request(RequestKind::Message, request_fields(), Some("")),
            Err(ValidationError::EmptyMessage)
        );
        let payload =
            DocumentPayload::request(RequestKind::Message, request_fields(), Some("Tweets are greets")).unwrap();
        assert_eq!(payload.document_type(), DocumentType::TweetRequest);
        assert_eq!(payload.message(), Some("Tweets are greets"));
        assert_eq!(payload.as_request().unwrap().dapp_name, "Web dApp Sample");
    }

    #[test]
    fn test_tweet_payload_serializes_flat() {
        let payload = DocumentPayload::request(RequestKind::Message, request_fields(), Some("hi")).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["$type"], "TweetRequest");
        assert_eq!(json["tweet"], "hi");
        assert_eq!(json["nonce"], "enc-nonce");

        let back: DocumentPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_query_matches_owner_and_fields() {
        let doc = Document::new("contract", "enduser-identity", DocumentPayload::response(RequestKind::Login, response_fields()));
        let query = DocumentQuery::new("contract", DocumentType::LoginResponse)
            .where_eq(OWNER_ID_FIELD, "enduser-identity")
            .where_eq("reference", "vendor-uid")
            .where_eq("correlation_token", "1700000000000enduser-uid");
        assert!(query.matches(&doc));

        let other_owner = DocumentQuery::new("contract", DocumentType::LoginResponse)
            .where_eq(OWNER_ID_FIELD, "someone-else");
        assert!(!other_owner.matches(&doc));

        let wrong_type = DocumentQuery::new("contract", DocumentType::SignupResponse);
        assert!(!wrong_type.matches(&doc));
    }
}
