use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Stable identifier issued by the identity provider for a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated user as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: IdentityId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Opaque bearer token for an active session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: SessionToken,
    pub identity: Identity,
}

/// Credentials forwarded to the provider's sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Notification emitted whenever a session starts or ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    SignedIn(Identity),
    SignedOut(IdentityId),
}

/// Authentication collaborator (e.g. a hosted OAuth provider).
pub trait IdentityProvider: Send + Sync {
    fn sign_in(&self, request: SignInRequest) -> Result<Session, IdentityError>;
    fn current_user(&self, token: &SessionToken) -> Result<Option<Identity>, IdentityError>;
    fn sign_out(&self, token: &SessionToken) -> Result<(), IdentityError>;
    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("sign-in rejected: {0}")]
    Rejected(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<SessionToken> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(SessionToken(token.to_string()))
    }
}
