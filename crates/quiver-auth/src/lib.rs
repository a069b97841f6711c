//! Request signing for Quiver
//!
//! AWS Signature Version 4 in its three flavours: `Authorization` header
//! signing, query-string pre-signing and POST policy signing. All functions
//! are pure and never touch the network.

pub mod presigned;
pub mod signature;

pub use presigned::{post_presign_signature_v4, presign_v4, UNSIGNED_PAYLOAD};
pub use signature::{
    get_credential, get_scope, get_signing_key, redact_signature, sign_v4, SignatureV4,
    SIGN_V4_ALGORITHM,
};

use serde::{Deserialize, Serialize};

/// Access key pair with an optional STS session token
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn from_config(config: &quiver_core::ClientConfig) -> Self {
        Self {
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            session_token: config.session_token.clone(),
        }
    }

    /// Requests cannot be signed without both halves of the key pair
    pub fn is_anonymous(&self) -> bool {
        self.access_key.is_empty() || self.secret_key.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
