//! Bearer API key gate.
//!
//! The gate reads `Authorization: Bearer <token>`, looks the token up in a
//! [`CredentialRegistry`] and either forwards the request untouched or ends
//! the chain with `401 Unauthorized`. Checks run in a fixed order and stop at
//! the first failure:
//!
//! 1. header absent or empty → [`AuthError::MissingCredential`]
//! 2. not exactly `Bearer` + one space + token → [`AuthError::MalformedCredential`]
//! 3. token not registered → [`AuthError::UnknownCredential`]
//!
//! Only the strict `Bearer <token>` form is accepted. The registry is keyed
//! by bare tokens; a client sending the token without the scheme is rejected
//! as malformed.
//!
//! Rejected tokens are never logged. The unknown-credential event carries a
//! short SHA-256 fingerprint instead, enough to correlate repeated guesses.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use http::StatusCode;
use http::header::{AUTHORIZATION, HeaderValue};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::{Middleware, Next};
use crate::context::Principal;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

const SCHEME: &str = "Bearer";
const FINGERPRINT_LEN: usize = 12;

/// Why the gate refused a request. `Display` is the response body.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header should include an API key")]
    MissingCredential,

    #[error("Invalid Authorization header format. It should be in the format: Bearer $APITOKEN")]
    MalformedCredential,

    #[error("An invalid API key was specified in the Authorization header")]
    UnknownCredential,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        Response::builder().status(StatusCode::UNAUTHORIZED).text(self.to_string())
    }
}

// ── CredentialRegistry ────────────────────────────────────────────────────────

/// Immutable token → principal map, built once at startup.
///
/// There is no mutation API. `Debug` prints the entry count only.
#[derive(Clone, Default)]
pub struct CredentialRegistry {
    keys: HashMap<String, Principal>,
}

#[derive(Deserialize)]
struct KeyFile {
    #[serde(default)]
    keys: HashMap<String, String>,
}

impl CredentialRegistry {
    /// Builds a registry from `(token, principal)` pairs.
    ///
    /// Fails with [`Error::DuplicateKey`] if a token appears twice.
    pub fn new<I, K, P>(pairs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<String>,
    {
        let mut keys = HashMap::new();
        for (token, principal) in pairs {
            match keys.entry(token.into()) {
                Entry::Occupied(_) => return Err(Error::DuplicateKey),
                Entry::Vacant(slot) => {
                    slot.insert(Principal::new(principal));
                }
            }
        }
        Ok(Self { keys })
    }

    /// Parses a TOML document with a `[keys]` table:
    ///
    /// ```toml
    /// [keys]
    /// gae_ffd7bef1 = "admin"
    /// gae_98e8d5f4 = "reguser"
    /// ```
    pub fn from_toml(source: &str) -> Result<Self, Error> {
        let file: KeyFile = toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        Self::new(file.keys)
    }

    /// Reads and parses a key file; see [`from_toml`](Self::from_toml).
    pub fn load(path: &Path) -> Result<Self, Error> {
        let keys_error = |reason: String| Error::Keys { path: path.to_owned(), reason };
        let source = std::fs::read_to_string(path).map_err(|e| keys_error(e.to_string()))?;
        Self::from_toml(&source).map_err(|e| keys_error(e.to_string()))
    }

    /// Exact-match lookup. No trimming, no case folding.
    pub fn principal(&self, token: &str) -> Option<&Principal> {
        self.keys.get(token)
    }

    pub fn len(&self) -> usize { self.keys.len() }
    pub fn is_empty(&self) -> bool { self.keys.is_empty() }

    /// Runs the three checks against a raw `Authorization` value.
    pub fn verify(&self, header: Option<&HeaderValue>) -> Result<Principal, AuthError> {
        let value = match header {
            Some(v) if !v.is_empty() => v,
            _ => return Err(AuthError::MissingCredential),
        };
        let token = bearer_token(value).ok_or(AuthError::MalformedCredential)?;

        match self.principal(token) {
            Some(principal) => Ok(principal.clone()),
            None => {
                warn!(
                    token_fingerprint = %fingerprint(token),
                    "rejected request with an unknown API key",
                );
                Err(AuthError::UnknownCredential)
            }
        }
    }
}

impl fmt::Debug for CredentialRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRegistry").field("keys", &self.keys.len()).finish()
    }
}

/// `Bearer <token>` split on single spaces into exactly two parts.
/// `"Bearer "` yields an empty token, which then fails the lookup.
fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(SCHEME), Some(token), None) => Some(token),
        _ => None,
    }
}

fn fingerprint(token: &str) -> String {
    let mut digest = hex::encode(Sha256::digest(token.as_bytes()));
    digest.truncate(FINGERPRINT_LEN);
    digest
}

// ── BearerAuth ────────────────────────────────────────────────────────────────

/// Middleware that admits only requests carrying a registered bearer token.
///
/// On success the resolved [`Principal`] is stored in the request context
/// and the request continues down the chain.
#[derive(Clone, Debug)]
pub struct BearerAuth {
    registry: Arc<CredentialRegistry>,
}

impl BearerAuth {
    pub fn new(registry: CredentialRegistry) -> Self {
        Self { registry: Arc::new(registry) }
    }
}

impl Middleware for BearerAuth {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let outcome = self.registry.verify(req.headers().get(AUTHORIZATION));
        Box::pin(async move {
            match outcome {
                Ok(principal) => {
                    info!(principal = %principal, "authenticated request");
                    req.context_mut().set_principal(principal);
                    next.run(req).await
                }
                Err(denied) => denied.into_response(),
            }
        })
    }
}
