//! Error types and provider-error classification.
//!
//! Every public operation in this crate returns [`MeliResult`]; the
//! error tree groups failures by what the operator has to do about
//! them, and [`MeliError::remediation`] renders the corresponding
//! guidance text. The classifier functions map raw provider responses
//! into that tree.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Result type for all dashboard-core operations.
pub type MeliResult<T> = Result<T, MeliError>;

/// Fixed remediation text for missing-scope failures.
///
/// Rendered verbatim whatever the provider payload said: a token minted
/// before the scope change cannot be upgraded in place, so the only way
/// out is the full three-step re-authorization.
pub const SCOPE_REMEDIATION: &str = "Missing API scopes (read, write, offline_access).\n\
How to fix:\n\
1. Open the application in the provider's developer panel and enable the scopes read, write and offline_access.\n\
2. Run the authorization step again and copy the new authorization code.\n\
3. Exchange the new code for a new access token.\n\
Tokens issued before the scope change stop working and must be replaced.";

/// Root error type for the dashboard core.
#[derive(Error, Debug)]
pub enum MeliError {
    /// Input rejected before any network call.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Candidate access token failed the format heuristic.
    #[error("Token format error: value does not look like an access token ({preview}...)")]
    TokenFormat {
        /// Leading characters of the rejected value, for diagnostics.
        preview: String,
    },

    /// Error reported by the provider (non-2xx response).
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The request itself could not complete.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Response arrived but could not be interpreted.
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    /// Persistence backend failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// User-directory operation failure.
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// A newer sync for the same account superseded this one.
    #[error("Sync superseded for account {account_id}")]
    Superseded {
        /// Local id of the account whose sync was discarded.
        account_id: String,
    },
}

impl MeliError {
    /// Stable error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "MELI_VALIDATION",
            Self::TokenFormat { .. } => "MELI_TOKEN_FORMAT",
            Self::Provider(_) => "MELI_PROVIDER",
            Self::Network(_) => "MELI_NETWORK",
            Self::Response(_) => "MELI_RESPONSE",
            Self::Storage(_) => "MELI_STORAGE",
            Self::Directory(_) => "MELI_DIRECTORY",
            Self::Superseded { .. } => "MELI_SUPERSEDED",
        }
    }

    /// Whether the operator must restart the authorization flow.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::Provider(ProviderError::ScopeDenied)
                | Self::Provider(ProviderError::InvalidGrant { .. })
                | Self::Provider(ProviderError::Unauthorized { .. })
        )
    }

    /// Human-actionable guidance for this failure.
    ///
    /// This is the text the dashboard shows the operator; it carries
    /// enough context that the UI needs no error interpretation of its
    /// own.
    pub fn remediation(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::TokenFormat { preview } => format!(
                "The value does not look like a valid access token.\n\
                 Expected format: APP_USR-1234567890-123456-abcdef...\n\
                 Received: {preview}...\n\
                 Make sure you pasted the ACCESS TOKEN, not the authorization code."
            ),
            Self::Provider(ProviderError::ScopeDenied) => SCOPE_REMEDIATION.to_string(),
            Self::Provider(ProviderError::InvalidGrant { detail }) => {
                let mut msg = String::from(
                    "Authorization code already used or expired. Codes are single-use \
                     and valid for 10 minutes; restart the authorization step to obtain \
                     a new code.",
                );
                if let Some(detail) = detail {
                    msg.push_str(&format!(" Provider detail: {detail}"));
                }
                msg
            }
            Self::Provider(ProviderError::InvalidClient) => {
                "Client ID or client secret do not match the application registered \
                 with the provider. Verify both credentials."
                    .to_string()
            }
            Self::Provider(ProviderError::Unauthorized { detail }) => format!(
                "Access token rejected (HTTP 401): {detail}\n\
                 The token may have expired, or an authorization code was pasted in \
                 its place. Obtain a new access token."
            ),
            Self::Provider(ProviderError::Http { status, body }) => {
                format!("Provider returned HTTP {status}: {body}")
            }
            Self::Network(e) => format!(
                "Could not reach the marketplace API: {e}\n\
                 Check your internet connection, firewall and proxy settings, then retry."
            ),
            Self::Response(e) => e.to_string(),
            Self::Storage(e) => e.to_string(),
            Self::Directory(e) => e.to_string(),
            Self::Superseded { account_id } => {
                format!("A newer sync for account {account_id} replaced this one.")
            }
        }
    }
}

/// Pre-network input validation failure.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty or whitespace-only.
    #[error("{field} is required")]
    MissingRequired {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A field was present but unusable.
    #[error("{field} is invalid: {message}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },
}

/// Failure reported by the provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Application lacks the required scopes (403 or scope-flavored payload).
    #[error("missing required scopes")]
    ScopeDenied,

    /// Authorization code or refresh token was consumed or expired.
    #[error("invalid or expired grant")]
    InvalidGrant {
        /// Provider's `error_description`, when present.
        detail: Option<String>,
    },

    /// Client id/secret rejected by the token endpoint.
    #[error("invalid client credentials")]
    InvalidClient,

    /// Bearer token rejected on an API call.
    #[error("unauthorized: {detail}")]
    Unauthorized {
        /// Provider message body.
        detail: String,
    },

    /// Any other non-2xx response; body echoed verbatim.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
}

/// Transport-level failure: the request never completed.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection could not be established.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        /// Underlying error text.
        message: String,
    },

    /// Request exceeded its deadline.
    #[error("request timed out after {timeout:?}")]
    Timeout {
        /// Deadline that was exceeded.
        timeout: Duration,
    },
}

/// Response parsing failure.
#[derive(Error, Debug)]
pub enum ResponseError {
    /// Body was not the expected JSON shape.
    #[error("could not deserialize response: {message}")]
    Deserialization {
        /// Underlying error text.
        message: String,
    },
}

/// Persistence backend failure.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Snapshot could not be read.
    #[error("read failed: {message}")]
    ReadFailed {
        /// Underlying error text.
        message: String,
    },

    /// Snapshot could not be written.
    #[error("write failed: {message}")]
    WriteFailed {
        /// Underlying error text.
        message: String,
    },

    /// Stored snapshot did not deserialize.
    #[error("corrupted snapshot: {message}")]
    Corrupted {
        /// Underlying error text.
        message: String,
    },
}

/// User-directory operation failure.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DirectoryError {
    /// No active session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Unknown username or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Session user lacks the permission the operation requires.
    #[error("permission denied: {permission}")]
    PermissionDenied {
        /// Required permission name.
        permission: &'static str,
    },

    /// Username already taken.
    #[error("username already exists: {username}")]
    DuplicateUsername {
        /// Offending username.
        username: String,
    },

    /// No user with the given id.
    #[error("unknown user: {id}")]
    UnknownUser {
        /// Offending id.
        id: String,
    },

    /// Master account may only be altered by the master, never deleted.
    #[error("master user is protected")]
    MasterProtected,
}

/// OAuth error payload returned by the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorResponse {
    /// OAuth error code (`invalid_grant`, `invalid_client`, ...).
    pub error: String,
    /// Optional human-readable detail.
    #[serde(default)]
    pub error_description: Option<String>,
    /// Some provider endpoints use `message` instead.
    #[serde(default)]
    pub message: Option<String>,
}

/// Scope-flavored payload detection: the provider reports missing
/// scopes in several shapes, all of which mention one of these words.
pub fn is_scope_error(body: &str) -> bool {
    let lower = body.to_lowercase();
    ["scope", "read", "write", "offline_access"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Classify a non-2xx response from an authenticated API call.
pub fn classify_api_error(status: u16, body: &str) -> MeliError {
    if status == 403 || is_scope_error(body) {
        return MeliError::Provider(ProviderError::ScopeDenied);
    }
    if status == 401 {
        return MeliError::Provider(ProviderError::Unauthorized {
            detail: extract_message(body),
        });
    }
    MeliError::Provider(ProviderError::Http {
        status,
        body: body.to_string(),
    })
}

/// Classify a non-2xx response from the token endpoint.
///
/// The scope check runs first: a scope-flavored `invalid_scope` (or any
/// payload naming the missing scopes) must surface the full remediation
/// rather than a generic grant failure.
pub fn classify_token_error(status: u16, body: &str) -> MeliError {
    if is_scope_error(body) {
        return MeliError::Provider(ProviderError::ScopeDenied);
    }

    if let Ok(payload) = serde_json::from_str::<OAuthErrorResponse>(body) {
        return match payload.error.as_str() {
            "invalid_grant" => MeliError::Provider(ProviderError::InvalidGrant {
                detail: payload.error_description,
            }),
            "invalid_client" => MeliError::Provider(ProviderError::InvalidClient),
            "invalid_scope" => MeliError::Provider(ProviderError::ScopeDenied),
            _ => MeliError::Provider(ProviderError::Http {
                status,
                body: payload
                    .error_description
                    .or(payload.message)
                    .unwrap_or(payload.error),
            }),
        };
    }

    MeliError::Provider(ProviderError::Http {
        status,
        body: body.to_string(),
    })
}

/// Pull a `message` field out of a provider error body, falling back to
/// the raw body.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_error_detection() {
        assert!(is_scope_error(r#"{"message":"missing scope read"}"#));
        assert!(is_scope_error(r#"{"error":"offline_access required"}"#));
        assert!(is_scope_error("SCOPE not granted"));
        assert!(!is_scope_error(r#"{"message":"not found"}"#));
    }

    #[test]
    fn test_classify_api_error_403_is_scope_denied() {
        let err = classify_api_error(403, r#"{"message":"forbidden"}"#);
        assert!(matches!(
            err,
            MeliError::Provider(ProviderError::ScopeDenied)
        ));
        assert_eq!(err.remediation(), SCOPE_REMEDIATION);
    }

    #[test]
    fn test_classify_api_error_401() {
        let err = classify_api_error(401, r#"{"message":"invalid token"}"#);
        match &err {
            MeliError::Provider(ProviderError::Unauthorized { detail }) => {
                assert_eq!(detail, "invalid token");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
        assert!(err.needs_reauth());
    }

    #[test]
    fn test_classify_api_error_generic_echoes_body() {
        let err = classify_api_error(500, "upstream exploded");
        match err {
            MeliError::Provider(ProviderError::Http { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn test_classify_token_error_invalid_grant_mentions_single_use() {
        let err = classify_token_error(
            400,
            r#"{"error":"invalid_grant","error_description":"code consumed"}"#,
        );
        assert!(matches!(
            err,
            MeliError::Provider(ProviderError::InvalidGrant { .. })
        ));
        let text = err.remediation();
        assert!(text.contains("single-use"));
        assert!(text.contains("expired"));
        assert!(text.contains("10 minutes"));
    }

    #[test]
    fn test_classify_token_error_invalid_client() {
        let err = classify_token_error(400, r#"{"error":"invalid_client"}"#);
        assert!(matches!(
            err,
            MeliError::Provider(ProviderError::InvalidClient)
        ));
        assert!(err.remediation().contains("Client ID"));
    }

    #[test]
    fn test_classify_token_error_invalid_scope_gets_full_remediation() {
        let err = classify_token_error(400, r#"{"error":"invalid_scope"}"#);
        assert_eq!(err.remediation(), SCOPE_REMEDIATION);
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            MeliError::Provider(ProviderError::ScopeDenied).error_code(),
            "MELI_PROVIDER"
        );
        assert_eq!(
            MeliError::Validation(ValidationError::MissingRequired { field: "code" })
                .error_code(),
            "MELI_VALIDATION"
        );
    }

    #[test]
    fn test_validation_error_names_the_field() {
        let err = MeliError::Validation(ValidationError::MissingRequired {
            field: "client_secret",
        });
        assert!(err.remediation().contains("client_secret"));
    }
}
