//! Authorization helpers: token-format heuristic, credential
//! pre-flight checks, authorization URL assembly and redirect-error
//! diagnostics.

use rand::distributions::Alphanumeric;
use rand::Rng;
use url::Url;

use crate::config::{MeliConfig, REQUIRED_SCOPES};
use crate::errors::SCOPE_REMEDIATION;
use crate::types::CredentialReport;

pub mod exchange;

pub use exchange::{exchange_code_for_token, TokenExchanger};

/// Minimum plausible access-token length.
const MIN_TOKEN_LEN: usize = 20;

/// Minimum length for the generic token shape.
const MIN_GENERIC_TOKEN_LEN: usize = 30;

/// Provider token prefix, matched case-insensitively.
const TOKEN_PREFIX: &str = "APP_USR-";

/// Heuristic check that a string looks like an access token.
///
/// Accepts either the provider-prefixed shape
/// (`APP_USR-` followed by word/hyphen characters) or a generic run of
/// 30+ alphanumeric/hyphen/underscore characters. The point is to catch
/// an authorization *code* pasted where the access *token* belongs and
/// say so, instead of letting the provider answer with an opaque 401.
///
/// This is a copy-paste heuristic, not a security boundary: a
/// well-formed bogus token passes, and the provider response stays the
/// source of truth.
pub fn is_valid_token_format(token: &str) -> bool {
    let token = token.trim();
    if token.len() < MIN_TOKEN_LEN {
        return false;
    }

    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';

    if let Some(prefix) = token.get(..TOKEN_PREFIX.len()) {
        if prefix.eq_ignore_ascii_case(TOKEN_PREFIX) {
            let rest = &token[TOKEN_PREFIX.len()..];
            if !rest.is_empty() && rest.chars().all(is_word) {
                return true;
            }
        }
    }

    token.len() >= MIN_GENERIC_TOKEN_LEN && token.chars().all(is_word)
}

/// Pre-flight check of the operator-supplied OAuth credentials.
///
/// Collects every problem instead of stopping at the first, so the
/// operator can fix the whole form in one pass.
pub fn validate_credentials(
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
) -> CredentialReport {
    let mut errors = Vec::new();

    let client_id = client_id.trim();
    if client_id.is_empty() {
        errors.push("client_id is required".to_string());
    } else if !client_id.chars().all(|c| c.is_ascii_digit()) {
        errors.push("client_id must be numeric (the application id from the developer panel)".to_string());
    }

    if client_secret.trim().is_empty() {
        errors.push("client_secret is required".to_string());
    }

    let redirect_uri = redirect_uri.trim();
    if redirect_uri.is_empty() {
        errors.push("redirect_uri is required".to_string());
    } else {
        match Url::parse(redirect_uri) {
            Ok(url) if url.scheme() == "https" => {}
            Ok(url) => errors.push(format!(
                "redirect_uri must use https (got {})",
                url.scheme()
            )),
            Err(_) => errors.push("redirect_uri must be an absolute URL".to_string()),
        }
    }

    CredentialReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Build the browser authorization URL the operator must visit.
///
/// `{auth_base}/authorization?response_type=code&client_id=…&redirect_uri=…&scope=…[&state=…]`
pub fn build_authorization_url(
    config: &MeliConfig,
    client_id: &str,
    redirect_uri: &str,
    state: Option<&str>,
) -> String {
    let mut url = config.auth_base.clone();
    url.set_path("/authorization");
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("response_type", "code");
        query.append_pair("client_id", client_id.trim());
        query.append_pair("redirect_uri", redirect_uri.trim());
        query.append_pair("scope", &REQUIRED_SCOPES.join(" "));
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    url.into()
}

/// Generate a random `state` value for the authorization redirect.
pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Map the error text of a failed authorization redirect onto
/// actionable guidance.
///
/// Scope/permission-flavored failures get the full scope remediation;
/// anything else is echoed unchanged.
pub fn diagnose_authorization_error(error: &str) -> String {
    let lower = error.to_lowercase();
    let scope_flavored = ["scope", "unauthorized", "policy", "permission"]
        .iter()
        .any(|needle| lower.contains(needle));
    if scope_flavored {
        SCOPE_REMEDIATION.to_string()
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_tokens_rejected() {
        // Everything under 20 chars fails, whatever the shape.
        for token in ["", "abc", "APP_USR-123", "TG-12345678", "x".repeat(19).as_str()] {
            assert!(!is_valid_token_format(token), "accepted: {token:?}");
        }
    }

    #[test]
    fn test_prefixed_token_accepted() {
        assert!(is_valid_token_format(
            "APP_USR-1234567890-123456-abcdef1234567890"
        ));
        assert!(is_valid_token_format("app_usr-1234567890-abcdef"));
        assert!(is_valid_token_format("  APP_USR-1234567890-abcdef  "));
    }

    #[test]
    fn test_generic_token_accepted() {
        assert!(is_valid_token_format(
            "a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6"
        ));
        // 20-29 chars without the prefix is not enough for the generic shape.
        assert!(!is_valid_token_format("a1b2c3d4e5f6g7h8i9j0"));
    }

    #[test]
    fn test_token_with_invalid_characters_rejected() {
        assert!(!is_valid_token_format(
            "APP_USR-1234567890 123456-abcdef1234567890"
        ));
        assert!(!is_valid_token_format(
            "token.with.dots.that.is.long.enough.to.pass"
        ));
    }

    #[test]
    fn test_heuristic_accepts_well_formed_bogus_token() {
        // The gate only checks shape; a fabricated token passes and the
        // provider's 401 remains the authoritative rejection.
        assert!(is_valid_token_format("APP_USR-0000000000-000000-deadbeef"));
    }

    #[test]
    fn test_validate_credentials_ok() {
        let report = validate_credentials(
            "1234567890",
            "topsecret",
            "https://app.example.com/callback",
        );
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_validate_credentials_collects_all_errors() {
        let report = validate_credentials("abc", "", "ftp://example.com");
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors[0].contains("numeric"));
        assert!(report.errors[1].contains("client_secret"));
        assert!(report.errors[2].contains("https"));
    }

    #[test]
    fn test_build_authorization_url() {
        let config = MeliConfig::default();
        let url = build_authorization_url(
            &config,
            "123456",
            "https://app.example.com/callback",
            Some("abc123"),
        );
        assert!(url.starts_with("https://auth.mercadolivre.com.br/authorization?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=123456"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback"));
        assert!(url.contains("scope=read+write+offline_access"));
        assert!(url.contains("state=abc123"));
    }

    #[test]
    fn test_build_authorization_url_without_state() {
        let config = MeliConfig::default();
        let url =
            build_authorization_url(&config, "123456", "https://app.example.com/cb", None);
        assert!(!url.contains("state="));
    }

    #[test]
    fn test_generate_state_shape() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_diagnose_authorization_error() {
        assert_eq!(
            diagnose_authorization_error("invalid scope requested"),
            SCOPE_REMEDIATION
        );
        assert_eq!(
            diagnose_authorization_error("Unauthorized application"),
            SCOPE_REMEDIATION
        );
        assert_eq!(
            diagnose_authorization_error("server on fire"),
            "server on fire"
        );
    }
}
