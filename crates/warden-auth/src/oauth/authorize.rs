//! Authorization endpoint request and response types.
//!
//! # OAuth 2.0 Authorization Code Flow
//!
//! 1. Client redirects the user to `/authorize` with request parameters
//! 2. The user authenticates and approves the requested scopes
//! 3. Server redirects back to the client with an authorization code
//! 4. Client exchanges the code at `/token`
//!
//! Every parameter is optional at the type level so that missing values are
//! reported by the engine with the correct routing (direct error before the
//! redirect URI is trusted, redirect after).

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AuthError;

/// Authorization request parameters.
///
/// # Example
///
/// ```ignore
/// GET /authorize?
///   response_type=code
///   &client_id=my-app
///   &redirect_uri=https://app.example.com/callback
///   &scope=openid profile
///   &state=abc123xyz
///   &code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM
///   &code_challenge_method=S256
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationRequest {
    /// Must be "code".
    pub response_type: Option<String>,

    pub client_id: Option<String>,

    /// Must exactly match one of the client's registered redirect URIs.
    pub redirect_uri: Option<String>,

    /// Requested scopes (space-separated, at least one).
    pub scope: Option<String>,

    /// Opaque client value echoed on every redirect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// PKCE challenge, base64url SHA-256 of the verifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// Must be "S256" when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// OpenID Connect nonce, copied into the access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl AuthorizationRequest {
    /// Re-encodes the request as a query string, used to resume the flow
    /// after login or consent.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        let pairs = [
            ("response_type", &self.response_type),
            ("client_id", &self.client_id),
            ("redirect_uri", &self.redirect_uri),
            ("scope", &self.scope),
            ("state", &self.state),
            ("code_challenge", &self.code_challenge),
            ("code_challenge_method", &self.code_challenge_method),
            ("nonce", &self.nonce),
        ];
        for (name, value) in pairs {
            if let Some(value) = value {
                serializer.append_pair(name, value);
            }
        }
        serializer.finish()
    }
}

/// Successful authorization response, delivered on the redirect URI.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationResponse {
    /// Single-use authorization code.
    pub code: String,

    /// Echoed state parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl AuthorizationResponse {
    #[must_use]
    pub fn new(code: String, state: Option<String>) -> Self {
        Self { code, state }
    }

    /// Builds the redirect URL with response parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the redirect URI does not parse.
    pub fn to_redirect_url(&self, redirect_uri: &str) -> Result<String, url::ParseError> {
        let mut url = Url::parse(redirect_uri)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("code", &self.code);
            if let Some(state) = &self.state {
                pairs.append_pair("state", state);
            }
        }
        Ok(url.to_string())
    }
}

/// Authorization error delivered on the redirect URI.
///
/// # Example
///
/// ```ignore
/// HTTP/1.1 302 Found
/// Location: https://app.example.com/callback?
///   error=invalid_request
///   &error_description=code_challenge+is+required
///   &state=abc123xyz
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationErrorResponse {
    /// OAuth 2.0 error code.
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl AuthorizationErrorResponse {
    /// Builds the wire error for `err`, using its public description.
    #[must_use]
    pub fn from_error(err: &AuthError, state: Option<String>) -> Self {
        Self {
            error: err.oauth_error_code().to_string(),
            error_description: Some(err.public_description()),
            state,
        }
    }

    /// Builds the redirect URL with error parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the redirect URI does not parse.
    pub fn to_redirect_url(&self, redirect_uri: &str) -> Result<String, url::ParseError> {
        let mut url = Url::parse(redirect_uri)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("error", &self.error);
            if let Some(desc) = &self.error_description {
                pairs.append_pair("error_description", desc);
            }
            if let Some(state) = &self.state {
                pairs.append_pair("state", state);
            }
        }
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_request_deserialize_missing_fields() {
        let request: AuthorizationRequest =
            serde_json::from_str(r#"{"client_id":"app","scope":"openid"}"#).unwrap();
        assert_eq!(request.client_id.as_deref(), Some("app"));
        assert!(request.redirect_uri.is_none());
        assert!(request.state.is_none());
    }

    #[test]
    fn test_success_redirect_echoes_state() {
        let url = AuthorizationResponse::new("c0de".to_string(), Some("x y&z".to_string()))
            .to_redirect_url("https://a.test/cb")
            .unwrap();
        assert_eq!(
            query(&url),
            vec![
                ("code".to_string(), "c0de".to_string()),
                ("state".to_string(), "x y&z".to_string())
            ]
        );
    }

    #[test]
    fn test_success_redirect_without_state() {
        let url = AuthorizationResponse::new("c0de".to_string(), None)
            .to_redirect_url("https://a.test/cb?tenant=1")
            .unwrap();
        let pairs = query(&url);
        assert_eq!(pairs[0], ("tenant".to_string(), "1".to_string()));
        assert!(pairs.iter().all(|(k, _)| k != "state"));
    }

    #[test]
    fn test_error_redirect() {
        let err = AuthError::invalid_scope("unknown scope 'admin'");
        let url = AuthorizationErrorResponse::from_error(&err, Some("xyz".to_string()))
            .to_redirect_url("https://a.test/cb")
            .unwrap();
        let pairs = query(&url);
        assert!(pairs.contains(&("error".to_string(), "invalid_scope".to_string())));
        assert!(pairs.contains(&("state".to_string(), "xyz".to_string())));
    }

    #[test]
    fn test_to_query_string_round_trips_through_serde() {
        let request = AuthorizationRequest {
            response_type: Some("code".to_string()),
            client_id: Some("app".to_string()),
            redirect_uri: Some("https://a.test/cb".to_string()),
            scope: Some("openid profile".to_string()),
            state: Some("s".to_string()),
            ..AuthorizationRequest::default()
        };
        let qs = request.to_query_string();
        assert!(qs.contains("scope=openid+profile"));
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(qs.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(pairs.len(), 5);
    }
}
