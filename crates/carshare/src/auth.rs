//! Sign-in against an OAuth/OIDC identity provider.
//!
//! The provider is consumed through the authorization-code flow with PKCE:
//! [`AuthSession::begin_sign_in`] builds the authorization URL, the caller
//! sends the user there, and [`AuthSession::complete_sign_in`] exchanges the
//! returned code through an [`IdentityProvider`] and loads the user profile.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AuthSettings;
use crate::error::{Error, Result};
use crate::services::IdentityProvider;

/// Characters allowed in a PKCE code verifier (RFC 7636 "unreserved").
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Length of generated code verifiers.
const VERIFIER_LEN: usize = 64;

/// Length of generated `state` values.
const STATE_LEN: usize = 24;

/// The provider endpoints used by the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcEndpoints {
    /// Authorization endpoint.
    pub authorization: String,
    /// Token endpoint.
    pub token: String,
    /// User-info endpoint.
    pub user_info: String,
    /// End-session endpoint.
    pub end_session: String,
}

impl OidcEndpoints {
    /// Derive the endpoint set from the provider's base URL.
    #[must_use]
    pub fn from_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorization: format!("{base}/auth"),
            token: format!("{base}/token"),
            user_info: format!("{base}/userinfo"),
            end_session: format!("{base}/session/end"),
        }
    }
}

/// Client registration plus endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// OAuth client id.
    pub client_id: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// Provider endpoints.
    pub endpoints: OidcEndpoints,
}

impl ClientConfig {
    /// Build from configuration.
    #[must_use]
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            scopes: settings.scopes.clone(),
            endpoints: OidcEndpoints::from_base_url(&settings.base_url),
        }
    }

    /// Check that the fields the flow needs are filled in.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first field that is empty or
    /// still a placeholder.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("client_id", &self.client_id),
            ("authorization endpoint", &self.endpoints.authorization),
            ("token endpoint", &self.endpoints.token),
            ("redirect_uri", &self.redirect_uri),
        ];
        for (field, value) in required {
            if value.trim().is_empty() || value.contains("placeholder") {
                return Err(Error::ConfigValidation {
                    message: format!("auth {field} is not set"),
                });
            }
        }
        Url::parse(&self.endpoints.authorization)?;
        Ok(())
    }
}

/// A PKCE verifier and its S256 challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct Pkce {
    verifier: String,
    challenge: String,
}

impl fmt::Debug for Pkce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkce")
            .field("challenge", &self.challenge)
            .finish_non_exhaustive()
    }
}

impl Pkce {
    /// Challenge method sent to the provider.
    pub const METHOD: &'static str = "S256";

    /// Generate a fresh verifier.
    pub fn generate(rng: &mut impl Rng) -> Self {
        Self::from_verifier(random_string(rng, VERIFIER_LEN))
    }

    /// Derive the challenge for a known verifier.
    #[must_use]
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }

    /// The secret verifier.
    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// The public challenge.
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

fn random_string(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| char::from(VERIFIER_CHARSET[rng.gen_range(0..VERIFIER_CHARSET.len())]))
        .collect()
}

/// Generate an opaque `state` value for an authorization request.
pub fn new_state(rng: &mut impl Rng) -> String {
    random_string(rng, STATE_LEN)
}

/// Build the URL the user is sent to for sign-in.
///
/// # Errors
///
/// Returns an error if the authorization endpoint is not a valid URL.
pub fn authorization_url(client: &ClientConfig, pkce: &Pkce, state: &str) -> Result<Url> {
    let mut url = Url::parse(&client.endpoints.authorization)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &client.client_id)
        .append_pair("redirect_uri", &client.redirect_uri)
        .append_pair("scope", &client.scopes.join(" "))
        .append_pair("state", state)
        .append_pair("code_challenge", pkce.challenge())
        .append_pair("code_challenge_method", Pkce::METHOD);
    Ok(url)
}

/// Build the provider's end-session URL.
///
/// # Errors
///
/// Returns an error if the end-session endpoint is not a valid URL.
pub fn end_session_url(client: &ClientConfig, id_token: &str) -> Result<Url> {
    let mut url = Url::parse(&client.endpoints.end_session)?;
    url.query_pairs_mut()
        .append_pair("client_id", &client.client_id)
        .append_pair("id_token_hint", id_token)
        .append_pair("post_logout_redirect_uri", &client.redirect_uri);
    Ok(url)
}

/// Tokens returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Access token.
    pub access_token: String,
    /// OIDC id token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Profile returned by the user-info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Subject identifier.
    pub sub: String,
    /// Display name.
    pub name: String,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// Transitions of the sign-in state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    /// Tokens were obtained.
    SignIn(TokenSet),
    /// The user profile was loaded.
    UserInfo(AuthUser),
    /// The user signed out.
    SignOut,
}

/// Sign-in state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    /// Whether tokens are held.
    pub is_authenticated: bool,
    /// Tokens, once signed in.
    pub tokens: Option<TokenSet>,
    /// Profile, once loaded.
    pub user: Option<AuthUser>,
}

impl AuthState {
    /// Apply an action and return the next state.
    #[must_use]
    pub fn reduce(self, action: AuthAction) -> Self {
        match action {
            AuthAction::SignIn(tokens) => Self {
                is_authenticated: true,
                tokens: Some(tokens),
                ..self
            },
            AuthAction::UserInfo(user) => Self {
                user: Some(user),
                ..self
            },
            AuthAction::SignOut => Self::default(),
        }
    }
}

#[derive(Debug)]
struct PendingSignIn {
    pkce: Pkce,
    state: String,
}

/// A user's sign-in session.
#[derive(Debug)]
pub struct AuthSession {
    client: ClientConfig,
    provider: Arc<dyn IdentityProvider>,
    state: AuthState,
    pending: Option<PendingSignIn>,
}

impl AuthSession {
    /// Create a signed-out session.
    ///
    /// # Errors
    ///
    /// Returns an error if the client configuration is incomplete.
    pub fn new(client: ClientConfig, provider: Arc<dyn IdentityProvider>) -> Result<Self> {
        client.validate()?;
        Ok(Self {
            client,
            provider,
            state: AuthState::default(),
            pending: None,
        })
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Start a sign-in and return the authorization URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization endpoint is not a valid URL.
    pub fn begin_sign_in(&mut self, rng: &mut impl Rng) -> Result<Url> {
        let pkce = Pkce::generate(rng);
        let state = new_state(rng);
        let url = authorization_url(&self.client, &pkce, &state)?;
        debug!(challenge = pkce.challenge(), "Sign-in started");
        self.pending = Some(PendingSignIn { pkce, state });
        Ok(url)
    }

    /// Finish a sign-in with the code and state returned to the redirect URI.
    ///
    /// # Errors
    ///
    /// Returns an auth error if no sign-in is pending, the state does not
    /// match, or the provider rejects the exchange.
    pub async fn complete_sign_in(
        &mut self,
        code: &str,
        returned_state: &str,
    ) -> Result<AuthUser> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| Error::auth("no sign-in in progress"))?;
        if pending.state != returned_state {
            warn!("Sign-in state mismatch");
            return Err(Error::auth("state mismatch"));
        }

        let tokens = self
            .provider
            .exchange_code(code, pending.pkce.verifier(), &self.client.redirect_uri)
            .await?;
        let access_token = tokens.access_token.clone();
        self.state = std::mem::take(&mut self.state).reduce(AuthAction::SignIn(tokens));

        let user = self.provider.user_info(&access_token).await?;
        self.state = std::mem::take(&mut self.state).reduce(AuthAction::UserInfo(user.clone()));
        info!(sub = %user.sub, "Signed in");
        Ok(user)
    }

    /// Sign out and return the provider's end-session URL.
    ///
    /// # Errors
    ///
    /// Returns an auth error if no id token is held.
    pub fn sign_out(&mut self) -> Result<Url> {
        let id_token = self
            .state
            .tokens
            .as_ref()
            .and_then(|t| t.id_token.clone())
            .ok_or_else(|| Error::auth("no id token found"))?;
        let url = end_session_url(&self.client, &id_token)?;
        self.state = std::mem::take(&mut self.state).reduce(AuthAction::SignOut);
        info!("Signed out");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::services::fake::FakeIdentityProvider;

    fn client() -> ClientConfig {
        ClientConfig {
            client_id: "client-123".to_string(),
            redirect_uri: "carshare://callback".to_string(),
            scopes: vec!["openid".to_string(), "profile".to_string()],
            endpoints: OidcEndpoints::from_base_url("https://auth.example.com/oauth/"),
        }
    }

    fn user() -> AuthUser {
        AuthUser {
            sub: "sub-9".to_string(),
            name: "Grace".to_string(),
            email: None,
            picture: None,
        }
    }

    fn query(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_endpoints_from_base_url() {
        let endpoints = OidcEndpoints::from_base_url("https://auth.example.com/oauth/");
        assert_eq!(endpoints.authorization, "https://auth.example.com/oauth/auth");
        assert_eq!(endpoints.token, "https://auth.example.com/oauth/token");
        assert_eq!(endpoints.user_info, "https://auth.example.com/oauth/userinfo");
        assert_eq!(
            endpoints.end_session,
            "https://auth.example.com/oauth/session/end"
        );
    }

    #[test]
    fn test_validate_rejects_placeholders() {
        assert!(client().validate().is_ok());

        let mut bad = client();
        bad.client_id = "placeholder-client".to_string();
        assert!(bad.validate().is_err());

        let mut empty = client();
        empty.redirect_uri = String::new();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_pkce_rfc7636_vector() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(pkce.challenge(), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_pkce_generate() {
        let mut rng = StdRng::seed_from_u64(5);
        let pkce = Pkce::generate(&mut rng);
        assert_eq!(pkce.verifier().len(), VERIFIER_LEN);
        assert!(pkce
            .verifier()
            .bytes()
            .all(|b| VERIFIER_CHARSET.contains(&b)));
        assert_eq!(pkce, Pkce::from_verifier(pkce.verifier()));
    }

    #[test]
    fn test_authorization_url() {
        let pkce = Pkce::from_verifier("verifier-verifier-verifier-verifier-verifier");
        let url = authorization_url(&client(), &pkce, "xyz").unwrap();

        assert_eq!(url.path(), "/oauth/auth");
        assert_eq!(query(&url, "response_type").as_deref(), Some("code"));
        assert_eq!(query(&url, "client_id").as_deref(), Some("client-123"));
        assert_eq!(query(&url, "scope").as_deref(), Some("openid profile"));
        assert_eq!(query(&url, "state").as_deref(), Some("xyz"));
        assert_eq!(
            query(&url, "code_challenge").as_deref(),
            Some(pkce.challenge())
        );
        assert_eq!(
            query(&url, "code_challenge_method").as_deref(),
            Some("S256")
        );
    }

    #[test]
    fn test_end_session_url() {
        let url = end_session_url(&client(), "id-token").unwrap();
        assert_eq!(url.path(), "/oauth/session/end");
        assert_eq!(query(&url, "id_token_hint").as_deref(), Some("id-token"));
        assert_eq!(
            query(&url, "post_logout_redirect_uri").as_deref(),
            Some("carshare://callback")
        );
    }

    #[test]
    fn test_reducer() {
        let tokens = TokenSet {
            access_token: "a".to_string(),
            id_token: Some("i".to_string()),
            refresh_token: None,
            expires_in: Some(60),
        };
        let state = AuthState::default().reduce(AuthAction::SignIn(tokens.clone()));
        assert!(state.is_authenticated);
        assert_eq!(state.tokens, Some(tokens));
        assert!(state.user.is_none());

        let state = state.reduce(AuthAction::UserInfo(user()));
        assert_eq!(state.user, Some(user()));
        assert!(state.is_authenticated);

        assert_eq!(state.reduce(AuthAction::SignOut), AuthState::default());
    }

    #[test]
    fn test_token_set_deserialize() {
        let json = r#"{"access_token":"abc","id_token":"def","expires_in":3600,"token_type":"Bearer"}"#;
        let tokens: TokenSet = serde_json::from_str(json).unwrap();
        assert_eq!(tokens.access_token, "abc");
        assert_eq!(tokens.expires_in, Some(3600));
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_session_sign_in_and_out() {
        let provider = Arc::new(FakeIdentityProvider::new("code-1", user()));
        let mut session = AuthSession::new(client(), provider.clone()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let url = session.begin_sign_in(&mut rng).unwrap();
        let state = query(&url, "state").unwrap();

        let signed_in = session.complete_sign_in("code-1", &state).await.unwrap();
        assert_eq!(signed_in, user());
        assert!(session.state().is_authenticated);
        assert_eq!(provider.verifiers().len(), 1);
        assert_eq!(provider.verifiers()[0].len(), VERIFIER_LEN);

        let logout = session.sign_out().unwrap();
        assert_eq!(query(&logout, "id_token_hint").as_deref(), Some("id-sub-9"));
        assert_eq!(session.state(), &AuthState::default());
    }

    #[tokio::test]
    async fn test_session_rejects_state_mismatch() {
        let provider = Arc::new(FakeIdentityProvider::new("code-1", user()));
        let mut session = AuthSession::new(client(), provider.clone()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        session.begin_sign_in(&mut rng).unwrap();

        let err = session.complete_sign_in("code-1", "forged").await.unwrap_err();
        assert!(err.to_string().contains("state mismatch"));
        assert!(provider.verifiers().is_empty());
        assert!(!session.state().is_authenticated);
    }

    #[tokio::test]
    async fn test_session_requires_pending_sign_in() {
        let provider = Arc::new(FakeIdentityProvider::new("code-1", user()));
        let mut session = AuthSession::new(client(), provider).unwrap();
        assert!(session.complete_sign_in("code-1", "s").await.is_err());
        assert!(session.sign_out().is_err());
    }
}
