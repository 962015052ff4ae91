//! OAuth 2.0 provider configuration and wire-level request/response types.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	id::{ClientId, ProviderId},
	provider::{ArtifactSecret, ScopeSet, SigningKeyPair, Validity},
};

/// Confidential clients can keep a secret; public clients prove possession
/// via PKCE instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
	#[default]
	/// Client authenticates with a client secret.
	Confidential,
	/// Client cannot hold a secret; PKCE is mandatory.
	Public,
}

/// Configures how the `iss` field of issued artifacts is constructed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerMode {
	/// Same issuer identifier for every provider.
	Global,
	#[default]
	/// Issuer derived from the application slug of each provider.
	PerProvider,
}

/// PKCE challenge methods accepted at authorization time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	#[serde(rename = "S256")]
	S256,
	/// Plain-text comparison; accepted for legacy clients only.
	#[serde(rename = "plain")]
	Plain,
}
impl CodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			CodeChallengeMethod::S256 => "S256",
			CodeChallengeMethod::Plain => "plain",
		}
	}
}

/// PKCE challenge recorded with an authorization code at issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceChallenge {
	/// The challenge value supplied by the client.
	pub challenge: String,
	/// Method the verifier must be checked with.
	pub method: CodeChallengeMethod,
}
impl PkceChallenge {
	/// Checks a redemption-time verifier against the recorded challenge.
	pub fn matches(&self, verifier: &str) -> bool {
		match self.method {
			CodeChallengeMethod::S256 => compute_s256_challenge(verifier) == self.challenge,
			CodeChallengeMethod::Plain => verifier == self.challenge,
		}
	}
}

/// Derives the S256 PKCE challenge for a verifier.
pub fn compute_s256_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Authorization parameters captured when an authorization flow starts.
///
/// Carried through the plan as the provider-terminal marker payload and bound
/// into the issued code.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthorizationRequest {
	/// Requesting client.
	pub client: ClientId,
	/// Redirect URI the response is sent to; must be registered.
	pub redirect_uri: Url,
	/// Requested scopes.
	pub scope: ScopeSet,
	/// Opaque state round-tripped to the client.
	pub state: Option<String>,
	/// PKCE challenge, if the client supplied one.
	pub code_challenge: Option<PkceChallenge>,
}

/// Client credentials presented at the token endpoint.
#[derive(Clone, Debug)]
pub struct ClientCredentials {
	/// Client identifier.
	pub client: ClientId,
	/// Client secret for confidential clients.
	pub client_secret: Option<String>,
}

/// Authorization-code redemption request.
#[derive(Clone, Debug)]
pub struct CodeRedemption {
	/// Client credentials.
	pub credentials: ClientCredentials,
	/// The code being redeemed.
	pub code: String,
	/// Redirect URI repeated from the authorization request.
	pub redirect_uri: Url,
	/// PKCE verifier, when the code was issued with a challenge.
	pub code_verifier: Option<String>,
}

/// Wire-shaped token endpoint response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Bearer access token.
	pub access_token: String,
	/// Token type; always `Bearer`.
	pub token_type: String,
	/// Seconds until the access token expires.
	pub expires_in: i64,
	/// Refresh token, when `offline_access` was granted.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,
	/// Space-delimited granted scopes.
	pub scope: String,
	/// Issuer identifier computed per the provider's issuer mode.
	pub issuer: String,
}

/// OAuth 2.0 / OpenID Connect provider instance configuration.
#[derive(Clone)]
pub struct OAuth2ProviderConfig {
	/// Provider identifier.
	pub id: ProviderId,
	/// Application slug the provider is attached to; feeds per-provider issuers.
	pub application_slug: String,
	/// Client type of the registered application.
	pub client_type: ClientType,
	/// Registered client identifier.
	pub client_id: ClientId,
	/// Registered client secret; empty for public clients.
	pub client_secret: ArtifactSecret,
	/// Redirect URIs allowed for this client; compared strictly.
	pub redirect_uris: Vec<Url>,
	/// Validity window of authorization codes.
	pub access_code_validity: Validity,
	/// Validity window of access tokens.
	pub access_token_validity: Validity,
	/// Validity window of refresh tokens.
	pub refresh_token_validity: Validity,
	/// Issuer construction mode.
	pub issuer_mode: IssuerMode,
	/// Optional key used to sign issued artifacts.
	pub signing_key: Option<SigningKeyPair>,
}
impl OAuth2ProviderConfig {
	/// Creates a configuration with the default validity windows
	/// (codes one minute, access tokens one hour, refresh tokens thirty days).
	pub fn new(
		id: ProviderId,
		application_slug: impl Into<String>,
		client_id: ClientId,
		client_secret: impl Into<String>,
	) -> Self {
		Self {
			id,
			application_slug: application_slug.into(),
			client_type: ClientType::Confidential,
			client_id,
			client_secret: ArtifactSecret::new(client_secret),
			redirect_uris: Vec::new(),
			access_code_validity: Validity::parse("minutes=1")
				.expect("Default code validity is well-formed."),
			access_token_validity: Validity::parse("hours=1")
				.expect("Default access token validity is well-formed."),
			refresh_token_validity: Validity::parse("days=30")
				.expect("Default refresh token validity is well-formed."),
			issuer_mode: IssuerMode::default(),
			signing_key: None,
		}
	}

	/// Marks the client public (PKCE mandatory, no secret check).
	pub fn public_client(mut self) -> Self {
		self.client_type = ClientType::Public;

		self
	}

	/// Registers an allowed redirect URI.
	pub fn with_redirect_uri(mut self, uri: Url) -> Self {
		self.redirect_uris.push(uri);

		self
	}

	/// Overrides the authorization-code validity window.
	pub fn with_access_code_validity(mut self, validity: Validity) -> Self {
		self.access_code_validity = validity;

		self
	}

	/// Overrides the access-token validity window.
	pub fn with_access_token_validity(mut self, validity: Validity) -> Self {
		self.access_token_validity = validity;

		self
	}

	/// Overrides the refresh-token validity window.
	pub fn with_refresh_token_validity(mut self, validity: Validity) -> Self {
		self.refresh_token_validity = validity;

		self
	}

	/// Overrides the issuer mode.
	pub fn with_issuer_mode(mut self, mode: IssuerMode) -> Self {
		self.issuer_mode = mode;

		self
	}

	/// Attaches a signing keypair.
	pub fn with_signing_key(mut self, key: SigningKeyPair) -> Self {
		self.signing_key = Some(key);

		self
	}

	/// Strict redirect URI check.
	pub fn allows_redirect(&self, uri: &Url) -> bool {
		self.redirect_uris.iter().any(|allowed| allowed == uri)
	}
}
impl Debug for OAuth2ProviderConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2ProviderConfig")
			.field("id", &self.id)
			.field("application_slug", &self.application_slug)
			.field("client_type", &self.client_type)
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("redirect_uris", &self.redirect_uris)
			.field("issuer_mode", &self.issuer_mode)
			.finish()
	}
}
