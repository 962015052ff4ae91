//! Token engine driving artifact issuance, redemption, and validation.

// std
use std::collections::BTreeMap;
// self
use crate::{
	_prelude::*,
	error::ProviderError,
	id::{ArtifactId, ProviderId, UserRef},
	obs::{self, EngineOp, OpOutcome},
	provider::{
		ArtifactSecret, AuthorizationRequest, ClientCredentials, ClientType, CodeRecord,
		CodeRedemption, OAuth2ProviderConfig, ProviderSetupUrls, SamlAssertionDocument,
		SamlProviderConfig, ScopeSet, TokenArtifact, TokenKind, TokenResponse, compute_issuer,
		setup,
	},
	store::{ArtifactStore, ConsumeOutcome, RotateOutcome},
};

/// Scope whose presence makes the engine mint a refresh token alongside the
/// access token.
const SCOPE_OFFLINE_ACCESS: &str = "offline_access";

/// Protocol-tagged provider configuration registered with the engine.
#[derive(Clone, Debug)]
pub enum ProviderConfig {
	/// OAuth 2.0 / OpenID Connect provider.
	OAuth2(OAuth2ProviderConfig),
	/// SAML provider.
	Saml(SamlProviderConfig),
}
impl ProviderConfig {
	/// Identifier of the wrapped provider.
	pub fn id(&self) -> &ProviderId {
		match self {
			ProviderConfig::OAuth2(config) => &config.id,
			ProviderConfig::Saml(config) => &config.id,
		}
	}
}

/// Authorization code handed back to the redirect flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IssuedCode {
	/// The single-use code secret; embedded into the redirect.
	pub code: String,
	/// State round-tripped from the authorization request.
	pub state: Option<String>,
	/// Fully-formed redirect URL carrying `code` (and `state`).
	pub redirect: Url,
}

/// Artifact minted when a flow reaches its provider terminal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum IssuedArtifact {
	/// OAuth 2.0 authorization code plus redirect target.
	AuthorizationCode(IssuedCode),
	/// Signed SAML assertion document for the ACS POST.
	SamlResponse(Box<SamlAssertionDocument>),
}

/// Issues and validates protocol artifacts for registered providers.
///
/// All state lives in the [`ArtifactStore`]; the engine itself only holds
/// provider configurations and is cheap to share.
pub struct TokenEngine {
	providers: RwLock<HashMap<ProviderId, ProviderConfig>>,
	store: Arc<dyn ArtifactStore>,
	base_url: Url,
}
impl TokenEngine {
	/// Creates an engine over the provided store and deployment base URL.
	pub fn new(store: Arc<dyn ArtifactStore>, base_url: Url) -> Self {
		Self { providers: RwLock::new(HashMap::new()), store, base_url }
	}

	/// Registers or replaces a provider configuration.
	pub fn register(&self, config: ProviderConfig) {
		self.providers.write().insert(config.id().clone(), config);
	}

	/// Finalizes a completed flow against the bound provider.
	pub async fn finalize_flow(
		&self,
		provider: &ProviderId,
		authorization: Option<&AuthorizationRequest>,
		subject: &UserRef,
	) -> Result<IssuedArtifact> {
		match self.config(provider)? {
			ProviderConfig::OAuth2(_) => {
				let authorization = authorization.ok_or_else(|| ProviderError::InvalidGrant {
					reason: "Authorization parameters are missing for an OAuth2 provider.".into(),
				})?;
				let code = self.issue_authorization_code(provider, authorization, subject).await?;

				Ok(IssuedArtifact::AuthorizationCode(code))
			},
			ProviderConfig::Saml(_) => {
				let assertion =
					self.issue_saml_response(provider, subject, BTreeMap::new()).await?;

				Ok(IssuedArtifact::SamlResponse(Box::new(assertion)))
			},
		}
	}

	/// Issues a single-use authorization code bound to the request.
	pub async fn issue_authorization_code(
		&self,
		provider: &ProviderId,
		request: &AuthorizationRequest,
		subject: &UserRef,
	) -> Result<IssuedCode> {
		obs::record_engine_op(EngineOp::IssueCode, OpOutcome::Attempt);

		let result = self.issue_authorization_code_inner(provider, request, subject).await;

		obs::record_engine_op(EngineOp::IssueCode, OpOutcome::from_result(&result));

		result
	}

	async fn issue_authorization_code_inner(
		&self,
		provider: &ProviderId,
		request: &AuthorizationRequest,
		subject: &UserRef,
	) -> Result<IssuedCode> {
		let config = self.oauth2_config(provider)?;

		if request.client != config.client_id {
			return Err(ProviderError::InvalidClient {
				reason: format!("Client `{}` is not registered with this provider", request.client),
			}
			.into());
		}
		if !config.allows_redirect(&request.redirect_uri) {
			return Err(ProviderError::RedirectUriMismatch {
				uri: request.redirect_uri.to_string(),
			}
			.into());
		}
		if config.client_type == ClientType::Public && request.code_challenge.is_none() {
			return Err(ProviderError::InvalidGrant {
				reason: "PKCE is required for public clients".into(),
			}
			.into());
		}

		let now = OffsetDateTime::now_utc();
		let code = ArtifactSecret::generate();
		let record = CodeRecord {
			id: ArtifactId::generate(),
			provider: provider.clone(),
			client: request.client.clone(),
			subject: subject.clone(),
			scope: request.scope.clone(),
			redirect_uri: request.redirect_uri.clone(),
			code: code.clone(),
			code_challenge: request.code_challenge.clone(),
			issued_at: now,
			expires_at: config.access_code_validity.from_instant(now),
			consumed: false,
		};

		self.store.save_code(record).await?;

		let mut redirect = request.redirect_uri.clone();

		{
			let mut pairs = redirect.query_pairs_mut();

			pairs.append_pair("code", code.expose());

			if let Some(state) = request.state.as_deref() {
				pairs.append_pair("state", state);
			}
		}

		Ok(IssuedCode { code: code.expose().to_string(), state: request.state.clone(), redirect })
	}

	/// Redeems an authorization code for a token pair.
	///
	/// Consumption is a storage-level check-and-set: of two concurrent
	/// redemptions exactly one succeeds, and the loser triggers revocation of
	/// every token the winner minted before surfacing
	/// [`ProviderError::CodeAlreadyUsed`].
	pub async fn redeem_authorization_code(
		&self,
		provider: &ProviderId,
		redemption: &CodeRedemption,
	) -> Result<TokenResponse> {
		obs::record_engine_op(EngineOp::RedeemCode, OpOutcome::Attempt);

		let result = self.redeem_authorization_code_inner(provider, redemption).await;

		obs::record_engine_op(EngineOp::RedeemCode, OpOutcome::from_result(&result));

		result
	}

	async fn redeem_authorization_code_inner(
		&self,
		provider: &ProviderId,
		redemption: &CodeRedemption,
	) -> Result<TokenResponse> {
		let config = self.oauth2_config(provider)?;

		authenticate_client(&config, &redemption.credentials)?;

		let record = match self.store.consume_code(provider, &redemption.code).await? {
			ConsumeOutcome::Consumed(record) => record,
			ConsumeOutcome::AlreadyConsumed(record) => {
				let now = OffsetDateTime::now_utc();
				let revoked = self.store.revoke_minted_by(&record.id, now).await?;

				obs::record_replay_revocations(revoked);

				return Err(ProviderError::CodeAlreadyUsed.into());
			},
			ConsumeOutcome::Missing =>
				return Err(ProviderError::InvalidGrant {
					reason: "Authorization code is unknown".into(),
				}
				.into()),
		};
		let now = OffsetDateTime::now_utc();

		if record.is_expired_at(now) {
			return Err(ProviderError::InvalidGrant {
				reason: "Authorization code has expired".into(),
			}
			.into());
		}
		if record.client != redemption.credentials.client {
			return Err(ProviderError::InvalidGrant {
				reason: "Authorization code was issued to a different client".into(),
			}
			.into());
		}
		if record.redirect_uri != redemption.redirect_uri {
			return Err(ProviderError::RedirectUriMismatch {
				uri: redemption.redirect_uri.to_string(),
			}
			.into());
		}

		verify_pkce(record.code_challenge.as_ref(), redemption.code_verifier.as_deref())?;

		self.mint_response(&config, &record.subject, &record.scope, Some(record.id.clone()), now)
			.await
	}

	/// Rotates a refresh token: the old pair is revoked and a new pair issued.
	pub async fn refresh_access_token(
		&self,
		provider: &ProviderId,
		credentials: &ClientCredentials,
		refresh_secret: &str,
	) -> Result<TokenResponse> {
		obs::record_engine_op(EngineOp::Refresh, OpOutcome::Attempt);

		let result = self.refresh_access_token_inner(provider, credentials, refresh_secret).await;

		obs::record_engine_op(EngineOp::Refresh, OpOutcome::from_result(&result));

		result
	}

	async fn refresh_access_token_inner(
		&self,
		provider: &ProviderId,
		credentials: &ClientCredentials,
		refresh_secret: &str,
	) -> Result<TokenResponse> {
		let config = self.oauth2_config(provider)?;

		authenticate_client(&config, credentials)?;

		let current = self
			.store
			.fetch_token(provider, refresh_secret, TokenKind::Refresh)
			.await?
			.ok_or_else(|| ProviderError::InvalidGrant {
				reason: "Refresh token is unknown".into(),
			})?;
		let now = OffsetDateTime::now_utc();

		if current.is_revoked() {
			return Err(ProviderError::Revoked.into());
		}
		if current.is_expired_at(now) {
			return Err(ProviderError::InvalidGrant {
				reason: "Refresh token has expired".into(),
			}
			.into());
		}

		let (access, refresh) =
			mint_pair(&config, &current.subject, &current.scope, current.minted_by.clone(), now);
		let response = self.build_response(&config, &access, refresh.as_ref());
		let mut replacements = vec![access];

		replacements.extend(refresh);

		match self.store.rotate_refresh(provider, refresh_secret, replacements, now).await? {
			RotateOutcome::Rotated => Ok(response),
			RotateOutcome::Replayed => Err(ProviderError::Revoked.into()),
			RotateOutcome::Missing => Err(ProviderError::InvalidGrant {
				reason: "Refresh token disappeared during rotation".into(),
			}
			.into()),
		}
	}

	/// Validates an access token against its issuance-time expiry.
	pub async fn validate_access_token(
		&self,
		provider: &ProviderId,
		secret: &str,
		at: OffsetDateTime,
	) -> Result<TokenArtifact> {
		let artifact = self
			.store
			.fetch_token(provider, secret, TokenKind::Access)
			.await?
			.ok_or_else(|| ProviderError::InvalidGrant {
				reason: "Access token is unknown".into(),
			})?;

		if artifact.is_revoked() {
			return Err(ProviderError::Revoked.into());
		}
		if artifact.is_expired_at(at) {
			return Err(ProviderError::InvalidGrant {
				reason: "Access token has expired".into(),
			}
			.into());
		}

		Ok(artifact)
	}

	/// Revokes a token by secret; a no-op result when no token matches.
	pub async fn revoke_token(
		&self,
		provider: &ProviderId,
		secret: &str,
		kind: TokenKind,
	) -> Result<bool> {
		let Some(artifact) = self.store.fetch_token(provider, secret, kind).await? else {
			return Ok(false);
		};
		let revoked =
			self.store.revoke_token(&artifact.id, OffsetDateTime::now_utc()).await?.is_some();

		Ok(revoked)
	}

	/// Issues a SAML assertion with condition windows computed at signing time.
	pub async fn issue_saml_response(
		&self,
		provider: &ProviderId,
		subject: &UserRef,
		attributes: BTreeMap<String, String>,
	) -> Result<SamlAssertionDocument> {
		obs::record_engine_op(EngineOp::IssueAssertion, OpOutcome::Attempt);

		let result = self.issue_saml_response_inner(provider, subject, attributes);

		obs::record_engine_op(EngineOp::IssueAssertion, OpOutcome::from_result(&result));

		result
	}

	fn issue_saml_response_inner(
		&self,
		provider: &ProviderId,
		subject: &UserRef,
		attributes: BTreeMap<String, String>,
	) -> Result<SamlAssertionDocument> {
		let config = self.saml_config(provider)?;
		let signing_key = match (config.requires_signing_key(), config.signing_key.as_ref()) {
			(true, None) => return Err(ProviderError::MissingSigningKey.into()),
			(_, key) => key,
		};
		let now = OffsetDateTime::now_utc();
		let mut document = SamlAssertionDocument {
			id: ArtifactId::generate(),
			issuer: config.issuer.clone(),
			subject: subject.to_string(),
			audience: config.audience.clone(),
			acs_url: config.acs_url.clone(),
			issue_instant: now,
			not_before: config.assertion_valid_not_before.from_instant(now),
			not_on_or_after: config.assertion_valid_not_on_or_after.from_instant(now),
			session_not_on_or_after: config.session_valid_not_on_or_after.from_instant(now),
			attributes,
			assertion_signature: None,
			response_signature: None,
		};

		if let Some(key) = signing_key {
			let payload = document.canonical_payload();

			if config.sign_assertion {
				document.assertion_signature = Some(key.sign(&payload));
			}
			if config.sign_response {
				document.response_signature = Some(key.sign(&payload));
			}
		}

		Ok(document)
	}

	/// Derives the endpoint URL set for one provider instance.
	pub fn setup_urls(&self, provider: &ProviderId) -> Result<ProviderSetupUrls> {
		let config = self.oauth2_config(provider)?;

		setup::setup_urls(&self.base_url, &config).map_err(|e| {
			crate::error::ConfigError::EndpointDerivation { message: e.to_string() }.into()
		})
	}

	async fn mint_response(
		&self,
		config: &OAuth2ProviderConfig,
		subject: &UserRef,
		scope: &ScopeSet,
		minted_by: Option<ArtifactId>,
		now: OffsetDateTime,
	) -> Result<TokenResponse> {
		let (access, refresh) = mint_pair(config, subject, scope, minted_by, now);
		let response = self.build_response(config, &access, refresh.as_ref());

		self.store.save_token(access).await?;

		if let Some(refresh) = refresh {
			self.store.save_token(refresh).await?;
		}

		Ok(response)
	}

	fn build_response(
		&self,
		config: &OAuth2ProviderConfig,
		access: &TokenArtifact,
		refresh: Option<&TokenArtifact>,
	) -> TokenResponse {
		TokenResponse {
			access_token: access.secret.expose().to_string(),
			token_type: "Bearer".into(),
			expires_in: (access.expires_at - access.issued_at).whole_seconds(),
			refresh_token: refresh.map(|artifact| artifact.secret.expose().to_string()),
			scope: access.scope.normalized(),
			issuer: compute_issuer(&self.base_url, config),
		}
	}

	fn config(&self, provider: &ProviderId) -> Result<ProviderConfig> {
		self.providers
			.read()
			.get(provider)
			.cloned()
			.ok_or_else(|| ProviderError::NotFound { id: provider.to_string() }.into())
	}

	fn oauth2_config(&self, provider: &ProviderId) -> Result<OAuth2ProviderConfig> {
		match self.config(provider)? {
			ProviderConfig::OAuth2(config) => Ok(config),
			ProviderConfig::Saml(_) =>
				Err(ProviderError::NotFound { id: provider.to_string() }.into()),
		}
	}

	fn saml_config(&self, provider: &ProviderId) -> Result<SamlProviderConfig> {
		match self.config(provider)? {
			ProviderConfig::Saml(config) => Ok(config),
			ProviderConfig::OAuth2(_) =>
				Err(ProviderError::NotFound { id: provider.to_string() }.into()),
		}
	}
}
impl Debug for TokenEngine {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEngine")
			.field("providers", &self.providers.read().len())
			.field("base_url", &self.base_url)
			.finish()
	}
}

fn authenticate_client(
	config: &OAuth2ProviderConfig,
	credentials: &ClientCredentials,
) -> Result<()> {
	if credentials.client != config.client_id {
		return Err(ProviderError::InvalidClient { reason: "Unknown client".into() }.into());
	}

	match config.client_type {
		ClientType::Confidential => match credentials.client_secret.as_deref() {
			Some(secret) if secret == config.client_secret.expose() => Ok(()),
			Some(_) => Err(ProviderError::InvalidClient {
				reason: "Client secret does not match".into(),
			}
			.into()),
			None => Err(ProviderError::InvalidClient {
				reason: "Client secret is required for confidential clients".into(),
			}
			.into()),
		},
		ClientType::Public => Ok(()),
	}
}

fn verify_pkce(
	challenge: Option<&crate::provider::PkceChallenge>,
	verifier: Option<&str>,
) -> Result<()> {
	match (challenge, verifier) {
		(Some(challenge), Some(verifier)) =>
			if challenge.matches(verifier) {
				Ok(())
			} else {
				Err(ProviderError::InvalidGrant {
					reason: "PKCE verification failed".into(),
				}
				.into())
			},
		(Some(_), None) => Err(ProviderError::InvalidGrant {
			reason: "Code was issued with a challenge but no code_verifier was sent".into(),
		}
		.into()),
		(None, Some(_)) => Err(ProviderError::InvalidGrant {
			reason: "A code_verifier was sent but the code carries no challenge".into(),
		}
		.into()),
		(None, None) => Ok(()),
	}
}

fn mint_pair(
	config: &OAuth2ProviderConfig,
	subject: &UserRef,
	scope: &ScopeSet,
	minted_by: Option<ArtifactId>,
	now: OffsetDateTime,
) -> (TokenArtifact, Option<TokenArtifact>) {
	let pair = ArtifactId::generate();
	let access = TokenArtifact {
		id: ArtifactId::generate(),
		provider: config.id.clone(),
		subject: subject.clone(),
		scope: scope.clone(),
		kind: TokenKind::Access,
		secret: ArtifactSecret::generate(),
		issued_at: now,
		expires_at: config.access_token_validity.from_instant(now),
		revoked_at: None,
		minted_by: minted_by.clone(),
		pair: pair.clone(),
	};
	let refresh = scope.contains(SCOPE_OFFLINE_ACCESS).then(|| TokenArtifact {
		id: ArtifactId::generate(),
		provider: config.id.clone(),
		subject: subject.clone(),
		scope: scope.clone(),
		kind: TokenKind::Refresh,
		secret: ArtifactSecret::generate(),
		issued_at: now,
		expires_at: config.refresh_token_validity.from_instant(now),
		revoked_at: None,
		minted_by,
		pair,
	});

	(access, refresh)
}
