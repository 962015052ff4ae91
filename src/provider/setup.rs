//! Per-provider endpoint URL introspection for admin consoles.

// self
use crate::{
	_prelude::*,
	provider::{IssuerMode, OAuth2ProviderConfig},
};

/// Endpoint URL set derived for one OAuth 2.0 provider instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSetupUrls {
	/// Issuer identifier; varies with the provider's issuer mode.
	pub issuer: String,
	/// OpenID Connect discovery document URL.
	pub provider_info: Url,
	/// Authorization endpoint.
	pub authorize: Url,
	/// Token endpoint.
	pub token: Url,
	/// Userinfo endpoint.
	pub user_info: Url,
	/// RP-initiated logout endpoint.
	pub logout: Url,
	/// JSON Web Key Set endpoint.
	pub jwks: Url,
}

/// Computes the issuer string for a provider against a deployment base URL.
pub fn compute_issuer(base: &Url, config: &OAuth2ProviderConfig) -> String {
	match config.issuer_mode {
		IssuerMode::Global => base.as_str().trim_end_matches('/').to_string(),
		IssuerMode::PerProvider => {
			let path = format!("application/o/{}/", config.application_slug);

			base.join(&path).map(|url| url.to_string()).unwrap_or_else(|_| base.to_string())
		},
	}
}

/// Derives the endpoint URL set for a provider instance.
pub fn setup_urls(
	base: &Url,
	config: &OAuth2ProviderConfig,
) -> Result<ProviderSetupUrls, url::ParseError> {
	let slug = &config.application_slug;

	Ok(ProviderSetupUrls {
		issuer: compute_issuer(base, config),
		provider_info: base
			.join(&format!("application/o/{slug}/.well-known/openid-configuration"))?,
		authorize: base.join("application/o/authorize/")?,
		token: base.join("application/o/token/")?,
		user_info: base.join("application/o/userinfo/")?,
		logout: base.join(&format!("application/o/{slug}/end-session/"))?,
		jwks: base.join(&format!("application/o/{slug}/jwks/"))?,
	})
}
