//! SAML provider configuration and assertion issuance types.

// std
use std::collections::BTreeMap;
// self
use crate::{
	_prelude::*,
	id::{ArtifactId, ProviderId},
	provider::{SigningKeyPair, Validity},
};

/// SAML provider instance configuration.
///
/// The drift windows mirror the admin-facing validity strings: `NotBefore`
/// points into the past to absorb clock skew, `NotOnOrAfter` bounds the
/// assertion itself, and the session window bounds the authenticated session
/// the service provider establishes from it.
#[derive(Clone)]
pub struct SamlProviderConfig {
	/// Provider identifier.
	pub id: ProviderId,
	/// Assertion consumer service URL of the service provider.
	pub acs_url: Url,
	/// Audience restriction; usually the service provider entity id.
	pub audience: String,
	/// Issuer entity id of this identity provider.
	pub issuer: String,
	/// Drift window subtracted for `NotBefore` (negative values reach back).
	pub assertion_valid_not_before: Validity,
	/// Window added for the assertion's `NotOnOrAfter`.
	pub assertion_valid_not_on_or_after: Validity,
	/// Window added for the session's `NotOnOrAfter`.
	pub session_valid_not_on_or_after: Validity,
	/// Sign the assertion element.
	pub sign_assertion: bool,
	/// Sign the enclosing response element.
	pub sign_response: bool,
	/// Signing keypair; mandatory when any signing toggle is set.
	pub signing_key: Option<SigningKeyPair>,
}
impl SamlProviderConfig {
	/// Creates a configuration with the default drift windows
	/// (`minutes=-5`, `minutes=5`, `minutes=86400`).
	pub fn new(id: ProviderId, acs_url: Url, audience: impl Into<String>) -> Self {
		let audience = audience.into();

		Self {
			id,
			acs_url,
			issuer: audience.clone(),
			audience,
			assertion_valid_not_before: Validity::parse("minutes=-5")
				.expect("Default NotBefore drift is well-formed."),
			assertion_valid_not_on_or_after: Validity::parse("minutes=5")
				.expect("Default NotOnOrAfter window is well-formed."),
			session_valid_not_on_or_after: Validity::parse("minutes=86400")
				.expect("Default session window is well-formed."),
			sign_assertion: true,
			sign_response: false,
			signing_key: None,
		}
	}

	/// Overrides the issuer entity id.
	pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuer = issuer.into();

		self
	}

	/// Toggles assertion signing.
	pub fn sign_assertion(mut self, sign: bool) -> Self {
		self.sign_assertion = sign;

		self
	}

	/// Toggles response signing.
	pub fn sign_response(mut self, sign: bool) -> Self {
		self.sign_response = sign;

		self
	}

	/// Attaches the signing keypair.
	pub fn with_signing_key(mut self, key: SigningKeyPair) -> Self {
		self.signing_key = Some(key);

		self
	}

	/// Returns true when any signing toggle requires key material.
	pub fn requires_signing_key(&self) -> bool {
		self.sign_assertion || self.sign_response
	}
}
impl Debug for SamlProviderConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SamlProviderConfig")
			.field("id", &self.id)
			.field("acs_url", &self.acs_url)
			.field("audience", &self.audience)
			.field("issuer", &self.issuer)
			.field("sign_assertion", &self.sign_assertion)
			.field("sign_response", &self.sign_response)
			.field("signing_key_set", &self.signing_key.is_some())
			.finish()
	}
}

/// Issued SAML assertion with its validity conditions and signatures.
///
/// Signatures cover the canonical JSON serialization of the unsigned fields;
/// the transport layer is responsible for the XML envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SamlAssertionDocument {
	/// Unique assertion identifier.
	pub id: ArtifactId,
	/// Issuer entity id.
	pub issuer: String,
	/// Subject name identifier.
	pub subject: String,
	/// Audience restriction.
	pub audience: String,
	/// Assertion consumer service URL the response targets.
	pub acs_url: Url,
	/// Instant the assertion was issued and signed.
	pub issue_instant: OffsetDateTime,
	/// Condition window start, computed from the drift window at signing time.
	pub not_before: OffsetDateTime,
	/// Condition window end, computed at signing time.
	pub not_on_or_after: OffsetDateTime,
	/// Session expiry communicated to the service provider.
	pub session_not_on_or_after: OffsetDateTime,
	/// Attribute statement.
	pub attributes: BTreeMap<String, String>,
	/// Signature over the assertion payload, when configured.
	pub assertion_signature: Option<String>,
	/// Signature over the response payload, when configured.
	pub response_signature: Option<String>,
}
impl SamlAssertionDocument {
	/// Canonical byte serialization the signatures are computed over.
	pub fn canonical_payload(&self) -> Vec<u8> {
		let unsigned = serde_json::json!({
			"id": self.id,
			"issuer": self.issuer,
			"subject": self.subject,
			"audience": self.audience,
			"acs_url": self.acs_url,
			"issue_instant": self.issue_instant.unix_timestamp(),
			"not_before": self.not_before.unix_timestamp(),
			"not_on_or_after": self.not_on_or_after.unix_timestamp(),
			"session_not_on_or_after": self.session_not_on_or_after.unix_timestamp(),
			"attributes": self.attributes,
		});

		unsigned.to_string().into_bytes()
	}

	/// Returns true when the condition window contains the provided instant.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.not_before && instant < self.not_on_or_after
	}
}
