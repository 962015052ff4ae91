//! Issued artifact records: authorization codes and access/refresh tokens.

// self
use crate::{
	_prelude::*,
	id::{ArtifactId, ClientId, ProviderId, UserRef},
	provider::{ArtifactSecret, PkceChallenge, ScopeSet},
};

/// Current lifecycle status for an issued artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactStatus {
	/// Artifact is currently valid.
	Active,
	/// Artifact exceeded its expiry instant.
	Expired,
	/// Artifact has been revoked.
	Revoked,
}

/// Kind discriminator for token artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
	/// Bearer access token presented to resource servers.
	Access,
	/// Opaque refresh token used for rotation.
	Refresh,
}

/// Single-use authorization code bound to one authorization request.
///
/// The `consumed` flag is flipped atomically by the artifact store; it is the
/// one field that participates in cross-request contention.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodeRecord {
	/// Unique identifier, referenced by tokens minted from this code.
	pub id: ArtifactId,
	/// Provider that issued the code.
	pub provider: ProviderId,
	/// Client the code is bound to.
	pub client: ClientId,
	/// Subject the code authorizes.
	pub subject: UserRef,
	/// Scopes granted by the authorization.
	pub scope: ScopeSet,
	/// Redirect URI the code was issued for; redemption must match exactly.
	pub redirect_uri: Url,
	/// The code secret itself.
	pub code: ArtifactSecret,
	/// PKCE challenge recorded at issuance, if the client supplied one.
	pub code_challenge: Option<PkceChallenge>,
	/// Issuance instant.
	pub issued_at: OffsetDateTime,
	/// Expiry instant stamped from the provider's code validity at issuance.
	pub expires_at: OffsetDateTime,
	/// Whether the code has been redeemed.
	pub consumed: bool,
}
impl CodeRecord {
	/// Returns true when the code has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}

/// Issued access or refresh token.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenArtifact {
	/// Unique identifier.
	pub id: ArtifactId,
	/// Provider that minted the token.
	pub provider: ProviderId,
	/// Subject the token belongs to; tokens are single-subject.
	pub subject: UserRef,
	/// Scopes carried by the token.
	pub scope: ScopeSet,
	/// Access or refresh discriminator.
	pub kind: TokenKind,
	/// The token secret; callers must avoid logging it.
	pub secret: ArtifactSecret,
	/// Issuance instant.
	pub issued_at: OffsetDateTime,
	/// Expiry instant stamped from the provider validity at issuance.
	pub expires_at: OffsetDateTime,
	/// Revocation instant, if the token has been revoked.
	pub revoked_at: Option<OffsetDateTime>,
	/// Authorization code this token was minted from, when applicable.
	pub minted_by: Option<ArtifactId>,
	/// Identifier shared by the access/refresh pair issued together.
	pub pair: ArtifactId,
}
impl TokenArtifact {
	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> ArtifactStatus {
		if self.revoked_at.is_some() {
			return ArtifactStatus::Revoked;
		}
		if instant >= self.expires_at {
			return ArtifactStatus::Expired;
		}

		ArtifactStatus::Active
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> ArtifactStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), ArtifactStatus::Expired)
	}

	/// Returns `true` if the token has been revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Marks the token as revoked.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.revoked_at = Some(instant);
	}
}
impl Debug for TokenArtifact {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenArtifact")
			.field("id", &self.id)
			.field("provider", &self.provider)
			.field("subject", &self.subject)
			.field("scope", &self.scope)
			.field("kind", &self.kind)
			.field("secret", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("revoked_at", &self.revoked_at)
			.finish()
	}
}
