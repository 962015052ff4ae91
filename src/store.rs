//! Storage contracts and built-in store implementations for provider artifacts.

pub mod memory;

pub use memory::MemoryArtifactStore;

// self
use crate::{
	_prelude::*,
	id::{ArtifactId, ProviderId},
	provider::{CodeRecord, TokenArtifact, TokenKind},
};

/// Boxed future returned by storage contract methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Result of an atomic authorization-code consumption attempt.
///
/// Exactly one concurrent caller observes [`ConsumeOutcome::Consumed`]; every
/// other caller for the same code observes [`ConsumeOutcome::AlreadyConsumed`]
/// together with the record so replay cleanup can revoke minted tokens.
#[derive(Clone, Debug)]
pub enum ConsumeOutcome {
	/// The code was live and has now been atomically marked consumed.
	Consumed(CodeRecord),
	/// The code was already consumed by an earlier redemption.
	AlreadyConsumed(CodeRecord),
	/// No code matched the provided provider + secret.
	Missing,
}

/// Result of an atomic refresh-token rotation attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotateOutcome {
	/// The expected refresh secret matched; the old pair is revoked and the
	/// replacement artifacts are stored.
	Rotated,
	/// The refresh secret exists but was already revoked (rotation replay).
	Replayed,
	/// No refresh token matched the provided provider + secret.
	Missing,
}

/// Storage backend contract for provider-issued artifacts.
///
/// `consume_code` and `rotate_refresh` are the two correctness-critical
/// check-and-set operations; implementations must guard them at the storage
/// layer, not with best-effort pre-reads.
pub trait ArtifactStore
where
	Self: Send + Sync,
{
	/// Persists a freshly issued authorization code.
	fn save_code(&self, record: CodeRecord) -> StoreFuture<'_, ()>;

	/// Atomically consumes an authorization code.
	fn consume_code<'a>(
		&'a self,
		provider: &'a ProviderId,
		code: &'a str,
	) -> StoreFuture<'a, ConsumeOutcome>;

	/// Persists an issued access or refresh token.
	fn save_token(&self, artifact: TokenArtifact) -> StoreFuture<'_, ()>;

	/// Fetches a token by provider + secret + kind.
	fn fetch_token<'a>(
		&'a self,
		provider: &'a ProviderId,
		secret: &'a str,
		kind: TokenKind,
	) -> StoreFuture<'a, Option<TokenArtifact>>;

	/// Marks a token as revoked at the provided instant.
	fn revoke_token<'a>(
		&'a self,
		id: &'a ArtifactId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<TokenArtifact>>;

	/// Revokes every token minted from the given authorization code.
	///
	/// Returns the number of tokens revoked; used by replay detection.
	fn revoke_minted_by<'a>(
		&'a self,
		code: &'a ArtifactId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, usize>;

	/// Atomically rotates a refresh token: revokes the matched pair and stores
	/// the replacements when the expected secret is live.
	fn rotate_refresh<'a>(
		&'a self,
		provider: &'a ProviderId,
		expected: &'a str,
		replacements: Vec<TokenArtifact>,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, RotateOutcome>;
}

/// Error type produced by [`ArtifactStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
