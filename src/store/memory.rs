//! Thread-safe in-memory [`ArtifactStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	id::{ArtifactId, ProviderId},
	provider::{CodeRecord, TokenArtifact, TokenKind},
	store::{ArtifactStore, ConsumeOutcome, RotateOutcome, StoreError, StoreFuture},
};

#[derive(Debug, Default)]
struct Shelves {
	codes: HashMap<(ProviderId, String), CodeRecord>,
	tokens: HashMap<ArtifactId, TokenArtifact>,
	secrets: HashMap<(ProviderId, String, TokenKind), ArtifactId>,
}

type StoreMap = Arc<RwLock<Shelves>>;

/// Thread-safe storage backend that keeps artifacts in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryArtifactStore(StoreMap);
impl MemoryArtifactStore {
	fn save_code_now(map: StoreMap, record: CodeRecord) -> Result<(), StoreError> {
		let key = (record.provider.clone(), record.code.expose().to_string());

		map.write().codes.insert(key, record);

		Ok(())
	}

	fn consume_code_now(map: StoreMap, provider: ProviderId, code: String) -> ConsumeOutcome {
		let mut guard = map.write();

		match guard.codes.get_mut(&(provider, code)) {
			Some(record) if record.consumed => ConsumeOutcome::AlreadyConsumed(record.clone()),
			Some(record) => {
				record.consumed = true;

				ConsumeOutcome::Consumed(record.clone())
			},
			None => ConsumeOutcome::Missing,
		}
	}

	fn save_token_now(map: StoreMap, artifact: TokenArtifact) -> Result<(), StoreError> {
		let mut guard = map.write();
		let key =
			(artifact.provider.clone(), artifact.secret.expose().to_string(), artifact.kind);

		guard.secrets.insert(key, artifact.id.clone());
		guard.tokens.insert(artifact.id.clone(), artifact);

		Ok(())
	}

	fn fetch_token_now(
		map: StoreMap,
		provider: ProviderId,
		secret: String,
		kind: TokenKind,
	) -> Option<TokenArtifact> {
		let guard = map.read();
		let id = guard.secrets.get(&(provider, secret, kind))?;

		guard.tokens.get(id).cloned()
	}

	fn revoke_token_now(
		map: StoreMap,
		id: ArtifactId,
		instant: OffsetDateTime,
	) -> Option<TokenArtifact> {
		let mut guard = map.write();

		match guard.tokens.get_mut(&id) {
			Some(artifact) => {
				artifact.revoke(instant);

				Some(artifact.clone())
			},
			None => None,
		}
	}

	fn revoke_minted_by_now(map: StoreMap, code: ArtifactId, instant: OffsetDateTime) -> usize {
		let mut guard = map.write();
		let mut revoked = 0;

		for artifact in guard.tokens.values_mut() {
			if artifact.minted_by.as_ref() == Some(&code) && !artifact.is_revoked() {
				artifact.revoke(instant);

				revoked += 1;
			}
		}

		revoked
	}

	fn rotate_refresh_now(
		map: StoreMap,
		provider: ProviderId,
		expected: String,
		replacements: Vec<TokenArtifact>,
		instant: OffsetDateTime,
	) -> RotateOutcome {
		let mut guard = map.write();
		let Some(id) = guard.secrets.get(&(provider, expected, TokenKind::Refresh)).cloned()
		else {
			return RotateOutcome::Missing;
		};
		let Some(current) = guard.tokens.get(&id) else {
			return RotateOutcome::Missing;
		};

		if current.is_revoked() {
			return RotateOutcome::Replayed;
		}

		let pair = current.pair.clone();

		for artifact in guard.tokens.values_mut() {
			if artifact.pair == pair && !artifact.is_revoked() {
				artifact.revoke(instant);
			}
		}
		for replacement in replacements {
			let key = (
				replacement.provider.clone(),
				replacement.secret.expose().to_string(),
				replacement.kind,
			);

			guard.secrets.insert(key, replacement.id.clone());
			guard.tokens.insert(replacement.id.clone(), replacement);
		}

		RotateOutcome::Rotated
	}
}
impl ArtifactStore for MemoryArtifactStore {
	fn save_code(&self, record: CodeRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_code_now(map, record) })
	}

	fn consume_code<'a>(
		&'a self,
		provider: &'a ProviderId,
		code: &'a str,
	) -> StoreFuture<'a, ConsumeOutcome> {
		let map = self.0.clone();
		let provider = provider.to_owned();
		let code = code.to_owned();

		Box::pin(async move { Ok(Self::consume_code_now(map, provider, code)) })
	}

	fn save_token(&self, artifact: TokenArtifact) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_token_now(map, artifact) })
	}

	fn fetch_token<'a>(
		&'a self,
		provider: &'a ProviderId,
		secret: &'a str,
		kind: TokenKind,
	) -> StoreFuture<'a, Option<TokenArtifact>> {
		let map = self.0.clone();
		let provider = provider.to_owned();
		let secret = secret.to_owned();

		Box::pin(async move { Ok(Self::fetch_token_now(map, provider, secret, kind)) })
	}

	fn revoke_token<'a>(
		&'a self,
		id: &'a ArtifactId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<TokenArtifact>> {
		let map = self.0.clone();
		let id = id.to_owned();

		Box::pin(async move { Ok(Self::revoke_token_now(map, id, instant)) })
	}

	fn revoke_minted_by<'a>(
		&'a self,
		code: &'a ArtifactId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, usize> {
		let map = self.0.clone();
		let code = code.to_owned();

		Box::pin(async move { Ok(Self::revoke_minted_by_now(map, code, instant)) })
	}

	fn rotate_refresh<'a>(
		&'a self,
		provider: &'a ProviderId,
		expected: &'a str,
		replacements: Vec<TokenArtifact>,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, RotateOutcome> {
		let map = self.0.clone();
		let provider = provider.to_owned();
		let expected = expected.to_owned();

		Box::pin(async move {
			Ok(Self::rotate_refresh_now(map, provider, expected, replacements, instant))
		})
	}
}
