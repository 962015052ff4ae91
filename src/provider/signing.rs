//! Ed25519 signing key material for assertion and response signatures.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::Rng;
// self
use crate::_prelude::*;

/// Ed25519 keypair used to sign issued assertions and responses.
#[derive(Clone)]
pub struct SigningKeyPair {
	key: SigningKey,
}
impl SigningKeyPair {
	/// Generates a fresh random keypair.
	pub fn generate() -> Self {
		let mut seed = [0_u8; 32];

		rand::rng().fill(&mut seed[..]);

		Self { key: SigningKey::from_bytes(&seed) }
	}

	/// Restores a keypair from a 32-byte seed.
	pub fn from_seed(seed: &[u8; 32]) -> Self {
		Self { key: SigningKey::from_bytes(seed) }
	}

	/// Signs the message and returns the signature as unpadded base64.
	pub fn sign(&self, message: &[u8]) -> String {
		STANDARD_NO_PAD.encode(self.key.sign(message).to_bytes())
	}

	/// Verifies an unpadded-base64 signature against the message.
	pub fn verify(&self, message: &[u8], signature_b64: &str) -> bool {
		let Ok(bytes) = STANDARD_NO_PAD.decode(signature_b64) else {
			return false;
		};
		let bytes: [u8; 64] = match bytes.try_into() {
			Ok(bytes) => bytes,
			Err(_) => return false,
		};
		let signature = Signature::from_bytes(&bytes);

		self.key.verifying_key().verify(message, &signature).is_ok()
	}

	/// Returns the public verifying key as unpadded base64.
	pub fn public_key(&self) -> String {
		STANDARD_NO_PAD.encode(self.key.verifying_key().to_bytes())
	}
}
impl Debug for SigningKeyPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningKeyPair").field("public_key", &self.public_key()).finish()
	}
}

/// Verifies a signature with only the public half of a keypair.
pub fn verify_with_public_key(public_key_b64: &str, message: &[u8], signature_b64: &str) -> bool {
	let Ok(key_bytes) = STANDARD_NO_PAD.decode(public_key_b64) else {
		return false;
	};
	let key_bytes: [u8; 32] = match key_bytes.try_into() {
		Ok(bytes) => bytes,
		Err(_) => return false,
	};
	let Ok(verifying) = VerifyingKey::from_bytes(&key_bytes) else {
		return false;
	};
	let Ok(sig_bytes) = STANDARD_NO_PAD.decode(signature_b64) else {
		return false;
	};
	let sig_bytes: [u8; 64] = match sig_bytes.try_into() {
		Ok(bytes) => bytes,
		Err(_) => return false,
	};

	verifying.verify(message, &Signature::from_bytes(&sig_bytes)).is_ok()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn sign_and_verify_round_trip() {
		let pair = SigningKeyPair::generate();
		let signature = pair.sign(b"assertion payload");

		assert!(pair.verify(b"assertion payload", &signature));
		assert!(!pair.verify(b"tampered payload", &signature));
		assert!(verify_with_public_key(&pair.public_key(), b"assertion payload", &signature));
	}

	#[test]
	fn seeded_keys_are_deterministic() {
		let seed = [7_u8; 32];
		let lhs = SigningKeyPair::from_seed(&seed);
		let rhs = SigningKeyPair::from_seed(&seed);

		assert_eq!(lhs.public_key(), rhs.public_key());
	}

	#[test]
	fn debug_exposes_only_the_public_key() {
		let pair = SigningKeyPair::generate();
		let rendered = format!("{pair:?}");

		assert!(rendered.contains(&pair.public_key()));
	}
}
