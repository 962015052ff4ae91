//! Secret wrappers for issued artifact material, redacted in all formatters.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

/// Length of generated artifact secrets; 64 alphanumeric characters carry
/// well over the 128 bits of entropy required for single-use codes.
const SECRET_LEN: usize = 64;

/// Redacted secret wrapper keeping issued token material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSecret(String);
impl ArtifactSecret {
	/// Wraps an existing secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Generates a fresh cryptographically random secret.
	pub fn generate() -> Self {
		let value: String =
			rand::rng().sample_iter(Alphanumeric).take(SECRET_LEN).map(char::from).collect();

		Self(value)
	}

	/// Returns the inner secret value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for ArtifactSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for ArtifactSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ArtifactSecret").field(&"<redacted>").finish()
	}
}
impl Display for ArtifactSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = ArtifactSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "ArtifactSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn generated_secrets_are_long_and_unique() {
		let lhs = ArtifactSecret::generate();
		let rhs = ArtifactSecret::generate();

		assert_eq!(lhs.expose().len(), SECRET_LEN);
		assert_ne!(lhs.expose(), rhs.expose());
	}
}
