//! Engine-level error types shared across planning, execution, and providers.

// self
use crate::_prelude::*;

/// Engine-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical engine error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Flow lookup or plan construction failure.
	#[error(transparent)]
	Flow(#[from] FlowError),
	/// Session lifecycle failure.
	#[error(transparent)]
	Session(#[from] SessionError),
	/// Provider artifact issuance or redemption failure.
	#[error(transparent)]
	Provider(#[from] ProviderError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Structural flow failures; these abort the whole operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum FlowError {
	/// No flow is registered under the requested slug.
	#[error("Flow `{slug}` was not found.")]
	NotFound {
		/// Slug that failed to resolve.
		slug: String,
	},
	/// The flow definition references stages or policies that cannot be resolved.
	#[error("Flow `{slug}` could not be planned: {reason}.")]
	Build {
		/// Slug of the flow that failed to build.
		slug: String,
		/// Human-readable description of the structural problem.
		reason: String,
	},
}

/// Session lifecycle failures raised by the executor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionError {
	/// No session exists under the provided identifier.
	#[error("Session was not found.")]
	NotFound,
	/// The session passed its expiry instant; callers must start a fresh flow.
	#[error("Session has expired.")]
	Expired,
	/// Submitted stage does not match the session's current stage.
	#[error("Submitted stage `{received}` does not match the current stage `{expected}`.")]
	StageMismatch {
		/// Stage the session currently points at.
		expected: String,
		/// Stage the caller submitted input for.
		received: String,
	},
	/// The session is in a terminal state and cannot accept the operation.
	#[error("Session is {state} and cannot accept further input.")]
	NotActive {
		/// Terminal state label (completed, denied, cancelled).
		state: &'static str,
	},
}

/// Provider-engine failures around artifact issuance and redemption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderError {
	/// No provider is registered under the requested identifier.
	#[error("Provider `{id}` was not found.")]
	NotFound {
		/// Identifier that failed to resolve.
		id: String,
	},
	/// Authorization code was already consumed; issued tokens are revoked.
	#[error("Authorization code has already been used.")]
	CodeAlreadyUsed,
	/// Signing was configured but no signing key is available.
	#[error("Signing was requested but no signing key is configured.")]
	MissingSigningKey,
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Engine-supplied reason string.
		reason: String,
	},
	/// The grant (code, refresh token, PKCE proof) was rejected.
	#[error("Grant was rejected: {reason}.")]
	InvalidGrant {
		/// Engine-supplied reason string.
		reason: String,
	},
	/// Redirect URI is not registered for the client.
	#[error("Redirect URI `{uri}` is not allowed for this provider.")]
	RedirectUriMismatch {
		/// Redirect URI that failed validation.
		uri: String,
	},
	/// Artifact has been revoked and must not be reused.
	#[error("Artifact has been revoked.")]
	Revoked,
}

/// Configuration and validation failures raised by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum ConfigError {
	/// Identifier validation failed.
	#[error("Invalid identifier.")]
	Identifier(#[from] crate::id::IdentifierError),
	/// Validity duration string cannot be parsed.
	#[error("Invalid validity duration.")]
	Validity(#[from] crate::provider::ValidityParseError),
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::provider::ScopeValidationError),
	/// Stage definition references a component with no registered implementation.
	#[error("Stage component `{component}` has no registered implementation.")]
	UnknownStageKind {
		/// Component discriminator that failed to resolve.
		component: String,
	},
	/// Stage configuration snapshot does not match the component's schema.
	#[error("Stage `{stage}` carries a malformed configuration: {message}.")]
	MalformedStageConfig {
		/// Stage whose configuration failed to deserialize.
		stage: String,
		/// Path-qualified deserialization failure.
		message: String,
	},
	/// Deployment base URL cannot be combined with provider paths.
	#[error("Failed to derive endpoint URLs: {message}.")]
	EndpointDerivation {
		/// Underlying URL joining failure.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn store_error_converts_into_engine_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let engine_error: Error = store_error.clone().into();

		assert!(matches!(engine_error, Error::Storage(_)));
		assert!(engine_error.to_string().contains("database unreachable"));

		let source = StdError::source(&engine_error)
			.expect("Engine error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn session_errors_render_stage_names() {
		let err = SessionError::StageMismatch {
			expected: "password".into(),
			received: "identification".into(),
		};

		assert!(err.to_string().contains("identification"));
		assert!(err.to_string().contains("password"));
	}
}
