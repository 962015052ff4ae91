//! Request-scoped and plan-scoped context bags threaded through execution.
//!
//! [`RequestContext`] captures the inbound request's identity and protocol
//! parameters; it is read-only for the lifetime of one flow invocation.
//! [`PlanContext`] is the mutable key-value bag owned by exactly one in-flight
//! plan; stages mutate it exclusively through [`ContextPatch`] values applied
//! by the executor, never by direct writes.

// std
use std::collections::BTreeMap;
// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	id::{ProviderId, StageId, UserRef},
	provider::AuthorizationRequest,
};

/// Context key holding the user identified partway through a flow.
pub const CONTEXT_PENDING_USER: &str = "pending_user";
/// Context key set once an authentication-designated flow logged the user in.
pub const CONTEXT_AUTHENTICATED: &str = "authenticated";
/// Context key carrying an explicit post-completion redirect target.
pub const CONTEXT_REDIRECT: &str = "redirect";
/// Context key prefix for values collected by prompt stages.
pub const CONTEXT_PROMPT_PREFIX: &str = "prompt_data.";
/// Context key holding the one-time code expected by the SMS authenticator.
pub const CONTEXT_SMS_CODE: &str = "authenticator_sms_code";
/// Context key counting failed attempts at the current password stage.
pub const CONTEXT_AUTH_ATTEMPTS: &str = "auth_attempts";

/// Immutable request context a flow invocation is evaluated against.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RequestContext {
	/// Already-authenticated user issuing the request, if any.
	pub user: Option<UserRef>,
	/// Whether the request carries an authenticated session.
	pub authenticated: bool,
	/// Whether the authenticated user holds superuser rights.
	pub superuser: bool,
	/// Group memberships of the requesting user.
	pub groups: Vec<String>,
	/// Device/browser correlation key; at most one active session per key.
	pub correlation_key: Option<String>,
	/// `?next` redirect target propagated to flow completion.
	pub next: Option<String>,
	/// Provider bound to the application that initiated this flow.
	pub provider: Option<ProviderId>,
	/// OAuth 2.0 authorization parameters when an authorization flow started this.
	pub authorization: Option<AuthorizationRequest>,
	/// Arbitrary seed values copied into the plan context at build time.
	pub seed: BTreeMap<String, Value>,
}
impl RequestContext {
	/// Creates an anonymous request context.
	pub fn anonymous() -> Self {
		Self::default()
	}

	/// Creates a context for an authenticated user.
	pub fn authenticated(user: UserRef) -> Self {
		Self { user: Some(user), authenticated: true, ..Self::default() }
	}

	/// Sets the device/browser correlation key.
	pub fn with_correlation_key(mut self, key: impl Into<String>) -> Self {
		self.correlation_key = Some(key.into());

		self
	}

	/// Sets the `?next` redirect target.
	pub fn with_next(mut self, next: impl Into<String>) -> Self {
		self.next = Some(next.into());

		self
	}

	/// Binds a provider for terminal artifact issuance.
	pub fn with_provider(mut self, provider: ProviderId) -> Self {
		self.provider = Some(provider);

		self
	}

	/// Attaches OAuth 2.0 authorization parameters.
	pub fn with_authorization(mut self, authorization: AuthorizationRequest) -> Self {
		self.authorization = Some(authorization);

		self
	}

	/// Adds a seed value copied into the plan context at build time.
	pub fn with_seed(mut self, key: impl Into<String>, value: Value) -> Self {
		self.seed.insert(key.into(), value);

		self
	}
}

/// Set of key-value updates a stage wants applied to the plan context.
///
/// Patches are merged last-write-wins per key when the executor commits a
/// stage outcome; partial writes are never visible to concurrent readers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextPatch(BTreeMap<String, Value>);
impl ContextPatch {
	/// Creates an empty patch.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds or replaces a key in the patch.
	pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
		self.0.insert(key.into(), value);

		self
	}

	/// Returns true when the patch carries no updates.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Keys touched by this patch, in sorted order.
	pub fn keys(&self) -> Vec<String> {
		self.0.keys().cloned().collect()
	}

	/// Iterates over the patch entries.
	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.0.iter()
	}
}

/// Record of one committed patch, kept for the inspector's history view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPatchRecord {
	/// Stage that produced the patch.
	pub stage: StageId,
	/// Keys the patch touched.
	pub keys: Vec<String>,
}

/// Mutable key-value bag owned by exactly one in-flight plan.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlanContext {
	values: BTreeMap<String, Value>,
	history: Vec<ContextPatchRecord>,
}
impl PlanContext {
	/// Creates a plan context seeded with the provided values.
	pub fn seeded(seed: &BTreeMap<String, Value>) -> Self {
		Self { values: seed.clone(), history: Vec::new() }
	}

	/// Returns the value stored under `key`, if any.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(key)
	}

	/// Returns the string stored under `key`, if the value is a string.
	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.values.get(key).and_then(Value::as_str)
	}

	/// Returns true when `key` holds the boolean `true`.
	pub fn is_set(&self, key: &str) -> bool {
		self.values.get(key).and_then(Value::as_bool).unwrap_or(false)
	}

	/// Applies a patch last-write-wins per key and records it in the history.
	pub fn apply_patch(&mut self, stage: &StageId, patch: ContextPatch) {
		if patch.is_empty() {
			return;
		}

		let keys = patch.keys();

		for (key, value) in patch.0 {
			self.values.insert(key, value);
		}

		self.history.push(ContextPatchRecord { stage: stage.clone(), keys });
	}

	/// Patch records accumulated so far, oldest first.
	pub fn history(&self) -> &[ContextPatchRecord] {
		&self.history
	}

	/// All stored keys and values.
	pub fn values(&self) -> &BTreeMap<String, Value> {
		&self.values
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn patches_merge_last_write_wins() {
		let stage = StageId::new("ident").expect("Stage id fixture should be valid.");
		let mut context = PlanContext::default();

		context.apply_patch(
			&stage,
			ContextPatch::new().set(CONTEXT_PENDING_USER, json!("alice")).set("attempt", json!(1)),
		);
		context.apply_patch(&stage, ContextPatch::new().set("attempt", json!(2)));

		assert_eq!(context.get_str(CONTEXT_PENDING_USER), Some("alice"));
		assert_eq!(context.get("attempt"), Some(&json!(2)));
		assert_eq!(context.history().len(), 2);
		assert_eq!(context.history()[1].keys, vec!["attempt".to_string()]);
	}

	#[test]
	fn empty_patches_leave_no_history() {
		let stage = StageId::new("noop").expect("Stage id fixture should be valid.");
		let mut context = PlanContext::default();

		context.apply_patch(&stage, ContextPatch::new());

		assert!(context.history().is_empty());
	}

	#[test]
	fn seeded_context_copies_request_values() {
		let seed = BTreeMap::from_iter([("is_sso".to_string(), json!(true))]);
		let context = PlanContext::seeded(&seed);

		assert!(context.is_set("is_sso"));
	}
}
