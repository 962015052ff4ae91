//! SMS authenticator stage: one-time code dispatch and verification.

// crates.io
use rand::Rng;
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	context::{CONTEXT_PENDING_USER, CONTEXT_SMS_CODE, ContextPatch},
	id::UserRef,
	stage::{
		CONTEXT_AUTH_METHOD, Challenge, FieldError, ResponseErrors, StageExecution, StageFuture,
		StageKind, StageOutcome, parse_input,
	},
	store::StoreFuture,
};
#[cfg(feature = "reqwest")]
use crate::store::StoreError;

/// Component discriminator for the SMS authenticator stage.
pub const COMPONENT_AUTHENTICATOR_SMS: &str = "ak-stage-authenticator-sms";

fn default_code_length() -> usize {
	6
}

/// SMS authenticator stage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
	/// Digits in the generated one-time code.
	pub code_length: usize,
	/// Sender identifier passed to the gateway.
	pub from_number: Option<String>,
}
impl Default for SmsConfig {
	fn default() -> Self {
		Self { code_length: default_code_length(), from_number: None }
	}
}

#[derive(Debug, Deserialize)]
struct SmsInput {
	code: String,
}

/// Outbound SMS transport used by the stage.
///
/// Dispatch may be asynchronous internally but the executor awaits it as one
/// atomic unit; partial progress is never observable.
pub trait SmsGateway
where
	Self: Send + Sync,
{
	/// Sends a message to the given number.
	fn send<'a>(&'a self, to: &'a str, body: &'a str) -> StoreFuture<'a, ()>;
}

/// Gateway that silently drops messages; the default when none is wired.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSmsGateway;
impl SmsGateway for NullSmsGateway {
	fn send<'a>(&'a self, _: &'a str, _: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async { Ok(()) })
	}
}

/// Gateway recording messages in memory; used by tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingSmsGateway(Arc<RwLock<Vec<(String, String)>>>);
impl RecordingSmsGateway {
	/// Messages sent so far as (recipient, body) pairs.
	pub fn sent(&self) -> Vec<(String, String)> {
		self.0.read().clone()
	}
}
impl SmsGateway for RecordingSmsGateway {
	fn send<'a>(&'a self, to: &'a str, body: &'a str) -> StoreFuture<'a, ()> {
		let log = self.0.clone();
		let to = to.to_owned();
		let body = body.to_owned();

		Box::pin(async move {
			log.write().push((to, body));

			Ok(())
		})
	}
}

/// Gateway POSTing `{to, body}` JSON to a configured webhook.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct WebhookSmsGateway {
	client: reqwest::Client,
	endpoint: Url,
}
#[cfg(feature = "reqwest")]
impl WebhookSmsGateway {
	/// Creates a gateway targeting the given webhook endpoint.
	pub fn new(endpoint: Url) -> Self {
		Self { client: reqwest::Client::new(), endpoint }
	}
}
#[cfg(feature = "reqwest")]
impl SmsGateway for WebhookSmsGateway {
	fn send<'a>(&'a self, to: &'a str, body: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let response = self
				.client
				.post(self.endpoint.clone())
				.json(&json!({ "to": to, "body": body }))
				.send()
				.await
				.map_err(|e| StoreError::Backend { message: e.to_string() })?;

			response
				.error_for_status()
				.map_err(|e| StoreError::Backend { message: e.to_string() })?;

			Ok(())
		})
	}
}

/// Stage implementation dispatching and verifying one-time SMS codes.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthenticatorSmsStage;
impl AuthenticatorSmsStage {
	fn generate_code(length: usize) -> String {
		let mut rng = rand::rng();

		(0..length).map(|_| char::from(b'0' + rng.random_range(0..10_u8))).collect()
	}

	async fn recipient(exec: &StageExecution) -> Result<Option<String>> {
		let Some(raw) = exec.context.get_str(CONTEXT_PENDING_USER) else {
			return Ok(None);
		};
		let Ok(user) = UserRef::new(raw) else {
			return Ok(None);
		};
		let user = exec.services.directory.lookup(&user).await?;

		Ok(user.and_then(|user| user.phone))
	}

	fn mask(number: &str) -> String {
		let visible = number.chars().count().saturating_sub(3);

		number
			.chars()
			.enumerate()
			.map(|(idx, ch)| if idx < visible { '*' } else { ch })
			.collect()
	}
}
impl StageKind for AuthenticatorSmsStage {
	fn component(&self) -> &'static str {
		COMPONENT_AUTHENTICATOR_SMS
	}

	fn prepare<'a>(&'a self, exec: &'a StageExecution) -> StageFuture<'a, ContextPatch> {
		Box::pin(async move {
			let config: SmsConfig = exec.config_as()?;
			let code = Self::generate_code(config.code_length);

			if let Some(phone) = Self::recipient(exec).await? {
				let body = format!("Your authentication code is {code}.");

				exec.services.sms.send(&phone, &body).await?;
			}

			Ok(ContextPatch::new().set(CONTEXT_SMS_CODE, json!(code)))
		})
	}

	fn challenge<'a>(&'a self, exec: &'a StageExecution) -> StageFuture<'a, Challenge> {
		Box::pin(async move {
			let hint = Self::recipient(exec).await?.map(|phone| Self::mask(&phone));

			Ok(Challenge::new(COMPONENT_AUTHENTICATOR_SMS, exec.flow_info.clone())
				.with_payload(json!({ "phone_number_hint": hint })))
		})
	}

	fn process<'a>(
		&'a self,
		exec: &'a StageExecution,
		input: &'a Value,
	) -> StageFuture<'a, StageOutcome> {
		Box::pin(async move {
			let input: SmsInput = match parse_input(input) {
				Ok(input) => input,
				Err(errors) => return Ok(StageOutcome::Retry { errors, patch: ContextPatch::new() }),
			};
			let expected = exec.context.get_str(CONTEXT_SMS_CODE);

			if expected.is_some_and(|expected| expected == input.code.trim()) {
				Ok(StageOutcome::Advance {
					patch: ContextPatch::new()
						.set(CONTEXT_AUTH_METHOD, json!("sms"))
						.set(CONTEXT_SMS_CODE, Value::Null),
				})
			} else {
				let errors = ResponseErrors::from_iter([(
					"code".to_string(),
					vec![FieldError::invalid("Code does not match.")],
				)]);

				Ok(StageOutcome::Retry { errors, patch: ContextPatch::new() })
			}
		})
	}
}
