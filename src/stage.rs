//! Stage contracts: challenge envelopes, outcomes, and the kind registry.
//!
//! A stage kind is one challenge/response implementation keyed by its
//! `component` discriminator. The registry holds an open set of kinds;
//! new ones are registered at startup and resolved by the planner, so no
//! central switch over stage types exists anywhere in the engine.

pub mod authenticator_sms;
pub mod deny;
pub mod directory;
pub mod identification;
pub mod password;
pub mod prompt;
pub mod redirect;
pub mod registry;
pub mod user_login;

pub use authenticator_sms::*;
pub use deny::*;
pub use directory::*;
pub use identification::*;
pub use password::*;
pub use prompt::*;
pub use redirect::*;
pub use registry::*;
pub use user_login::*;

// std
use std::collections::BTreeMap;
// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	context::{ContextPatch, PlanContext, RequestContext},
	id::StageId,
};

/// Key under which stage-level (non-field) errors are reported.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// One field-level validation message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
	/// Human-readable message.
	pub string: String,
	/// Machine-readable error code.
	pub code: String,
}
impl FieldError {
	/// Creates an `invalid` coded error.
	pub fn invalid(message: impl Into<String>) -> Self {
		Self { string: message.into(), code: "invalid".into() }
	}

	/// Creates a `required` coded error.
	pub fn required() -> Self {
		Self { string: "This field is required.".into(), code: "required".into() }
	}
}

/// Field name to message list mapping returned with retry challenges.
pub type ResponseErrors = BTreeMap<String, Vec<FieldError>>;

/// Presentation metadata copied into every challenge envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowInfo {
	/// Flow title.
	pub title: String,
	/// Layout identifier.
	pub layout: String,
	/// Background image URL.
	pub background: Option<String>,
	/// URL cancelling the current execution.
	pub cancel_url: Option<String>,
}

/// Serializable challenge envelope sent to executor clients.
///
/// `component` discriminates the stage kind; `payload` carries the kind's
/// field schema and `response_errors` the validation messages of the last
/// rejected submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Challenge {
	/// Stage-kind discriminator.
	pub component: String,
	/// Flow presentation metadata.
	pub flow_info: FlowInfo,
	/// Stage-specific payload.
	pub payload: Value,
	/// Validation errors from the previous submission attempt.
	pub response_errors: ResponseErrors,
}
impl Challenge {
	/// Creates an empty challenge for a component.
	pub fn new(component: impl Into<String>, flow_info: FlowInfo) -> Self {
		Self {
			component: component.into(),
			flow_info,
			payload: Value::Null,
			response_errors: ResponseErrors::new(),
		}
	}

	/// Attaches the stage-specific payload.
	pub fn with_payload(mut self, payload: Value) -> Self {
		self.payload = payload;

		self
	}

	/// Attaches validation errors.
	pub fn with_errors(mut self, errors: ResponseErrors) -> Self {
		self.response_errors = errors;

		self
	}
}

/// Result of processing one challenge response.
#[derive(Clone, Debug)]
pub enum StageOutcome {
	/// Input accepted; apply the patch and move the cursor forward.
	Advance {
		/// Context updates to merge before advancing.
		patch: ContextPatch,
	},
	/// Input rejected; keep the cursor and re-serve the challenge.
	Retry {
		/// Field-level validation messages.
		errors: ResponseErrors,
		/// Context updates to merge despite the rejection (attempt counters).
		patch: ContextPatch,
	},
	/// Terminal redirect; the session ends per the flow's denied action.
	Redirect {
		/// Optional explicit target.
		to: Option<String>,
	},
}
impl StageOutcome {
	/// Advance without context changes.
	pub fn advance() -> Self {
		StageOutcome::Advance { patch: ContextPatch::new() }
	}

	/// Retry with a single non-field error message.
	pub fn retry_message(message: impl Into<String>) -> Self {
		let errors = ResponseErrors::from_iter([(
			NON_FIELD_ERRORS.to_string(),
			vec![FieldError::invalid(message)],
		)]);

		StageOutcome::Retry { errors, patch: ContextPatch::new() }
	}
}

/// Everything a stage implementation may read while serving one call.
///
/// The execution is an owned snapshot: stage code never holds locks on the
/// session table, and mutations only travel back through [`StageOutcome`].
#[derive(Clone, Debug)]
pub struct StageExecution {
	/// Stage instance being executed.
	pub stage: StageId,
	/// Configuration snapshot taken at plan-build time.
	pub config: Value,
	/// Immutable request context.
	pub request: RequestContext,
	/// Current plan context.
	pub context: PlanContext,
	/// Presentation metadata for challenges.
	pub flow_info: FlowInfo,
	/// Shared services (directory, SMS gateway).
	pub services: StageServices,
}
impl StageExecution {
	/// Deserializes the stage configuration snapshot.
	pub fn config_as<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let deserializer = self.config.clone();

		serde_path_to_error::deserialize(deserializer).map_err(|e| {
			crate::error::ConfigError::MalformedStageConfig {
				stage: self.stage.to_string(),
				message: e.to_string(),
			}
			.into()
		})
	}
}

/// Shared services stages may call out to.
#[derive(Clone)]
pub struct StageServices {
	/// User directory for identification and password verification.
	pub directory: Arc<dyn Directory>,
	/// Gateway used by the SMS authenticator stage.
	pub sms: Arc<dyn SmsGateway>,
}
impl StageServices {
	/// Creates services with a directory and the null SMS gateway.
	pub fn new(directory: Arc<dyn Directory>) -> Self {
		Self { directory, sms: Arc::new(NullSmsGateway) }
	}

	/// Replaces the SMS gateway.
	pub fn with_sms(mut self, sms: Arc<dyn SmsGateway>) -> Self {
		self.sms = sms;

		self
	}
}
impl Debug for StageServices {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("StageServices(..)")
	}
}

/// Boxed future returned by stage trait methods.
pub type StageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// One challenge/response implementation, keyed by its component string.
pub trait StageKind: Send + Sync {
	/// Stable component discriminator (doubles as the registry key).
	fn component(&self) -> &'static str;

	/// Hook run once when the stage becomes current; may patch the context
	/// and trigger side effects (e.g. dispatching an SMS code). The default
	/// does nothing.
	fn prepare<'a>(&'a self, exec: &'a StageExecution) -> StageFuture<'a, ContextPatch> {
		let _ = exec;

		Box::pin(async { Ok(ContextPatch::new()) })
	}

	/// Builds the serializable challenge for the current state. Read-only:
	/// serving a challenge must never advance or mutate the session.
	fn challenge<'a>(&'a self, exec: &'a StageExecution) -> StageFuture<'a, Challenge>;

	/// Processes one challenge response into an outcome.
	fn process<'a>(
		&'a self,
		exec: &'a StageExecution,
		input: &'a Value,
	) -> StageFuture<'a, StageOutcome>;
}

/// Deserializes a challenge response, mapping failures to field errors with
/// the offending path qualified.
pub fn parse_input<T>(input: &Value) -> Result<T, ResponseErrors>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(input.clone()).map_err(|e| {
		let path = e.path().to_string();
		let field = if path.is_empty() || path == "." { NON_FIELD_ERRORS.to_string() } else { path };

		ResponseErrors::from_iter([(field, vec![FieldError::invalid(e.to_string())])])
	})
}
