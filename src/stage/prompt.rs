//! Prompt stage: declarative field collection with per-field validation.

// crates.io
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	context::{CONTEXT_PROMPT_PREFIX, ContextPatch},
	stage::{
		Challenge, FieldError, ResponseErrors, StageExecution, StageFuture, StageKind,
		StageOutcome,
	},
};

/// Component discriminator for the prompt stage.
pub const COMPONENT_PROMPT: &str = "ak-stage-prompt";

/// Input widget kinds supported by prompt fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptFieldKind {
	/// Free-form text.
	Text,
	/// Email address; must contain an `@`.
	Email,
	/// Numeric value; numbers or numeric strings accepted.
	Number,
	/// Boolean checkbox.
	Checkbox,
	/// Hidden field passed through unchanged.
	Hidden,
}

/// One declared prompt field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptField {
	/// Key the collected value is stored under.
	pub field_key: String,
	/// Label shown next to the input.
	pub label: String,
	/// Widget kind.
	pub kind: PromptFieldKind,
	/// Reject submissions missing this field.
	pub required: bool,
	/// Placeholder text.
	#[serde(default)]
	pub placeholder: Option<String>,
}

/// Prompt stage configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
	/// Declared fields, rendered in order.
	pub fields: Vec<PromptField>,
}

fn validate_field(field: &PromptField, value: Option<&Value>) -> Result<Option<Value>, FieldError> {
	let Some(value) = value else {
		if field.required {
			return Err(FieldError::required());
		}

		return Ok(None);
	};

	match field.kind {
		PromptFieldKind::Email => match value.as_str() {
			Some(text) if text.contains('@') => Ok(Some(value.clone())),
			_ => Err(FieldError::invalid("Enter a valid email address.")),
		},
		PromptFieldKind::Number =>
			if value.is_number() || value.as_str().is_some_and(|s| s.parse::<f64>().is_ok()) {
				Ok(Some(value.clone()))
			} else {
				Err(FieldError::invalid("Enter a number."))
			},
		PromptFieldKind::Checkbox => match value.as_bool() {
			Some(_) => Ok(Some(value.clone())),
			None => Err(FieldError::invalid("Enter a boolean value.")),
		},
		PromptFieldKind::Text | PromptFieldKind::Hidden => match value.as_str() {
			Some(_) => Ok(Some(value.clone())),
			None => Err(FieldError::invalid("Enter a text value.")),
		},
	}
}

/// Stage implementation collecting declared fields into the plan context.
#[derive(Clone, Copy, Debug, Default)]
pub struct PromptStage;
impl StageKind for PromptStage {
	fn component(&self) -> &'static str {
		COMPONENT_PROMPT
	}

	fn challenge<'a>(&'a self, exec: &'a StageExecution) -> StageFuture<'a, Challenge> {
		Box::pin(async move {
			let config: PromptConfig = exec.config_as()?;

			Ok(Challenge::new(COMPONENT_PROMPT, exec.flow_info.clone())
				.with_payload(json!({ "fields": config.fields })))
		})
	}

	fn process<'a>(
		&'a self,
		exec: &'a StageExecution,
		input: &'a Value,
	) -> StageFuture<'a, StageOutcome> {
		Box::pin(async move {
			let config: PromptConfig = exec.config_as()?;
			let mut errors = ResponseErrors::new();
			let mut patch = ContextPatch::new();

			for field in &config.fields {
				match validate_field(field, input.get(&field.field_key)) {
					Ok(Some(value)) => {
						patch = patch
							.set(format!("{CONTEXT_PROMPT_PREFIX}{}", field.field_key), value);
					},
					Ok(None) => {},
					Err(error) => {
						errors.insert(field.field_key.clone(), vec![error]);
					},
				}
			}

			if errors.is_empty() {
				Ok(StageOutcome::Advance { patch })
			} else {
				Ok(StageOutcome::Retry { errors, patch: ContextPatch::new() })
			}
		})
	}
}
