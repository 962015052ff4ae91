//! Plan construction: policy-gated resolution of a flow's stage bindings.

// crates.io
use serde_json::json;
// self
use crate::{
	_prelude::*,
	context::{PlanContext, RequestContext},
	error::FlowError,
	flow::{
		AuthenticationRequirement, DeniedAction, Flow, FlowCatalog, InvalidResponseAction,
		StageBinding,
	},
	id::StageId,
	plan::{Denial, Plan, PlanMarker, ResolvedStage, StageMarker, StageStatus},
	policy::PolicyEngine,
	stage::{COMPONENT_ACCESS_DENIED, StageRegistry},
};

const DENIAL_MESSAGE: &str = "Request has been denied.";

/// Builds [`Plan`]s by evaluating flow and binding policies against a request.
///
/// A flow that denies access is not an error: the builder resolves it into a
/// denial plan per the flow's denied action. Only structural problems (an
/// unknown flow, a binding pointing at a missing stage or an unregistered
/// component) fail the build.
#[derive(Debug)]
pub struct PlanBuilder<'a> {
	catalog: &'a FlowCatalog,
	registry: &'a StageRegistry,
	policies: &'a PolicyEngine,
}
impl<'a> PlanBuilder<'a> {
	/// Creates a builder over the shared catalog, registry, and policy engine.
	pub fn new(
		catalog: &'a FlowCatalog,
		registry: &'a StageRegistry,
		policies: &'a PolicyEngine,
	) -> Self {
		Self { catalog, registry, policies }
	}

	/// Resolves the flow's bindings into an ordered plan.
	pub fn build(&self, slug: &str, request: &RequestContext) -> Result<Plan> {
		let flow = self
			.catalog
			.flow(slug)
			.ok_or_else(|| FlowError::NotFound { slug: slug.to_owned() })?;
		let context = PlanContext::seeded(&request.seed);

		if !authentication_applies(flow, request) {
			return Ok(self.denial_plan(flow, request, context, DENIAL_MESSAGE.into()));
		}

		let access =
			self.policies.evaluate(&flow.policies, request, &context, flow.policy_engine_mode);

		if !access.passing {
			let message =
				access.messages.first().cloned().unwrap_or_else(|| DENIAL_MESSAGE.into());

			return Ok(self.denial_plan(flow, request, context, message));
		}

		let mut stages = Vec::new();

		for (_, binding) in flow.sorted_bindings() {
			if let Some(resolved) = self.resolve_binding(flow, binding, request, &context)? {
				stages.push(resolved);
			}
		}

		if stages.is_empty() {
			return Ok(self.denial_plan(flow, request, context, DENIAL_MESSAGE.into()));
		}

		let mut markers = Vec::new();
		let provider_binding = request
			.provider
			.clone()
			.filter(|_| flow.designation.issues_provider_artifacts());

		if let Some(provider) = provider_binding {
			markers.push(PlanMarker::ProviderTerminal {
				provider,
				authorization: request.authorization.clone(),
			});
		}

		Ok(Plan {
			flow: flow.slug.clone(),
			designation: flow.designation,
			denied_action: flow.denied_action,
			appearance: flow.appearance.clone(),
			stages,
			context,
			markers,
			denial: None,
		})
	}

	fn resolve_binding(
		&self,
		flow: &Flow,
		binding: &StageBinding,
		request: &RequestContext,
		context: &PlanContext,
	) -> Result<Option<ResolvedStage>> {
		let definition = self.catalog.stage(&binding.stage).ok_or_else(|| FlowError::Build {
			slug: flow.slug.to_string(),
			reason: format!("binding references unknown stage `{}`", binding.stage),
		})?;

		if self.registry.resolve(&definition.component).is_none() {
			return Err(FlowError::Build {
				slug: flow.slug.to_string(),
				reason: format!(
					"stage `{}` uses unregistered component `{}`",
					binding.stage, definition.component
				),
			}
			.into());
		}

		let mode = binding.policy_engine_mode.unwrap_or(flow.policy_engine_mode);

		if binding.evaluate_on_plan {
			let decision = self.policies.evaluate(&binding.policies, request, context, mode);

			if !decision.passing {
				// Policy-excluded bindings never enter the plan; runtime skips
				// are a separate concept driven by reevaluate markers.
				return Ok(None);
			}
		}

		let marker = if binding.re_evaluate_policies {
			StageMarker::Reevaluate { bindings: binding.policies.clone(), mode }
		} else {
			StageMarker::Default
		};

		Ok(Some(ResolvedStage {
			stage: binding.stage.clone(),
			component: definition.component.clone(),
			config: definition.config.clone(),
			status: StageStatus::Pending,
			marker,
			invalid_response_action: binding.invalid_response_action,
		}))
	}

	fn denial_plan(
		&self,
		flow: &Flow,
		request: &RequestContext,
		context: PlanContext,
		message: String,
	) -> Plan {
		let to = match flow.denied_action {
			DeniedAction::MessageContinue | DeniedAction::Continue => request.next.clone(),
			DeniedAction::Message => None,
		};
		let stages = match flow.denied_action {
			// A synthetic denial terminal carries the message (and the
			// continue target for message_continue).
			DeniedAction::MessageContinue | DeniedAction::Message => vec![ResolvedStage {
				stage: StageId::new("ak-synthetic-denial")
					.expect("Synthetic stage id is well-formed."),
				component: COMPONENT_ACCESS_DENIED.into(),
				config: json!({ "deny_message": message, "to": to }),
				status: StageStatus::Current,
				marker: StageMarker::Default,
				invalid_response_action: InvalidResponseAction::Retry,
			}],
			// The continue action redirects straight to the default interface.
			DeniedAction::Continue => Vec::new(),
		};

		Plan {
			flow: flow.slug.clone(),
			designation: flow.designation,
			denied_action: flow.denied_action,
			appearance: flow.appearance.clone(),
			stages,
			context,
			markers: Vec::new(),
			denial: Some(Denial { message, to }),
		}
	}
}

fn authentication_applies(flow: &Flow, request: &RequestContext) -> bool {
	match flow.authentication {
		AuthenticationRequirement::None => true,
		AuthenticationRequirement::RequireAuthenticated => request.authenticated,
		AuthenticationRequirement::RequireUnauthenticated => !request.authenticated,
		AuthenticationRequirement::RequireSuperuser => request.superuser,
	}
}
