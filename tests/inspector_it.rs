mod common;

// crates.io
use serde_json::json;
// self
use authflow::{
	context::RequestContext,
	error::{Error, SessionError},
	flow::{Flow, FlowDesignation, StageBinding},
	id::{FlowSlug, SessionId},
	policy::PolicyEngine,
	stage::{COMPONENT_IDENTIFICATION, COMPONENT_PASSWORD},
};
use common::{build_engine, login_catalog, stage_id};

fn login_flow() -> Flow {
	Flow::new(
		FlowSlug::new("default-login").expect("Flow slug fixture should be valid."),
		"Welcome",
		FlowDesignation::Authentication,
	)
	.with_binding(StageBinding::new(stage_id("ident"), 10))
	.with_binding(StageBinding::new(stage_id("password"), 20))
}

#[tokio::test]
async fn inspection_tracks_progress_and_redacts_secrets() {
	let engine = build_engine(login_catalog(login_flow()), PolicyEngine::new());

	engine
		.directory
		.add_user("alice", None, None, "hunter2")
		.expect("Fixture user should be valid.");

	let started = engine
		.executor
		.start("default-login", RequestContext::anonymous())
		.await
		.expect("Flow should start.");
	let inspection =
		engine.executor.inspect(&started.session).expect("Inspection should succeed.");
	let current = inspection.current_plan.expect("A running session has a current plan.");
	let current_stage = current.current_stage.expect("The cursor points at a stage.");

	assert_eq!(current_stage.component, COMPONENT_IDENTIFICATION);
	assert_eq!(
		current
			.next_planned_stage
			.expect("The password stage is planned next.")
			.component,
		COMPONENT_PASSWORD
	);
	assert!(!inspection.is_completed);
	assert!(inspection.plans.is_empty());

	engine
		.executor
		.submit(&started.session, &stage_id("ident"), &json!({ "uid_field": "alice" }))
		.await
		.expect("Identification should succeed.");

	let inspection =
		engine.executor.inspect(&started.session).expect("Inspection should succeed.");

	assert_eq!(inspection.plans.len(), 1, "One historical plan per passed stage.");

	let current = inspection.current_plan.expect("The session is still running.");

	assert_eq!(
		current.current_stage.expect("The cursor moved on.").component,
		COMPONENT_PASSWORD
	);
	assert_eq!(
		current.plan_context.get("pending_user"),
		Some(&json!("alice")),
		"Non-sensitive context values pass through."
	);

	engine
		.executor
		.submit(&started.session, &stage_id("password"), &json!({ "password": "hunter2" }))
		.await
		.expect("Password should succeed.");

	let inspection =
		engine.executor.inspect(&started.session).expect("Inspection should succeed.");

	assert!(inspection.is_completed);
	assert!(inspection.current_plan.is_none(), "Terminal sessions have no current plan.");
	assert_eq!(inspection.plans.len(), 2);
}

#[tokio::test]
async fn inspection_redacts_sensitive_context_keys() {
	use authflow::flow::StageDefinition;
	use authflow::stage::COMPONENT_AUTHENTICATOR_SMS;

	let flow = Flow::new(
		FlowSlug::new("mfa").expect("Flow slug fixture should be valid."),
		"MFA",
		FlowDesignation::Authentication,
	)
	.with_binding(StageBinding::new(stage_id("ident"), 10))
	.with_binding(StageBinding::new(stage_id("sms"), 20));
	let mut catalog = login_catalog(flow);

	catalog.insert_stage(StageDefinition {
		id: stage_id("sms"),
		component: COMPONENT_AUTHENTICATOR_SMS.into(),
		config: json!({}),
	});

	let engine = build_engine(catalog, PolicyEngine::new());

	engine
		.directory
		.add_user("alice", None, Some("+15551234567"), "hunter2")
		.expect("Fixture user should be valid.");

	let started = engine
		.executor
		.start("mfa", RequestContext::anonymous())
		.await
		.expect("Flow should start.");

	engine
		.executor
		.submit(&started.session, &stage_id("ident"), &json!({ "uid_field": "alice" }))
		.await
		.expect("Identification should succeed.");

	let inspection =
		engine.executor.inspect(&started.session).expect("Inspection should succeed.");
	let current = inspection.current_plan.expect("The session is running.");

	assert_eq!(
		current.plan_context.get("authenticator_sms_code"),
		Some(&json!("<redacted>")),
		"The dispatched one-time code must never leave the engine."
	);
}

#[tokio::test]
async fn inspecting_an_unknown_session_fails() {
	let engine = build_engine(login_catalog(login_flow()), PolicyEngine::new());
	let err = engine
		.executor
		.inspect(&SessionId::generate())
		.expect_err("Unknown sessions cannot be inspected.");

	assert!(matches!(err, Error::Session(SessionError::NotFound)));
}
