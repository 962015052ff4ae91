mod common;

// crates.io
use serde_json::json;
// self
use authflow::{
	context::RequestContext,
	executor::AdvanceResult,
	flow::{Flow, FlowDesignation, StageBinding, StageDefinition},
	id::FlowSlug,
	policy::PolicyEngine,
	stage::COMPONENT_AUTHENTICATOR_SMS,
};
use common::{build_engine, login_catalog, stage_id};

fn sms_flow() -> Flow {
	Flow::new(
		FlowSlug::new("mfa-login").expect("Flow slug fixture should be valid."),
		"MFA Login",
		FlowDesignation::Authentication,
	)
	.with_binding(StageBinding::new(stage_id("ident"), 10))
	.with_binding(StageBinding::new(stage_id("password"), 20))
	.with_binding(StageBinding::new(stage_id("sms"), 30))
}

fn extract_code(body: &str) -> String {
	body.chars().filter(char::is_ascii_digit).collect()
}

#[tokio::test]
async fn sms_stage_dispatches_on_entry_and_verifies_the_code() {
	let mut catalog = login_catalog(sms_flow());

	catalog.insert_stage(StageDefinition {
		id: stage_id("sms"),
		component: COMPONENT_AUTHENTICATOR_SMS.into(),
		config: json!({ "code_length": 6 }),
	});

	let engine = build_engine(catalog, PolicyEngine::new());

	engine
		.directory
		.add_user("alice", None, Some("+15551234567"), "hunter2")
		.expect("Fixture user should be valid.");

	let started = engine
		.executor
		.start("mfa-login", RequestContext::anonymous())
		.await
		.expect("Flow should start.");

	engine
		.executor
		.submit(&started.session, &stage_id("ident"), &json!({ "uid_field": "alice" }))
		.await
		.expect("Identification should succeed.");

	// The code is dispatched exactly once, when the stage becomes current.
	assert!(engine.sms.sent().is_empty());

	let result = engine
		.executor
		.submit(&started.session, &stage_id("password"), &json!({ "password": "hunter2" }))
		.await
		.expect("Password should succeed.");
	let AdvanceResult::Challenge { challenge } = result else {
		panic!("Password should advance to the SMS stage.");
	};

	assert_eq!(challenge.component, COMPONENT_AUTHENTICATOR_SMS);
	assert_eq!(
		challenge.payload["phone_number_hint"],
		json!("*********567"),
		"The challenge masks the recipient number."
	);

	let sent = engine.sms.sent();

	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].0, "+15551234567");

	let code = extract_code(&sent[0].1);

	assert_eq!(code.len(), 6);

	// Re-serving the challenge must not dispatch again.
	engine
		.executor
		.current_challenge(&started.session)
		.await
		.expect("Challenge should be re-served.");

	assert_eq!(engine.sms.sent().len(), 1);

	// A wrong code retries, the dispatched code still completes the flow.
	let wrong_code = if code == "000000" { "111111" } else { "000000" };
	let result = engine
		.executor
		.submit(&started.session, &stage_id("sms"), &json!({ "code": wrong_code }))
		.await
		.expect("Wrong code submit still succeeds at the session level.");

	assert!(matches!(result, AdvanceResult::Retry { .. }));

	let result = engine
		.executor
		.submit(&started.session, &stage_id("sms"), &json!({ "code": code }))
		.await
		.expect("Correct code submit should succeed.");

	assert!(matches!(result, AdvanceResult::Completed { .. }));
}
