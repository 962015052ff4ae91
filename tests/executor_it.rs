mod common;

// crates.io
use serde_json::json;
// self
use authflow::{
	error::{Error, SessionError},
	executor::{AdvanceResult, SessionState},
	flow::{DeniedAction, Flow, FlowDesignation, PolicyBinding, StageBinding, StageDefinition},
	id::{FlowSlug, PolicyId},
	policy::{ContextValuePolicy, PolicyEngine, StaticPolicy},
	stage::{
		COMPONENT_ACCESS_DENIED, COMPONENT_AUTHENTICATOR_SMS, COMPONENT_IDENTIFICATION,
		COMPONENT_PASSWORD,
	},
};
use common::{build_engine, login_catalog, stage_id};
use std::sync::Arc;
use time::Duration;

fn flow_slug(raw: &str) -> FlowSlug {
	FlowSlug::new(raw).expect("Flow slug fixture should be valid.")
}

fn login_flow() -> Flow {
	Flow::new(flow_slug("default-login"), "Welcome", FlowDesignation::Authentication)
		.with_binding(StageBinding::new(stage_id("ident"), 10))
		.with_binding(StageBinding::new(stage_id("password"), 20))
}

#[tokio::test]
async fn login_round_trip_completes_in_exactly_one_submit_per_stage() {
	let engine = build_engine(login_catalog(login_flow()), PolicyEngine::new());

	engine
		.directory
		.add_user("alice", None, None, "hunter2")
		.expect("Fixture user should be valid.");

	let started = engine
		.executor
		.start("default-login", authflow::context::RequestContext::anonymous())
		.await
		.expect("Flow should start.");

	assert_eq!(started.state, SessionState::Running);

	let challenge = engine
		.executor
		.current_challenge(&started.session)
		.await
		.expect("Challenge should be served.");

	assert_eq!(challenge.component, COMPONENT_IDENTIFICATION);
	assert_eq!(challenge.flow_info.title, "Welcome");

	// Submit 1/2: identification.
	let result = engine
		.executor
		.submit(&started.session, &stage_id("ident"), &json!({ "uid_field": "alice" }))
		.await
		.expect("Identification submit should succeed.");
	let AdvanceResult::Challenge { challenge } = result else {
		panic!("Identification should advance to the password stage.");
	};

	assert_eq!(challenge.component, COMPONENT_PASSWORD);

	// A wrong password is a retry outcome; the cursor must not move.
	let result = engine
		.executor
		.submit(&started.session, &stage_id("password"), &json!({ "password": "wrong" }))
		.await
		.expect("Wrong password submit still succeeds at the session level.");
	let AdvanceResult::Retry { challenge } = result else {
		panic!("Wrong password should be a retry outcome.");
	};

	assert_eq!(challenge.component, COMPONENT_PASSWORD);
	assert!(challenge.response_errors.contains_key("password"));

	// Submit 2/2: password.
	let result = engine
		.executor
		.submit(&started.session, &stage_id("password"), &json!({ "password": "hunter2" }))
		.await
		.expect("Correct password submit should succeed.");

	assert!(matches!(result, AdvanceResult::Completed { .. }));

	let snapshot = engine
		.executor
		.session_snapshot(&started.session)
		.expect("Session snapshot should exist.");

	assert_eq!(snapshot.state, SessionState::Completed);
	assert_eq!(snapshot.history.len(), 2, "One history snapshot per passed stage.");

	// A completed session serves a redirect challenge, never a stale stage.
	let challenge = engine
		.executor
		.current_challenge(&started.session)
		.await
		.expect("Completed sessions serve a redirect challenge.");

	assert_eq!(challenge.component, "xak-flow-redirect");
}

#[tokio::test]
async fn restart_action_rebuilds_the_plan_on_invalid_response() {
	let flow = Flow::new(
		flow_slug("default-login"),
		"Welcome",
		FlowDesignation::Authentication,
	)
	.with_binding(StageBinding::new(stage_id("ident"), 10))
	.with_binding(
		StageBinding::new(stage_id("password"), 20)
			.with_invalid_response_action(authflow::flow::InvalidResponseAction::Restart),
	);
	let engine = build_engine(login_catalog(flow), PolicyEngine::new());

	engine
		.directory
		.add_user("alice", None, None, "hunter2")
		.expect("Fixture user should be valid.");

	let started = engine
		.executor
		.start("default-login", authflow::context::RequestContext::anonymous())
		.await
		.expect("Flow should start.");

	engine
		.executor
		.submit(&started.session, &stage_id("ident"), &json!({ "uid_field": "alice" }))
		.await
		.expect("Identification should succeed.");

	// An invalid response restarts the flow from the first stage.
	let result = engine
		.executor
		.submit(&started.session, &stage_id("password"), &json!({ "password": "wrong" }))
		.await
		.expect("Invalid response with restart action still succeeds at the session level.");
	let AdvanceResult::Challenge { challenge } = result else {
		panic!("The restart action should re-serve the first stage.");
	};

	assert_eq!(challenge.component, COMPONENT_IDENTIFICATION);

	let snapshot = engine
		.executor
		.session_snapshot(&started.session)
		.expect("Session snapshot should exist.");

	assert_eq!(snapshot.state, SessionState::Running);
	assert!(
		snapshot.plan.context.get_str("pending_user").is_none(),
		"A plain restart discards the collected context."
	);
}

#[tokio::test]
async fn stage_mismatch_is_reported_not_reassigned() {
	let engine = build_engine(login_catalog(login_flow()), PolicyEngine::new());
	let started = engine
		.executor
		.start("default-login", authflow::context::RequestContext::anonymous())
		.await
		.expect("Flow should start.");
	let err = engine
		.executor
		.submit(&started.session, &stage_id("password"), &json!({ "password": "x" }))
		.await
		.expect_err("Submitting the wrong stage must fail.");

	assert!(matches!(
		err,
		Error::Session(SessionError::StageMismatch { .. })
	));

	// The session is untouched and still serves the identification stage.
	let challenge = engine
		.executor
		.current_challenge(&started.session)
		.await
		.expect("Challenge should still be served.");

	assert_eq!(challenge.component, COMPONENT_IDENTIFICATION);
}

#[tokio::test]
async fn unknown_flow_fails_to_start() {
	let engine = build_engine(login_catalog(login_flow()), PolicyEngine::new());
	let err = engine
		.executor
		.start("missing-flow", authflow::context::RequestContext::anonymous())
		.await
		.expect_err("Unknown flow should fail.");

	assert!(matches!(err, Error::Flow(authflow::error::FlowError::NotFound { .. })));
}

#[tokio::test]
async fn cancel_is_idempotent() {
	let engine = build_engine(login_catalog(login_flow()), PolicyEngine::new());
	let started = engine
		.executor
		.start("default-login", authflow::context::RequestContext::anonymous())
		.await
		.expect("Flow should start.");

	engine.executor.cancel(&started.session).expect("First cancel should succeed.");
	engine.executor.cancel(&started.session).expect("Second cancel should be a no-op.");

	let snapshot = engine
		.executor
		.session_snapshot(&started.session)
		.expect("Session snapshot should exist.");

	assert_eq!(snapshot.state, SessionState::Cancelled);

	let err = engine
		.executor
		.submit(&started.session, &stage_id("ident"), &json!({ "uid_field": "alice" }))
		.await
		.expect_err("Cancelled sessions accept no input.");

	assert!(matches!(err, Error::Session(SessionError::NotActive { .. })));
}

#[tokio::test]
async fn expired_sessions_are_terminal() {
	let engine = build_engine(login_catalog(login_flow()), PolicyEngine::new());
	let executor = engine.executor.with_session_ttl(Duration::ZERO);
	let started = executor
		.start("default-login", authflow::context::RequestContext::anonymous())
		.await
		.expect("Flow should start.");
	let err = executor
		.current_challenge(&started.session)
		.await
		.expect_err("A zero-TTL session is expired on first access.");

	assert!(matches!(err, Error::Session(SessionError::Expired)));

	let err = executor
		.submit(&started.session, &stage_id("ident"), &json!({ "uid_field": "alice" }))
		.await
		.expect_err("Expired sessions never accept input.");

	assert!(matches!(err, Error::Session(SessionError::Expired)));
}

#[tokio::test]
async fn background_sweep_expires_stale_sessions() {
	let engine = build_engine(login_catalog(login_flow()), PolicyEngine::new());
	let executor = engine.executor.with_session_ttl(Duration::ZERO);
	let started = executor
		.start("default-login", authflow::context::RequestContext::anonymous())
		.await
		.expect("Flow should start.");

	assert_eq!(executor.sweep_expired(), 1);
	assert_eq!(
		executor
			.session_snapshot(&started.session)
			.expect("Session snapshot should exist.")
			.state,
		SessionState::Expired
	);
	assert_eq!(executor.sweep_expired(), 0, "The sweep only counts newly expired sessions.");
}

#[tokio::test]
async fn newer_start_supersedes_the_same_correlation_key() {
	let engine = build_engine(login_catalog(login_flow()), PolicyEngine::new());
	let request = authflow::context::RequestContext::anonymous()
		.with_correlation_key("browser-1");
	let first = engine
		.executor
		.start("default-login", request.clone())
		.await
		.expect("First start should succeed.");
	let second = engine
		.executor
		.start("default-login", request)
		.await
		.expect("Second start should succeed.");

	assert_eq!(
		engine
			.executor
			.session_snapshot(&first.session)
			.expect("First session should exist.")
			.state,
		SessionState::Cancelled,
		"The older session is marked cancelled, not silently dropped."
	);
	assert_eq!(
		engine
			.executor
			.session_snapshot(&second.session)
			.expect("Second session should exist.")
			.state,
		SessionState::Running
	);
}

#[tokio::test]
async fn denied_flow_serves_a_denial_challenge_and_no_real_stage() {
	let flow = login_flow().with_denied_action(DeniedAction::Message).with_policy(
		PolicyBinding::new(
			PolicyId::new("deny-all").expect("Policy id fixture should be valid."),
			0,
		),
	);
	let mut policies = PolicyEngine::new();

	policies.register(
		PolicyId::new("deny-all").expect("Policy id fixture should be valid."),
		Arc::new(StaticPolicy::deny("Maintenance window.")),
	);

	let engine = build_engine(login_catalog(flow), policies);
	let started = engine
		.executor
		.start("default-login", authflow::context::RequestContext::anonymous())
		.await
		.expect("Denied flows still start into a denial session.");

	assert_eq!(started.state, SessionState::Denied);

	let challenge = engine
		.executor
		.current_challenge(&started.session)
		.await
		.expect("Denial challenge should be served.");

	assert_eq!(challenge.component, COMPONENT_ACCESS_DENIED);
	assert_eq!(challenge.payload["error_message"], json!("Maintenance window."));
}

#[tokio::test]
async fn continue_denied_action_completes_with_a_redirect() {
	let flow = login_flow().with_denied_action(DeniedAction::Continue).with_policy(
		PolicyBinding::new(
			PolicyId::new("deny-all").expect("Policy id fixture should be valid."),
			0,
		),
	);
	let mut policies = PolicyEngine::new();

	policies.register(
		PolicyId::new("deny-all").expect("Policy id fixture should be valid."),
		Arc::new(StaticPolicy::deny("no entry")),
	);

	let engine = build_engine(login_catalog(flow), policies);
	let started = engine
		.executor
		.start(
			"default-login",
			authflow::context::RequestContext::anonymous().with_next("/app"),
		)
		.await
		.expect("Denied flows still start.");

	assert_eq!(started.state, SessionState::Denied);

	let challenge = engine
		.executor
		.current_challenge(&started.session)
		.await
		.expect("Redirect challenge should be served.");

	assert_eq!(challenge.component, "xak-flow-redirect");
	assert_eq!(challenge.payload["to"], json!("/app"));
}

#[tokio::test]
async fn reevaluated_bindings_skip_stages_mid_session() {
	// The SMS stage binding re-evaluates a negated context check: once the
	// password stage records `auth_method`, the policy passes, negation turns
	// it into a failure, and the stage is skipped.
	let mut catalog = login_catalog(
		login_flow().with_binding(
			StageBinding::new(stage_id("sms"), 30)
				.re_evaluate_policies(true)
				.with_policy(
					PolicyBinding::new(
						PolicyId::new("password-used")
							.expect("Policy id fixture should be valid."),
						0,
					)
					.negated(),
				),
		),
	);

	catalog.insert_stage(StageDefinition {
		id: stage_id("sms"),
		component: COMPONENT_AUTHENTICATOR_SMS.into(),
		config: json!({}),
	});

	let mut policies = PolicyEngine::new();

	policies.register(
		PolicyId::new("password-used").expect("Policy id fixture should be valid."),
		Arc::new(ContextValuePolicy::new("auth_method", json!("password"))),
	);

	let engine = build_engine(catalog, policies);

	engine
		.directory
		.add_user("alice", None, Some("+15551234567"), "hunter2")
		.expect("Fixture user should be valid.");

	let started = engine
		.executor
		.start("default-login", authflow::context::RequestContext::anonymous())
		.await
		.expect("Flow should start.");

	engine
		.executor
		.submit(&started.session, &stage_id("ident"), &json!({ "uid_field": "alice" }))
		.await
		.expect("Identification should succeed.");

	let result = engine
		.executor
		.submit(&started.session, &stage_id("password"), &json!({ "password": "hunter2" }))
		.await
		.expect("Password should succeed.");

	assert!(
		matches!(result, AdvanceResult::Completed { .. }),
		"The SMS stage must be skipped after its re-evaluated policy failed."
	);

	let snapshot = engine
		.executor
		.session_snapshot(&started.session)
		.expect("Session snapshot should exist.");
	let sms_stage = snapshot
		.plan
		.stages
		.iter()
		.find(|stage| stage.component == COMPONENT_AUTHENTICATOR_SMS)
		.expect("SMS stage should remain in the plan.");

	assert_eq!(sms_stage.status, authflow::plan::StageStatus::Skipped);
	assert!(engine.sms.sent().is_empty(), "A skipped stage must not dispatch codes.");
}
