//! Shared fixtures wiring a fully in-memory engine for integration tests.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use serde_json::json;
use url::Url;
// self
use authflow::{
	executor::FlowExecutor,
	flow::{Flow, FlowCatalog, StageDefinition},
	id::StageId,
	policy::PolicyEngine,
	provider::TokenEngine,
	stage::{
		COMPONENT_IDENTIFICATION, COMPONENT_PASSWORD, Directory, MemoryDirectory,
		RecordingSmsGateway, SmsGateway, StageRegistry, StageServices,
	},
	store::MemoryArtifactStore,
};

/// Fully wired in-memory engine under test.
pub struct TestEngine {
	pub executor: FlowExecutor,
	pub directory: Arc<MemoryDirectory>,
	pub store: Arc<MemoryArtifactStore>,
	pub tokens: Arc<TokenEngine>,
	pub sms: Arc<RecordingSmsGateway>,
}

pub const BASE_URL: &str = "https://sso.example.com/";

pub fn build_engine(catalog: FlowCatalog, policies: PolicyEngine) -> TestEngine {
	let directory = Arc::new(MemoryDirectory::default());
	let store = Arc::new(MemoryArtifactStore::default());
	let sms = Arc::new(RecordingSmsGateway::default());
	let tokens = Arc::new(TokenEngine::new(
		store.clone(),
		Url::parse(BASE_URL).expect("Test base URL should parse."),
	));
	let services = StageServices::new(directory.clone() as Arc<dyn Directory>)
		.with_sms(sms.clone() as Arc<dyn SmsGateway>);
	let executor = FlowExecutor::new(
		Arc::new(catalog),
		Arc::new(StageRegistry::with_builtins()),
		Arc::new(policies),
		tokens.clone(),
		services,
	);

	TestEngine { executor, directory, store, tokens, sms }
}

pub fn stage_id(raw: &str) -> StageId {
	StageId::new(raw).expect("Stage id fixture should be valid.")
}

/// Catalog with identification + password stage definitions and the flow.
pub fn login_catalog(flow: Flow) -> FlowCatalog {
	let mut catalog = FlowCatalog::new();

	catalog.insert_stage(StageDefinition {
		id: stage_id("ident"),
		component: COMPONENT_IDENTIFICATION.into(),
		config: json!({}),
	});
	catalog.insert_stage(StageDefinition {
		id: stage_id("password"),
		component: COMPONENT_PASSWORD.into(),
		config: json!({}),
	});
	catalog.insert_flow(flow);

	catalog
}
