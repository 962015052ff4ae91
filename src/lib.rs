//! Multi-protocol authentication flow engine: policy-gated stage planning,
//! challenge/response session execution, and provider artifact issuance for
//! identity providers.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod context;
pub mod error;
pub mod executor;
pub mod flow;
pub mod id;
pub mod inspector;
pub mod obs;
pub mod plan;
pub mod policy;
pub mod provider;
pub mod stage;
pub mod store;

#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience helpers for integration tests; enabled via `cfg(test)` or
	//! the `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		executor::FlowExecutor,
		flow::FlowCatalog,
		policy::PolicyEngine,
		provider::TokenEngine,
		stage::{MemoryDirectory, RecordingSmsGateway, StageRegistry, StageServices},
		store::MemoryArtifactStore,
	};

	/// Fully wired in-memory engine used across integration tests.
	#[derive(Debug)]
	pub struct TestEngine {
		/// Executor over the in-memory backends.
		pub executor: FlowExecutor,
		/// Directory backing identification/password stages.
		pub directory: Arc<MemoryDirectory>,
		/// Artifact store backing the token engine.
		pub store: Arc<MemoryArtifactStore>,
		/// Token engine shared with the executor.
		pub tokens: Arc<TokenEngine>,
		/// Recording SMS gateway.
		pub sms: Arc<RecordingSmsGateway>,
	}

	/// Builds a test engine from a catalog and policy engine.
	pub fn build_test_engine(catalog: FlowCatalog, policies: PolicyEngine) -> TestEngine {
		let directory = Arc::new(MemoryDirectory::default());
		let store = Arc::new(MemoryArtifactStore::default());
		let sms = Arc::new(RecordingSmsGateway::default());
		let tokens = Arc::new(TokenEngine::new(
			store.clone(),
			Url::parse("https://sso.example.com/").expect("Test base URL should parse."),
		));
		let services =
			StageServices::new(directory.clone() as Arc<dyn crate::stage::Directory>)
				.with_sms(sms.clone() as Arc<dyn crate::stage::SmsGateway>);
		let executor = FlowExecutor::new(
			Arc::new(catalog),
			Arc::new(StageRegistry::with_builtins()),
			Arc::new(policies),
			tokens.clone(),
			services,
		);

		TestEngine { executor, directory, store, tokens, sms }
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use url;
#[cfg(test)] use httpmock as _;
