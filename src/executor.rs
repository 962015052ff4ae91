//! Flow executor: the per-session state machine over resolved plans.
//!
//! Operations on one session are strictly serialized through a per-session
//! guard; reads work on copy-on-write snapshots and never block submissions.
//! Stage `process` calls run without any executor lock held, and their
//! results are discarded (not applied) when the session was cancelled while
//! the call was in flight.

pub mod session;

pub use session::*;

// crates.io
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	context::{CONTEXT_PENDING_USER, CONTEXT_REDIRECT, RequestContext},
	error::{ConfigError, ProviderError, SessionError},
	flow::{DeniedAction, FlowCatalog, InvalidResponseAction},
	id::{SessionId, StageId, UserRef},
	obs::{self, EngineOp, OpOutcome, OpSpan},
	plan::{PlanBuilder, StageMarker, StageStatus},
	policy::PolicyEngine,
	provider::{IssuedArtifact, TokenEngine},
	stage::{
		COMPONENT_REDIRECT, Challenge, StageExecution, StageKind, StageOutcome, StageRegistry,
		StageServices,
	},
};

const DEFAULT_SESSION_TTL: Duration = Duration::minutes(30);
const DEFAULT_INTERFACE: &str = "/";
const DENIAL_MESSAGE: &str = "Request has been denied.";

/// Result of starting a flow execution.
#[derive(Clone, Debug)]
pub struct StartedFlow {
	/// Identifier of the created session.
	pub session: SessionId,
	/// State right after planning (running, or already denied/completed).
	pub state: SessionState,
}

/// Result of submitting one challenge response.
#[derive(Clone, Debug, Serialize)]
pub enum AdvanceResult {
	/// Cursor advanced; this is the next stage's challenge.
	Challenge {
		/// Challenge of the new current stage.
		challenge: Challenge,
	},
	/// Input rejected; same stage re-served with error annotations.
	Retry {
		/// Challenge of the unchanged current stage, with errors attached.
		challenge: Challenge,
	},
	/// Every stage passed; the session is complete.
	Completed {
		/// Redirect target, when one was collected or minted.
		redirect: Option<String>,
		/// Provider artifact minted at the terminal, when applicable.
		artifact: Option<IssuedArtifact>,
	},
	/// The flow denied access per its denied action.
	Denied {
		/// User-facing denial message.
		message: Option<String>,
		/// Continue target, when the denied action allows continuing.
		redirect: Option<String>,
	},
}

enum Staged {
	Retry,
	Next,
	Completed { redirect: Option<String>, artifact: Option<IssuedArtifact> },
	Denied { message: Option<String>, redirect: Option<String> },
}

/// Executes flows: builds plans, walks sessions stage by stage, and invokes
/// the token engine at provider terminals.
pub struct FlowExecutor {
	catalog: Arc<FlowCatalog>,
	registry: Arc<StageRegistry>,
	policies: Arc<PolicyEngine>,
	tokens: Arc<TokenEngine>,
	services: StageServices,
	sessions: RwLock<HashMap<SessionId, FlowExecutionSession>>,
	correlation: Mutex<HashMap<String, SessionId>>,
	guards: Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
	session_ttl: Duration,
}
impl FlowExecutor {
	/// Creates an executor over the shared catalog, registry, and engines.
	pub fn new(
		catalog: Arc<FlowCatalog>,
		registry: Arc<StageRegistry>,
		policies: Arc<PolicyEngine>,
		tokens: Arc<TokenEngine>,
		services: StageServices,
	) -> Self {
		Self {
			catalog,
			registry,
			policies,
			tokens,
			services,
			sessions: RwLock::new(HashMap::new()),
			correlation: Mutex::new(HashMap::new()),
			guards: Mutex::new(HashMap::new()),
			session_ttl: DEFAULT_SESSION_TTL,
		}
	}

	/// Overrides the session lifetime.
	pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
		self.session_ttl = ttl;

		self
	}

	/// Builds a plan for the flow and opens a session over it.
	///
	/// A newer start for the same correlation key supersedes the older
	/// session, which is marked cancelled.
	pub async fn start(&self, flow_slug: &str, request: RequestContext) -> Result<StartedFlow> {
		let span = OpSpan::new(EngineOp::Plan, "start");

		obs::record_engine_op(EngineOp::Plan, OpOutcome::Attempt);

		let result = span.instrument(self.start_inner(flow_slug, request)).await;

		obs::record_engine_op(EngineOp::Plan, OpOutcome::from_result(&result));

		result
	}

	async fn start_inner(&self, flow_slug: &str, request: RequestContext) -> Result<StartedFlow> {
		let plan =
			PlanBuilder::new(&self.catalog, &self.registry, &self.policies).build(flow_slug, &request)?;
		let now = OffsetDateTime::now_utc();
		let id = SessionId::generate();
		let mut session = FlowExecutionSession {
			id: id.clone(),
			flow: plan.flow.clone(),
			user: request.user.clone(),
			correlation_key: request.correlation_key.clone(),
			request,
			plan,
			cursor: 0,
			state: SessionState::NotStarted,
			created_at: now,
			expires_at: now + self.session_ttl,
			history: Vec::new(),
			last_errors: None,
			redirect: None,
		};

		if let Some(denial) = session.plan.denial.clone() {
			session.state = SessionState::Denied;
			session.redirect = match session.plan.denied_action {
				DeniedAction::Continue =>
					Some(denial.to.unwrap_or_else(|| DEFAULT_INTERFACE.into())),
				DeniedAction::MessageContinue => denial.to,
				DeniedAction::Message => None,
			};
		} else {
			session.state = SessionState::Running;

			self.enter_next_stage(&mut session, 0).await?;

			if session.plan.current_index().is_none() {
				// Every resolved stage skipped itself at entry; finish directly.
				self.complete_session(&mut session).await?;
			}
		}

		if let Some(key) = session.correlation_key.clone() {
			let superseded = self.correlation.lock().insert(key, id.clone());

			if let Some(old) = superseded {
				let mut sessions = self.sessions.write();
				let superseded_running = sessions
					.get_mut(&old)
					.filter(|previous| previous.state == SessionState::Running);

				if let Some(previous) = superseded_running {
					previous.state = SessionState::Cancelled;
				}
			}
		}

		let state = session.state;

		self.sessions.write().insert(id.clone(), session);

		Ok(StartedFlow { session: id, state })
	}

	/// Serializable challenge for the session's current stage. Read-only.
	pub async fn current_challenge(&self, session: &SessionId) -> Result<Challenge> {
		let snap = self.checked_snapshot(session)?;

		match snap.state {
			SessionState::Running | SessionState::Denied =>
				if let Some(idx) = snap.plan.current_index() {
					let kind = self.kind(&snap.plan.stages[idx].component)?;
					let exec = self.execution(&snap, idx);
					let mut challenge = kind.challenge(&exec).await?;

					if let Some(errors) = snap.last_errors.clone() {
						challenge.response_errors = errors;
					}

					Ok(challenge)
				} else {
					Ok(redirect_challenge(&snap))
				},
			SessionState::Completed => Ok(redirect_challenge(&snap)),
			SessionState::Cancelled =>
				Err(SessionError::NotActive { state: SessionState::Cancelled.label() }.into()),
			SessionState::Expired => Err(SessionError::Expired.into()),
			SessionState::NotStarted =>
				Err(SessionError::NotActive { state: SessionState::NotStarted.label() }.into()),
		}
	}

	/// Processes one challenge response for the session's current stage.
	pub async fn submit(
		&self,
		session: &SessionId,
		stage: &StageId,
		input: &Value,
	) -> Result<AdvanceResult> {
		let span = OpSpan::new(EngineOp::Submit, "submit");

		obs::record_engine_op(EngineOp::Submit, OpOutcome::Attempt);

		let result = span.instrument(self.submit_inner(session, stage, input)).await;

		obs::record_engine_op(EngineOp::Submit, OpOutcome::from_result(&result));

		result
	}

	async fn submit_inner(
		&self,
		id: &SessionId,
		stage_id: &StageId,
		input: &Value,
	) -> Result<AdvanceResult> {
		let guard = self.guard(id);
		let _serialized = guard.lock().await;
		let mut snap = self.checked_snapshot(id)?;

		if snap.state != SessionState::Running {
			return Err(SessionError::NotActive { state: snap.state.label() }.into());
		}

		let idx = snap
			.plan
			.current_index()
			.ok_or(SessionError::NotActive { state: snap.state.label() })?;
		let current = &snap.plan.stages[idx];

		if current.stage != *stage_id {
			return Err(SessionError::StageMismatch {
				expected: current.stage.to_string(),
				received: stage_id.to_string(),
			}
			.into());
		}

		let kind = self.kind(&current.component)?;
		let invalid_action = current.invalid_response_action;
		let stage_key = current.stage.clone();
		let exec = self.execution(&snap, idx);
		let outcome = kind.process(&exec, input).await?;
		let staged = match outcome {
			StageOutcome::Retry { errors, patch } => {
				snap.plan.context.apply_patch(&stage_key, patch);

				match invalid_action {
					InvalidResponseAction::Retry => {
						snap.last_errors = Some(errors);

						Staged::Retry
					},
					InvalidResponseAction::Restart =>
						self.restart(&mut snap, false).await?,
					InvalidResponseAction::RestartWithContext =>
						self.restart(&mut snap, true).await?,
				}
			},
			StageOutcome::Advance { patch } => {
				snap.last_errors = None;
				snap.plan.context.apply_patch(&stage_key, patch);
				snap.plan.stages[idx].status = StageStatus::Completed;
				snap.history.push(snap.plan.clone());

				self.enter_next_stage(&mut snap, idx + 1).await?;

				if snap.plan.current_index().is_some() {
					Staged::Next
				} else {
					self.complete_session(&mut snap).await?
				}
			},
			StageOutcome::Redirect { to } => {
				snap.last_errors = None;

				deny_session(&mut snap, to)
			},
		};

		self.commit(id, &snap)?;

		match staged {
			Staged::Retry => {
				let challenge = self.challenge_for_current(&snap).await?;

				Ok(AdvanceResult::Retry { challenge })
			},
			Staged::Next => {
				let challenge = self.challenge_for_current(&snap).await?;

				Ok(AdvanceResult::Challenge { challenge })
			},
			Staged::Completed { redirect, artifact } =>
				Ok(AdvanceResult::Completed { redirect, artifact }),
			Staged::Denied { message, redirect } =>
				Ok(AdvanceResult::Denied { message, redirect }),
		}
	}

	/// Cancels a running session; cancelling a terminal session is a no-op.
	pub fn cancel(&self, session: &SessionId) -> Result<()> {
		let mut sessions = self.sessions.write();
		let live = sessions.get_mut(session).ok_or(SessionError::NotFound)?;

		if live.state == SessionState::Running {
			live.state = SessionState::Cancelled;
		}

		Ok(())
	}

	/// Moves every running session past its expiry to the expired state.
	///
	/// Intended for a periodic background sweep; accesses between sweeps are
	/// covered by the lazy check every operation performs.
	pub fn sweep_expired(&self) -> usize {
		let now = OffsetDateTime::now_utc();
		let mut sessions = self.sessions.write();
		let mut swept = 0;

		for session in sessions.values_mut() {
			if session.state == SessionState::Running && now >= session.expires_at {
				session.state = SessionState::Expired;

				swept += 1;
			}
		}

		swept
	}

	/// Copy-on-write snapshot of a session, for diagnostics and inspection.
	pub fn session_snapshot(&self, session: &SessionId) -> Option<FlowExecutionSession> {
		self.sessions.read().get(session).cloned()
	}

	async fn restart(&self, snap: &mut FlowExecutionSession, keep_context: bool) -> Result<Staged> {
		let preserved = keep_context.then(|| snap.plan.context.clone());
		let plan = PlanBuilder::new(&self.catalog, &self.registry, &self.policies)
			.build(&snap.flow, &snap.request)?;

		snap.plan = plan;
		snap.last_errors = None;
		snap.cursor = 0;

		if let Some(context) = preserved {
			snap.plan.context = context;
		}
		if let Some(denial) = snap.plan.denial.clone() {
			snap.state = SessionState::Denied;
			snap.redirect = denial.to.clone();

			return Ok(Staged::Denied { message: Some(denial.message), redirect: denial.to });
		}

		self.enter_next_stage(snap, 0).await?;

		if snap.plan.current_index().is_some() {
			Ok(Staged::Next)
		} else {
			self.complete_session(snap).await
		}
	}

	async fn complete_session(&self, snap: &mut FlowExecutionSession) -> Result<Staged> {
		let mut redirect = snap
			.plan
			.context
			.get_str(CONTEXT_REDIRECT)
			.map(str::to_owned)
			.or_else(|| snap.request.next.clone());
		let mut artifact = None;
		let terminal = if snap.plan.designation.issues_provider_artifacts() {
			snap.plan.provider_terminal()
		} else {
			None
		};

		if let Some((provider, authorization)) = terminal {
			let subject =
				completion_subject(snap).ok_or_else(|| ProviderError::InvalidGrant {
					reason: "Flow completed without an identified subject".into(),
				})?;
			let issued = self.tokens.finalize_flow(provider, authorization, &subject).await?;

			if let IssuedArtifact::AuthorizationCode(code) = &issued {
				redirect = Some(code.redirect.to_string());
			}

			artifact = Some(issued);
		}

		snap.state = SessionState::Completed;
		snap.redirect = redirect.clone();

		Ok(Staged::Completed { redirect, artifact })
	}

	async fn enter_next_stage(&self, snap: &mut FlowExecutionSession, from: usize) -> Result<()> {
		let mut idx = from;

		while idx < snap.plan.stages.len() {
			if snap.plan.stages[idx].status != StageStatus::Pending {
				idx += 1;

				continue;
			}
			if let StageMarker::Reevaluate { bindings, mode } = &snap.plan.stages[idx].marker {
				let decision =
					self.policies.evaluate(bindings, &snap.request, &snap.plan.context, *mode);

				if !decision.passing {
					snap.plan.stages[idx].status = StageStatus::Skipped;
					idx += 1;

					continue;
				}
			}

			snap.plan.stages[idx].status = StageStatus::Current;
			snap.cursor = idx;

			let kind = self.kind(&snap.plan.stages[idx].component)?;
			let exec = self.execution(snap, idx);
			let patch = kind.prepare(&exec).await?;
			let stage_key = snap.plan.stages[idx].stage.clone();

			snap.plan.context.apply_patch(&stage_key, patch);

			return Ok(());
		}

		snap.cursor = snap.plan.stages.len();

		Ok(())
	}

	async fn challenge_for_current(&self, snap: &FlowExecutionSession) -> Result<Challenge> {
		let idx = snap
			.plan
			.current_index()
			.ok_or(SessionError::NotActive { state: snap.state.label() })?;
		let kind = self.kind(&snap.plan.stages[idx].component)?;
		let exec = self.execution(snap, idx);
		let mut challenge = kind.challenge(&exec).await?;

		if let Some(errors) = snap.last_errors.clone() {
			challenge.response_errors = errors;
		}

		Ok(challenge)
	}

	fn commit(&self, id: &SessionId, snap: &FlowExecutionSession) -> Result<()> {
		let mut sessions = self.sessions.write();
		let live = sessions.get_mut(id).ok_or(SessionError::NotFound)?;

		match live.state {
			SessionState::Running => {
				*live = snap.clone();

				Ok(())
			},
			// Cancelled (or expired) while the stage call was in flight: the
			// result is discarded, never applied.
			SessionState::Expired => Err(SessionError::Expired.into()),
			state => Err(SessionError::NotActive { state: state.label() }.into()),
		}
	}

	fn checked_snapshot(&self, id: &SessionId) -> Result<FlowExecutionSession> {
		let now = OffsetDateTime::now_utc();
		let mut sessions = self.sessions.write();
		let live = sessions.get_mut(id).ok_or(SessionError::NotFound)?;

		if live.state == SessionState::Running && now >= live.expires_at {
			live.state = SessionState::Expired;
		}
		if live.state == SessionState::Expired {
			return Err(SessionError::Expired.into());
		}

		Ok(live.clone())
	}

	fn guard(&self, id: &SessionId) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	fn kind(&self, component: &str) -> Result<Arc<dyn StageKind>> {
		self.registry
			.resolve(component)
			.ok_or_else(|| ConfigError::UnknownStageKind { component: component.into() }.into())
	}

	fn execution(&self, snap: &FlowExecutionSession, idx: usize) -> StageExecution {
		let stage = &snap.plan.stages[idx];

		StageExecution {
			stage: stage.stage.clone(),
			config: stage.config.clone(),
			request: snap.request.clone(),
			context: snap.plan.context.clone(),
			flow_info: snap.plan.flow_info(),
			services: self.services.clone(),
		}
	}
}
impl Debug for FlowExecutor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FlowExecutor")
			.field("sessions", &self.sessions.read().len())
			.field("session_ttl", &self.session_ttl)
			.finish()
	}
}

fn completion_subject(snap: &FlowExecutionSession) -> Option<UserRef> {
	snap.plan
		.context
		.get_str(CONTEXT_PENDING_USER)
		.and_then(|raw| UserRef::new(raw).ok())
		.or_else(|| snap.request.user.clone())
}

fn deny_session(snap: &mut FlowExecutionSession, to: Option<String>) -> Staged {
	match snap.plan.denied_action {
		DeniedAction::Continue => {
			let redirect = to
				.or_else(|| snap.request.next.clone())
				.unwrap_or_else(|| DEFAULT_INTERFACE.into());

			snap.state = SessionState::Completed;
			snap.redirect = Some(redirect.clone());

			Staged::Completed { redirect: Some(redirect), artifact: None }
		},
		DeniedAction::MessageContinue => {
			let redirect = to.or_else(|| snap.request.next.clone());

			snap.state = SessionState::Denied;
			snap.redirect = redirect.clone();

			Staged::Denied { message: Some(DENIAL_MESSAGE.into()), redirect }
		},
		DeniedAction::Message => {
			snap.state = SessionState::Denied;
			snap.redirect = None;

			Staged::Denied { message: Some(DENIAL_MESSAGE.into()), redirect: None }
		},
	}
}

fn redirect_challenge(snap: &FlowExecutionSession) -> Challenge {
	let to = snap.redirect.clone().unwrap_or_else(|| DEFAULT_INTERFACE.into());

	Challenge::new(COMPONENT_REDIRECT, snap.plan.flow_info()).with_payload(json!({ "to": to }))
}
