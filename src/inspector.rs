//! Read-only diagnostic projections over executor sessions.
//!
//! The inspection shape mirrors what admin consoles render: the current plan,
//! one historical plan per passed stage, and a completion flag. Secrets are
//! redacted before serialization and stage configuration snapshots are never
//! emitted, so only identifiers leave the engine.

// std
use std::collections::BTreeMap;
// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::SessionError,
	executor::{FlowExecutor, FlowExecutionSession, SessionState},
	id::{SessionId, StageId},
	plan::{Plan, StageStatus},
};

const REDACTED: &str = "<redacted>";
const SENSITIVE_KEY_MARKERS: [&str; 4] = ["password", "token", "secret", "code"];

/// Diagnostic projection of one execution session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowInspection {
	/// Plan the session is currently executing; absent once terminal.
	pub current_plan: Option<InspectionPlan>,
	/// One snapshot per passed stage, oldest first.
	pub plans: Vec<InspectionPlan>,
	/// Whether the session completed successfully.
	pub is_completed: bool,
}

/// Projection of one plan snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InspectionPlan {
	/// Session the plan belongs to.
	pub session_id: SessionId,
	/// Stage the cursor points at.
	pub current_stage: Option<InspectionStage>,
	/// Next stage that would run after the current one.
	pub next_planned_stage: Option<InspectionStage>,
	/// Plan context with sensitive values redacted.
	pub plan_context: BTreeMap<String, Value>,
}

/// Projection of one resolved stage; configuration is stripped entirely.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InspectionStage {
	/// Stage instance identifier.
	pub stage: StageId,
	/// Component discriminator.
	pub component: String,
	/// Runtime status.
	pub status: StageStatus,
}

impl FlowExecutor {
	/// Builds the read-only inspection for a session. Never mutates.
	pub fn inspect(&self, session: &SessionId) -> Result<FlowInspection> {
		let snap = self.session_snapshot(session).ok_or(SessionError::NotFound)?;
		let plans = snap.history.iter().map(|plan| project_plan(&snap, plan)).collect();
		let current_plan = match snap.state {
			SessionState::Running | SessionState::Denied =>
				Some(project_plan(&snap, &snap.plan)),
			_ => None,
		};

		Ok(FlowInspection {
			current_plan,
			plans,
			is_completed: snap.state == SessionState::Completed,
		})
	}
}

fn project_plan(snap: &FlowExecutionSession, plan: &Plan) -> InspectionPlan {
	let current_idx = plan.current_index();
	let current_stage = current_idx.map(|idx| project_stage(plan, idx));
	let next_planned_stage = plan
		.stages
		.iter()
		.enumerate()
		.skip(current_idx.map_or(0, |idx| idx + 1))
		.find(|(_, stage)| stage.status == StageStatus::Pending)
		.map(|(idx, _)| project_stage(plan, idx));
	let plan_context = plan
		.context
		.values()
		.iter()
		.map(|(key, value)| {
			if is_sensitive(key) {
				(key.clone(), Value::String(REDACTED.into()))
			} else {
				(key.clone(), value.clone())
			}
		})
		.collect();

	InspectionPlan {
		session_id: snap.id.clone(),
		current_stage,
		next_planned_stage,
		plan_context,
	}
}

fn project_stage(plan: &Plan, idx: usize) -> InspectionStage {
	let stage = &plan.stages[idx];

	InspectionStage {
		stage: stage.stage.clone(),
		component: stage.component.clone(),
		status: stage.status,
	}
}

fn is_sensitive(key: &str) -> bool {
	let lowered = key.to_ascii_lowercase();

	SENSITIVE_KEY_MARKERS.iter().any(|marker| lowered.contains(marker))
}
