//! Open registry mapping component strings to stage implementations.

// self
use crate::{
	_prelude::*,
	stage::{
		AuthenticatorSmsStage, DenyStage, IdentificationStage, PasswordStage, PromptStage,
		RedirectStage, StageKind, UserLoginStage,
	},
};

/// Registry of stage kinds keyed by their component discriminator.
///
/// Kinds are registered at startup; resolution happens at plan-build time so
/// a definition referencing an unknown component fails the build, not the
/// submit path.
#[derive(Clone, Default)]
pub struct StageRegistry {
	kinds: HashMap<&'static str, Arc<dyn StageKind>>,
}
impl StageRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a registry with every built-in stage kind registered.
	pub fn with_builtins() -> Self {
		let mut registry = Self::new();

		registry.register(Arc::new(IdentificationStage));
		registry.register(Arc::new(PasswordStage));
		registry.register(Arc::new(PromptStage));
		registry.register(Arc::new(AuthenticatorSmsStage));
		registry.register(Arc::new(UserLoginStage));
		registry.register(Arc::new(DenyStage));
		registry.register(Arc::new(RedirectStage));

		registry
	}

	/// Registers a stage kind under its component discriminator.
	pub fn register(&mut self, kind: Arc<dyn StageKind>) {
		self.kinds.insert(kind.component(), kind);
	}

	/// Resolves a component discriminator to its implementation.
	pub fn resolve(&self, component: &str) -> Option<Arc<dyn StageKind>> {
		self.kinds.get(component).cloned()
	}

	/// Registered component discriminators, sorted.
	pub fn components(&self) -> Vec<&'static str> {
		let mut components: Vec<&'static str> = self.kinds.keys().copied().collect();

		components.sort_unstable();

		components
	}
}
impl Debug for StageRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StageRegistry").field("components", &self.components()).finish()
	}
}
