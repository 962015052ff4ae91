//! Provider token engine: artifact models, protocol configs, and issuance.
//!
//! `oauth2` and `saml` hold the per-protocol provider configurations, `engine`
//! drives issuance/redemption against an [`ArtifactStore`], and `setup`
//! derives the endpoint URL set that admin consoles introspect per provider
//! instance.
//!
//! [`ArtifactStore`]: crate::store::ArtifactStore

pub mod artifact;
pub mod engine;
pub mod oauth2;
pub mod saml;
pub mod scope;
pub mod secret;
pub mod setup;
pub mod signing;
pub mod validity;

pub use artifact::*;
pub use engine::*;
pub use oauth2::*;
pub use saml::*;
pub use scope::*;
pub use secret::*;
pub use setup::*;
pub use signing::*;
pub use validity::*;
