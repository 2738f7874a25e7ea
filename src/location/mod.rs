//! Multi-source location resolution.
//!
//! Queries every registered provider, tolerates any subset failing, and
//! packages the successes into a primary candidate plus alternatives.

pub mod providers;
pub mod registry;
pub mod resolver;
pub mod types;

pub use providers::LocationProvider;
pub use registry::{ProviderKind, ProviderRegistry, ProviderSpec};
pub use resolver::{aggregate, LocationResolver, ProviderOutcome};
pub use types::{LocationCandidate, LocationReport, LocationResolution, ProviderError};
