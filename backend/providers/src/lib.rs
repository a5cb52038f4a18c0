//! Provider normalization and fallback selection for interchangeable
//! capability providers.

pub mod alias;
pub mod fallback;

pub use alias::ProviderAliasTable;
pub use fallback::{FallbackChain, FallbackOrchestrator};
