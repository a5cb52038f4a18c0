pub mod error;
pub mod messages;
pub mod tools;
pub mod traits;
pub mod types;

pub use error::ToolcastError;
pub use messages::{user_message, UserMessage};
pub use tools::{validate_args, ToolRegistry};
pub use traits::{ChatTransport, Component, Tool};
pub use types::{
    MediaKind, MediaRef, MediaUrls, OutboundMessage, ParamKind, ParamSpec, ProviderKey,
    ToolContext, ToolDeclaration, ToolInvocation, ToolResult,
};
