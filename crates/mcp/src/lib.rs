// Model Context Protocol server core: the JSON-RPC 2.0 envelope, the MCP
// vocabulary, and the dispatch machinery feature modules register into.

pub mod messages;
pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod session;
pub mod tools;

pub use prompts::PromptProvider;
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, ResponsePayload};
pub use resources::ResourceProvider;
pub use server::{method_fn, McpServer, MethodHandler, NotificationSender, RequestContext};
pub use session::{CapabilitySession, SessionState};
pub use tools::{ToolHandler, ToolRegistry};
