pub mod context;
pub mod error;
pub mod registry;
pub mod resources;
pub mod result;
pub mod schema;
pub mod server;
pub mod tools;

pub use context::ToolContext;
pub use registry::{handler, ToolRegistry, ToolResult};
pub use result::{ContentBlock, ScratchFile, ToolOutput};
pub use schema::{decode, DecodedArgs, OperationDescriptor, ParamKind, ParamSpec};
pub use server::{run_mcp_server, BridgeServer};
