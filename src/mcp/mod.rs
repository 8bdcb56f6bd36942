pub mod protocol;
pub mod server;
pub mod stdio;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use server::{handle_request, parse_message};
