// Strongbox — Gateway Module
//
// Unix Domain Socket (UDS) server exposing the vault to local clients.
// Provides JSON-RPC 2.0 over Unix sockets.

mod protocol;
mod uds;

pub use protocol::{error_code, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use uds::UdsServer;
