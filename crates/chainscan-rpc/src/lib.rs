//! chainscan-rpc — the chain side of the block scanner.
//!
//! - [`RpcTransport`] — async JSON-RPC transport trait
//! - [`HttpTransport`] — `reqwest` transport with bounded retry
//! - [`EvmHeaderSource`] — `eth_blockNumber` / `eth_getBlockByNumber` as a
//!   [`HeaderSource`](chainscan_core::HeaderSource)

pub mod error;
pub mod evm;
pub mod http;
pub mod request;
pub mod retry;
pub mod transport;

pub use error::TransportError;
pub use evm::EvmHeaderSource;
pub use http::{HttpClientConfig, HttpTransport};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry::{RetryConfig, RetryPolicy};
pub use transport::RpcTransport;
