//! JSON-RPC adapter between the vault client and an EVM node.

pub mod abi;

mod ledger;

mod rpc;

pub use ledger::{
    DEFAULT_POLL_INTERVAL,
    DEFAULT_REQUEST_TIMEOUT,
    JsonRpcLedger,
    LedgerRpcConfig,
};
pub use rpc::{
    RpcClient,
    RpcError,
};
