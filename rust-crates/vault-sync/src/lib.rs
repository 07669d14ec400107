//! Client-side read model and write pipeline for the savings vault contract.

pub mod address;

pub mod amount;

pub mod executor;

pub mod ledger;

pub mod model;

pub mod referral;

pub mod service;

pub mod shutdown;

pub mod store;

pub mod sync;

pub mod views;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use address::{
    Address,
    TxHash,
};
pub use amount::Amount;
pub use executor::{
    ExecutorConfig,
    TransactionExecutor,
    WriteError,
    WriteReport,
};
pub use ledger::{
    LedgerReader,
    LedgerWriter,
    Receipt,
    RemoteError,
    Token,
    WriteCall,
};
pub use service::{
    SyncConfig,
    SyncService,
};
pub use shutdown::{
    Shutdown,
    ShutdownTrigger,
    shutdown_channel,
};
pub use store::{
    Store,
    StoreSnapshot,
};
pub use sync::ReadSynchronizer;
