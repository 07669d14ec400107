use crate::{
    abi::{
        self,
        Kind,
    },
    rpc::{
        RpcClient,
        RpcError,
    },
};
use primitive_types::U256;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time;
use tracing::{
    debug,
    info,
};
use vault_sync::{
    Address,
    Amount,
    LedgerReader,
    LedgerWriter,
    Receipt,
    RemoteError,
    Token,
    TxHash,
    WriteCall,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct LedgerRpcConfig {
    pub rpc_url: String,
    pub contract: Address,
    /// Node-managed account writes are sent from; reads work without one.
    pub account: Option<Address>,
    pub poll_interval: Duration,
    /// Applies to every HTTP request, including each receipt poll.
    pub request_timeout: Duration,
}

/// The vault contract reached through a node's JSON-RPC endpoint.
///
/// Writes go through `eth_sendTransaction`, so the node signs for `account`.
#[derive(Debug)]
pub struct JsonRpcLedger {
    rpc: RpcClient,
    contract: Address,
    account: Option<Address>,
    poll_interval: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    status: Option<String>,
}

impl JsonRpcLedger {
    pub fn new(config: LedgerRpcConfig) -> anyhow::Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(config.rpc_url, config.request_timeout)?,
            contract: config.contract,
            account: config.account,
            poll_interval: config.poll_interval,
        })
    }

    pub fn contract(&self) -> &Address {
        &self.contract
    }

    async fn eth_call(&self, data: Vec<u8>) -> Result<Vec<u8>, RemoteError> {
        let params = json!([
            {
                "to": self.contract.to_string(),
                "data": hex_data(&data),
            },
            "latest",
        ]);
        let result: String = self.rpc.call("eth_call", params).await?;
        Ok(parse_hex_data(&result)?)
    }

    async fn view(
        &self,
        signature: &str,
        args: &[[u8; abi::WORD]],
        outputs: &[Kind],
    ) -> Result<Vec<Token>, RemoteError> {
        let data = self.eth_call(abi::encode_call(signature, args)).await?;
        Ok(abi::decode_outputs(&data, outputs)?)
    }
}

impl LedgerReader for JsonRpcLedger {
    async fn get_user_stats(&self, account: &Address) -> Result<Vec<Token>, RemoteError> {
        self.view(
            abi::GET_USER_STATS,
            &[abi::address_word(account)],
            abi::USER_STATS_OUTPUTS,
        )
        .await
    }

    async fn get_protocol_stats(&self) -> Result<Vec<Token>, RemoteError> {
        self.view(abi::GET_PROTOCOL_STATS, &[], abi::PROTOCOL_STATS_OUTPUTS)
            .await
    }

    async fn get_current_round(&self) -> Result<Vec<Token>, RemoteError> {
        self.view(abi::GET_CURRENT_ROUND, &[], abi::CURRENT_ROUND_OUTPUTS)
            .await
    }

    async fn get_leaderboard(&self) -> Result<Vec<Token>, RemoteError> {
        let data = self
            .eth_call(abi::encode_call(abi::GET_LEADERBOARD, &[]))
            .await?;
        Ok(abi::decode_leaderboard(&data)?)
    }

    async fn get_balance(&self, account: &Address) -> Result<Amount, RemoteError> {
        let result: String = self
            .rpc
            .call("eth_getBalance", json!([account.to_string(), "latest"]))
            .await?;
        Ok(Amount::from_raw(parse_quantity(&result)?))
    }
}

impl LedgerWriter for JsonRpcLedger {
    fn session(&self) -> Option<Address> {
        self.account
    }

    async fn submit(&self, call: WriteCall) -> Result<TxHash, RemoteError> {
        let from = self
            .account
            .ok_or_else(|| RemoteError::new("No account configured for signing"))?;
        let data = abi::encode_write(&call)?;
        let mut tx = json!({
            "from": from.to_string(),
            "to": self.contract.to_string(),
            "data": hex_data(&data),
        });
        if let Some(value) = call.value() {
            tx["value"] = json!(format!("{:#x}", value.raw()));
        }
        let hash: String = self.rpc.call("eth_sendTransaction", json!([tx])).await?;
        let tx_hash = hash
            .parse::<TxHash>()
            .map_err(|err| RpcError::Malformed(err.to_string()))?;
        info!(function = call.function_name(), tx = %tx_hash, "transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<Receipt, RemoteError> {
        let mut ticker = time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            let receipt: Option<RpcReceipt> = self
                .rpc
                .call("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
                .await?;
            let Some(receipt) = receipt else {
                debug!(tx = %tx_hash, "receipt not available yet");
                continue;
            };
            let Some(block) = receipt.block_number.as_deref() else {
                continue;
            };
            return settle(receipt.transaction_hash.as_str(), block, receipt.status.as_deref());
        }
    }
}

fn settle(hash: &str, block: &str, status: Option<&str>) -> Result<Receipt, RemoteError> {
    if status.is_some_and(|status| parse_quantity(status).is_ok_and(|s| s.is_zero())) {
        return Err(RemoteError::new(format!("Transaction {hash} reverted")));
    }
    let tx_hash = hash
        .parse::<TxHash>()
        .map_err(|err| RpcError::Malformed(err.to_string()))?;
    let block_number = parse_quantity(block)?;
    if block_number.bits() > 64 {
        return Err(RpcError::Malformed(format!("block number {block}")).into());
    }
    Ok(Receipt {
        tx_hash,
        block_number: block_number.low_u64(),
    })
}

fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn parse_hex_data(value: &str) -> Result<Vec<u8>, RpcError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|err| RpcError::Malformed(format!("{value}: {err}")))
}

fn parse_quantity(value: &str) -> Result<U256, RpcError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Err(RpcError::Malformed(format!("empty quantity {value:?}")));
    }
    U256::from_str_radix(digits, 16)
        .map_err(|_| RpcError::Malformed(format!("invalid quantity {value:?}")))
}
