//! JSON input and output types for the mock chain.
//!
//! Addresses are hex strings here and parsed when the chain is built.

use marketplace_module::{CallResponse, GenesisState, MarketplaceCall};
use serde::{Deserialize, Serialize};

/// Chain genesis: the marketplace snapshot plus the assets and balances the
/// other modules would hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainGenesis {
    #[serde(default)]
    pub initial_timestamp: u64,
    #[serde(default)]
    pub marketplace: GenesisState,
    #[serde(default)]
    pub assets: Vec<AssetRpc>,
    #[serde(default)]
    pub balances: Vec<BalanceRpc>,
}

/// An asset and its metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRpc {
    pub id: u64,
    pub owner: String,
    pub metadata_id: u64,
    pub update_authority: String,
}

/// A seeded account balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceRpc {
    pub address: String,
    pub denom: String,
    pub amount: u64,
}

/// A transaction to apply. Without a timestamp the chain advances one block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxRpc {
    pub sender: String,
    #[serde(default)]
    pub timestamp: Option<u64>,
    pub call: MarketplaceCall,
}

/// Block info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
}

/// Outcome of one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub index: usize,
    pub block: BlockInfo,
    pub call: String,
    pub response: Option<CallResponse>,
    pub error: Option<String>,
}

/// State written by `--export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainExport {
    pub block: BlockInfo,
    pub marketplace: GenesisState,
    pub balances: Vec<BalanceRpc>,
}
