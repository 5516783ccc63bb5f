//! Mock chain for local testing of the marketplace module.
//!
//! Loads a genesis file, applies a list of transactions block by block
//! through the module's atomic executor, prints one receipt per transaction
//! and optionally exports the resulting state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use marketplace_module::queries::get_pending_end;
use marketplace_module::{
    execute_call, export_genesis, init_genesis, Asset, BalanceLedger, CallContext, EngineConfig,
    InMemoryState, Metadata,
};
use marketplace_types::{format_address, module_address, parse_address, Address};

mod types;
use types::*;

#[derive(Parser)]
#[command(name = "mock-chain")]
#[command(about = "Apply marketplace transactions against a local in-memory chain")]
struct Cli {
    /// Genesis JSON (marketplace snapshot, assets, balances)
    #[arg(long)]
    genesis: PathBuf,

    /// Transactions JSON (array of {sender, timestamp?, call})
    #[arg(long)]
    txs: PathBuf,

    /// Write the final state here
    #[arg(long)]
    export: Option<PathBuf>,

    /// Seconds added per block when a transaction has no timestamp
    #[arg(long, default_value = "12")]
    block_time: u64,

    /// Module name the escrow account is derived from
    #[arg(long, default_value = "marketplace")]
    module_name: String,

    /// Governance account allowed to update params (hex)
    #[arg(long)]
    governance: Option<String>,
}

/// Simulated chain state.
struct ChainState {
    /// Module state
    module: InMemoryState,
    /// Current block height (simulated)
    block_height: u64,
    /// Current timestamp (simulated, can be advanced)
    timestamp: u64,
}

impl ChainState {
    fn from_genesis(genesis: &ChainGenesis, config: EngineConfig) -> Result<Self> {
        let mut module = InMemoryState::in_memory(config);

        for asset in &genesis.assets {
            module.assets.set_asset(Asset {
                id: asset.id,
                owner: parse(&asset.owner)?,
                metadata_id: asset.metadata_id,
            });
            module.assets.set_metadata(Metadata {
                id: asset.metadata_id,
                update_authority: parse(&asset.update_authority)?,
            });
        }
        for balance in &genesis.balances {
            module
                .ledger
                .mint(&parse(&balance.address)?, &balance.denom, balance.amount)?;
        }
        init_genesis(&mut module.store, &genesis.marketplace)?;

        Ok(Self {
            module,
            block_height: 0,
            timestamp: genesis.initial_timestamp,
        })
    }

    fn advance_block(&mut self, block_time: u64) -> Result<()> {
        let Some(timestamp) = self.timestamp.checked_add(block_time) else {
            bail!("timestamp overflow advancing {block_time}s from {}", self.timestamp);
        };
        self.next_height()?;
        self.timestamp = timestamp;
        Ok(())
    }

    /// Move the clock to `ts`. The clock never runs backward.
    fn set_timestamp(&mut self, ts: u64) -> Result<()> {
        if ts < self.timestamp {
            bail!("timestamp {ts} is before current block time {}", self.timestamp);
        }
        self.next_height()?;
        self.timestamp = ts;
        Ok(())
    }

    fn next_height(&mut self) -> Result<()> {
        self.block_height = self
            .block_height
            .checked_add(1)
            .context("block height overflow")?;
        Ok(())
    }

    /// Auctions past their deadline that nobody has ended yet.
    fn pending_end(&self) -> Result<Vec<u64>> {
        Ok(get_pending_end(&self.module.store, self.timestamp)?)
    }

    fn block_info(&self) -> BlockInfo {
        BlockInfo {
            height: self.block_height,
            timestamp: self.timestamp,
        }
    }

    fn apply(&mut self, index: usize, tx: TxRpc, block_time: u64) -> Result<TxReceipt> {
        let clock = match tx.timestamp {
            Some(ts) => self.set_timestamp(ts),
            None => self.advance_block(block_time),
        };
        clock.with_context(|| format!("tx {index}"))?;

        let ctx = CallContext {
            sender: parse(&tx.sender)?,
            block_height: self.block_height,
            timestamp: self.timestamp,
        };
        let name = tx.call.name().to_string();

        let receipt = match execute_call(&mut self.module, &ctx, tx.call) {
            Ok(response) => {
                info!(index, call = %name, ?response, "tx applied");
                TxReceipt {
                    index,
                    block: self.block_info(),
                    call: name,
                    response: Some(response),
                    error: None,
                }
            }
            Err(err) => {
                warn!(index, call = %name, kind = ?err.kind(), error = %err, "tx failed");
                TxReceipt {
                    index,
                    block: self.block_info(),
                    call: name,
                    response: None,
                    error: Some(err.to_string()),
                }
            }
        };
        Ok(receipt)
    }

    fn export(&self) -> Result<ChainExport> {
        let balances = self
            .module
            .ledger
            .balances()
            .map(|(address, denom, amount)| BalanceRpc {
                address: format_address(address),
                denom: denom.to_string(),
                amount,
            })
            .collect();
        Ok(ChainExport {
            block: self.block_info(),
            marketplace: export_genesis(&self.module.store)?,
            balances,
        })
    }
}

fn parse(address: &str) -> Result<Address> {
    parse_address(address).with_context(|| format!("invalid address {address:?}"))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mock_chain=info".parse()?)
                .add_directive("marketplace_module=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::derived();
    config.module_account = module_address(&cli.module_name);
    if let Some(governance) = &cli.governance {
        config.governance = parse(governance)?;
    }
    info!(
        module_account = %format_address(&config.module_account),
        fee_collector = %format_address(&config.fee_collector),
        "engine accounts"
    );

    let genesis: ChainGenesis = read_json(&cli.genesis)?;
    let txs: Vec<TxRpc> = read_json(&cli.txs)?;

    let mut chain = ChainState::from_genesis(&genesis, config)?;
    info!(
        auctions = genesis.marketplace.auctions.len(),
        assets = genesis.assets.len(),
        "chain initialized"
    );

    let mut receipts = Vec::with_capacity(txs.len());
    for (index, tx) in txs.into_iter().enumerate() {
        receipts.push(chain.apply(index, tx, cli.block_time)?);
    }
    println!("{}", serde_json::to_string_pretty(&receipts)?);

    let pending = chain.pending_end()?;
    if !pending.is_empty() {
        warn!(auctions = ?pending, "auctions past their deadline still open");
    }

    if let Some(path) = &cli.export {
        let export = chain.export()?;
        fs::write(path, serde_json::to_string_pretty(&export)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "state exported");
    }

    Ok(())
}
