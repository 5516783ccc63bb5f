//! Marketplace module: time-boxed auctions of non-fungible assets.
//!
//! This module implements the on-chain auction engine:
//!
//! - Auction creation with asset escrow and an optional creation fee
//! - Start, authority reassignment and end of an auction by its authority
//! - Competitive bidding with price floor, tick size and instant sale
//! - Deterministic settlement of the prize, proceeds and marketplace cut
//!
//! # Architecture
//!
//! - `call`: Message types for state-changing operations
//! - `handlers`: Business logic for processing calls
//! - `queries`: Read-only state access
//! - `state`: Typed store, engine config and the state bundle handlers act on
//! - `store` / `keys`: Key-value store interface and key layout
//! - `expected`: Interfaces of the asset registry and balance ledger
//! - `memory`: In-memory collaborators for tests and local chains
//! - `genesis`: Snapshot import/export
//! - `error`: Error types
//!
//! # Example
//!
//! ```ignore
//! use marketplace_module::{execute_call, CallContext, EngineConfig, InMemoryState, MarketplaceCall};
//!
//! let mut state = InMemoryState::in_memory(EngineConfig::derived());
//! let ctx = CallContext { sender, block_height: 1, timestamp: 1_700_000_000 };
//!
//! // Create an auction
//! execute_call(&mut state, &ctx, MarketplaceCall::CreateAuction { ... })?;
//! ```

pub mod call;
pub mod error;
pub mod expected;
pub mod genesis;
pub mod handlers;
pub mod keys;
pub mod memory;
pub mod queries;
pub mod state;
pub mod store;

pub use call::{CallResponse, MarketplaceCall};
pub use error::{ErrorKind, MarketplaceError};
pub use expected::{Asset, AssetRegistry, BalanceLedger, Metadata};
pub use genesis::{export_genesis, init_genesis, GenesisState, GenesisValidationError};
pub use handlers::{execute_call, CallContext, HandlerResult};
pub use memory::{InMemoryAssets, InMemoryLedger};
pub use queries::{handle_query, MarketplaceQuery, MarketplaceQueryResponse};
pub use state::{AuctionStore, EngineConfig, InMemoryState, MarketplaceState};
pub use store::{KvStore, MemoryStore};
