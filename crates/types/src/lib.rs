//! Core type definitions for the marketplace auction engine.
//!
//! This crate provides the records shared between the engine, its store and
//! the host: addresses, auctions, bids, bidder metadata and module params.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

// =========================
// ADDRESSES
// =========================

/// Generic account address (32 bytes)
pub type Address = [u8; 32];

/// Parse a hex address, with or without a `0x` prefix.
pub fn parse_address(s: &str) -> Result<Address, hex::FromHexError> {
    let mut addr = [0u8; 32];
    hex::decode_to_slice(s.trim_start_matches("0x"), &mut addr)?;
    Ok(addr)
}

/// Hex representation of an address, `0x`-prefixed.
pub fn format_address(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr))
}

/// Deterministic address for a module-owned account.
///
/// Hosts that want a conventional escrow identity derive it from the module
/// name; the engine itself only ever sees the address it is configured with.
pub fn module_address(name: &str) -> Address {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"module/");
    hasher.update(name.as_bytes());
    hasher.finalize().into()
}

/// Fungible amount in a single denomination.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

// =========================
// AUCTION TYPES
// =========================

/// What the winner receives at settlement.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum PrizeType {
    /// Only ownership of the asset moves
    AssetOnlyTransfer,
    /// Ownership plus the metadata update authority
    FullRightsTransfer,
}

/// Auction lifecycle state
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum AuctionState {
    /// Asset escrowed, not yet accepting bids
    Created,
    /// Accepting bids until `end_auction_at`
    Started,
    /// Settled, terminal
    Ended,
}

/// A time-boxed sale of a single asset.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Auction {
    pub id: u64,
    #[serde_as(as = "Hex")]
    pub authority: Address,
    pub asset_id: u64,
    pub prize_type: PrizeType,

    // Rules
    pub duration: u64,
    pub bid_denom: String,
    pub price_floor: u64,
    /// Zero disables instant sale
    pub instant_sale_price: u64,
    pub tick_size: u64,

    pub state: AuctionState,

    // Bidding
    pub last_bid_amount: u64,
    pub last_bid_time: Option<u64>,

    // Timing
    pub ended_at: Option<u64>,
    pub end_auction_at: Option<u64>,

    /// Set to 1 once the winner payout ran
    pub claimed: u64,
}

impl Auction {
    pub fn has_bid(&self) -> bool {
        self.last_bid_amount > 0
    }

    /// Whether a bid placed at `now` falls inside the bidding window.
    pub fn accepts_bids_at(&self, now: u64) -> bool {
        self.state == AuctionState::Started
            && self.end_auction_at.map_or(false, |end| now <= end)
    }

    pub fn instant_sale_enabled(&self) -> bool {
        self.instant_sale_price > 0
    }
}

/// The current highest bid on an auction.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Bid {
    pub auction_id: u64,
    #[serde_as(as = "Hex")]
    pub bidder: Address,
    pub amount: u64,
    pub denom: String,
    pub timestamp: u64,
}

/// Last bidding activity of an account, across all auctions.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BidderMetadata {
    #[serde_as(as = "Hex")]
    pub bidder: Address,
    pub last_auction_id: u64,
    pub last_bid: u64,
    pub last_bid_timestamp: u64,
}

/// Module parameters
#[derive(
    Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Params {
    /// Charged to the seller on creation; zero amount disables it
    pub auction_creation_fee: Coin,
    /// Share of winning proceeds kept by the marketplace, in basis points
    pub marketplace_cut_bps: u32,
}

/// Basis point denominator for `Params::marketplace_cut_bps`.
pub const BPS_DENOMINATOR: u32 = 10_000;
