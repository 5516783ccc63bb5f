//! Genesis import and export for the marketplace module.
//!
//! A genesis snapshot carries params, every auction, the highest bid per
//! auction and bidder metadata. Import validates the whole snapshot first and
//! rejects it on any inconsistency; nothing is repaired.

use std::collections::BTreeSet;

use marketplace_types::{format_address, Auction, AuctionState, Bid, BidderMetadata, Params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::MarketplaceError;
use crate::handlers::{validate_auction_rules, validate_params};
use crate::state::AuctionStore;
use crate::store::KvStore;

/// Genesis state of the marketplace module.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: Params,

    /// Highest id ever assigned; keeps deleted ids from being reused
    #[serde(default)]
    pub last_auction_id: u64,

    pub auctions: Vec<Auction>,

    #[serde(default)]
    pub bids: Vec<Bid>,

    #[serde(default)]
    pub bidder_metadata: Vec<BidderMetadata>,
}

impl GenesisState {
    /// Validate the snapshot.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        validate_params(&self.params)
            .map_err(|e| GenesisValidationError::InvalidParams(e.to_string()))?;

        let mut auction_ids = BTreeSet::new();
        for auction in &self.auctions {
            validate_auction(auction)?;
            if !auction_ids.insert(auction.id) {
                return Err(GenesisValidationError::DuplicateAuction(auction.id));
            }
            if auction.id > self.last_auction_id {
                return Err(GenesisValidationError::InvalidAuction {
                    id: auction.id,
                    reason: format!("id exceeds last auction id {}", self.last_auction_id),
                });
            }
        }

        let mut bid_ids = BTreeSet::new();
        for bid in &self.bids {
            let auction = self
                .auctions
                .iter()
                .find(|a| a.id == bid.auction_id)
                .ok_or_else(|| GenesisValidationError::InvalidBid {
                    auction_id: bid.auction_id,
                    reason: "auction does not exist".into(),
                })?;
            if !auction.has_bid() {
                return Err(GenesisValidationError::InvalidBid {
                    auction_id: bid.auction_id,
                    reason: "auction has no recorded bid amount".into(),
                });
            }
            if !bid_ids.insert(bid.auction_id) {
                return Err(GenesisValidationError::InvalidBid {
                    auction_id: bid.auction_id,
                    reason: "more than one bid recorded".into(),
                });
            }
            if bid.amount != auction.last_bid_amount {
                return Err(GenesisValidationError::InvalidBid {
                    auction_id: bid.auction_id,
                    reason: "amount differs from last bid amount".into(),
                });
            }
            if bid.denom != auction.bid_denom {
                return Err(GenesisValidationError::InvalidBid {
                    auction_id: bid.auction_id,
                    reason: "denom differs from auction bid denom".into(),
                });
            }
        }

        if let Some(auction) = self
            .auctions
            .iter()
            .find(|a| a.has_bid() && !bid_ids.contains(&a.id))
        {
            return Err(GenesisValidationError::InvalidAuction {
                id: auction.id,
                reason: "last bid amount set without a bid record".into(),
            });
        }

        let mut bidders = BTreeSet::new();
        for metadata in &self.bidder_metadata {
            if !bidders.insert(metadata.bidder) {
                return Err(GenesisValidationError::DuplicateBidderMetadata(
                    format_address(&metadata.bidder),
                ));
            }
        }

        Ok(())
    }
}

/// Per-record checks of the auction invariants.
fn validate_auction(auction: &Auction) -> Result<(), GenesisValidationError> {
    let invalid = |reason: &str| GenesisValidationError::InvalidAuction {
        id: auction.id,
        reason: reason.to_string(),
    };

    if auction.id == 0 {
        return Err(invalid("id must be positive"));
    }
    validate_auction_rules(
        &auction.bid_denom,
        auction.duration,
        auction.price_floor,
        auction.instant_sale_price,
        auction.tick_size,
    )
    .map_err(|e| invalid(&e.to_string()))?;

    if auction.has_bid() != auction.last_bid_time.is_some() {
        return Err(invalid("last bid time does not match last bid amount"));
    }
    if auction.has_bid() && auction.last_bid_amount < auction.price_floor {
        return Err(invalid("last bid is below the price floor"));
    }

    match auction.state {
        AuctionState::Created => {
            if auction.end_auction_at.is_some() || auction.ended_at.is_some() {
                return Err(invalid("created auction has timing set"));
            }
            if auction.has_bid() {
                return Err(invalid("created auction has a bid"));
            }
        }
        AuctionState::Started => {
            if auction.end_auction_at.is_none() {
                return Err(invalid("started auction has no deadline"));
            }
            if auction.ended_at.is_some() {
                return Err(invalid("started auction has an end time"));
            }
        }
        AuctionState::Ended => {
            if auction.ended_at.is_none() {
                return Err(invalid("ended auction has no end time"));
            }
            if auction.end_auction_at.is_none() {
                return Err(invalid("ended auction was never started"));
            }
        }
    }

    let expected_claimed = u64::from(auction.state == AuctionState::Ended && auction.has_bid());
    if auction.claimed != expected_claimed {
        return Err(invalid("claimed flag does not match settlement"));
    }

    Ok(())
}

/// Validate `genesis` and write it into the store.
pub fn init_genesis<S: KvStore>(
    store: &mut AuctionStore<S>,
    genesis: &GenesisState,
) -> Result<(), GenesisValidationError> {
    genesis.validate()?;

    store.set_params(&genesis.params)?;
    for auction in &genesis.auctions {
        store.set_auction(auction)?;
    }
    for bid in &genesis.bids {
        store.set_bid(bid)?;
    }
    for metadata in &genesis.bidder_metadata {
        store.set_bidder_metadata(metadata)?;
    }
    store.set_last_auction_id(genesis.last_auction_id)?;

    info!(
        auctions = genesis.auctions.len(),
        bids = genesis.bids.len(),
        last_auction_id = genesis.last_auction_id,
        "marketplace genesis imported"
    );
    Ok(())
}

/// Snapshot the store.
pub fn export_genesis<S: KvStore>(store: &AuctionStore<S>) -> Result<GenesisState, MarketplaceError> {
    Ok(GenesisState {
        params: store.params()?,
        last_auction_id: store.last_auction_id()?,
        auctions: store.all_auctions()?,
        bids: store.all_bids()?,
        bidder_metadata: store.all_bidder_metadata()?,
    })
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Invalid auction {id}: {reason}")]
    InvalidAuction { id: u64, reason: String },

    #[error("Duplicate auction id {0}")]
    DuplicateAuction(u64),

    #[error("Invalid bid for auction {auction_id}: {reason}")]
    InvalidBid { auction_id: u64, reason: String },

    #[error("Duplicate bidder metadata for {0}")]
    DuplicateBidderMetadata(String),

    #[error(transparent)]
    Store(#[from] MarketplaceError),
}
