//! Query handlers for the marketplace module.
//!
//! These functions provide read-only access to marketplace state.

use marketplace_types::{Address, Auction, AuctionState, Bid, BidderMetadata, Params};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::error::MarketplaceError;
use crate::handlers::min_next_bid;
use crate::state::AuctionStore;
use crate::store::KvStore;

/// Query request types.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MarketplaceQuery {
    /// Get auction details by ID.
    GetAuction { auction_id: u64 },

    /// Get all auctions (paginated, ascending id).
    ListAuctions { offset: u64, limit: u64 },

    /// Get auctions managed by an account.
    AuctionsByAuthority {
        #[serde_as(as = "Hex")]
        authority: Address,
    },

    /// Get the highest bid on an auction.
    GetBid { auction_id: u64 },

    /// Get the auctions an account currently leads.
    BidsByBidder {
        #[serde_as(as = "Hex")]
        bidder: Address,
    },

    /// Get an account's last bidding activity.
    GetBidderMetadata {
        #[serde_as(as = "Hex")]
        bidder: Address,
    },

    /// Get module params.
    Params,

    /// Get the id of the most recently created auction.
    LastAuctionId,
}

/// Query response types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketplaceQueryResponse {
    Auction(Option<Auction>),
    AuctionList(Vec<Auction>),
    Bid(Option<Bid>),
    Bids(Vec<Bid>),
    BidderMetadata(Option<BidderMetadata>),
    Params(Params),
    LastAuctionId(u64),
}

/// Handle a query.
pub fn handle_query<S: KvStore>(
    store: &AuctionStore<S>,
    query: MarketplaceQuery,
) -> Result<MarketplaceQueryResponse, MarketplaceError> {
    let response = match query {
        MarketplaceQuery::GetAuction { auction_id } => {
            MarketplaceQueryResponse::Auction(store.get_auction(auction_id)?)
        }

        MarketplaceQuery::ListAuctions { offset, limit } => {
            let auctions = store
                .all_auctions()?
                .into_iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect();
            MarketplaceQueryResponse::AuctionList(auctions)
        }

        MarketplaceQuery::AuctionsByAuthority { authority } => {
            MarketplaceQueryResponse::AuctionList(store.auctions_by_authority(&authority)?)
        }

        MarketplaceQuery::GetBid { auction_id } => {
            MarketplaceQueryResponse::Bid(store.get_bid(auction_id)?)
        }

        MarketplaceQuery::BidsByBidder { bidder } => {
            MarketplaceQueryResponse::Bids(store.bids_by_bidder(&bidder)?)
        }

        MarketplaceQuery::GetBidderMetadata { bidder } => {
            MarketplaceQueryResponse::BidderMetadata(store.get_bidder_metadata(&bidder)?)
        }

        MarketplaceQuery::Params => MarketplaceQueryResponse::Params(store.params()?),

        MarketplaceQuery::LastAuctionId => {
            MarketplaceQueryResponse::LastAuctionId(store.last_auction_id()?)
        }
    };
    Ok(response)
}

/// Summary of an auction for listing.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub auction_id: u64,
    #[serde_as(as = "Hex")]
    pub authority: Address,
    pub asset_id: u64,
    pub state: AuctionState,
    pub end_auction_at: Option<u64>,
    pub last_bid_amount: u64,
    /// Smallest bid that would currently be accepted
    pub min_next_bid: Option<u64>,
}

impl AuctionSummary {
    pub fn from_auction(auction: &Auction) -> Self {
        Self {
            auction_id: auction.id,
            authority: auction.authority,
            asset_id: auction.asset_id,
            state: auction.state,
            end_auction_at: auction.end_auction_at,
            last_bid_amount: auction.last_bid_amount,
            min_next_bid: min_next_bid(auction),
        }
    }
}

/// Get auctions currently accepting bids.
pub fn get_active_auctions<S: KvStore>(
    store: &AuctionStore<S>,
    current_time: u64,
) -> Result<Vec<AuctionSummary>, MarketplaceError> {
    Ok(store
        .all_auctions()?
        .iter()
        .filter(|auction| auction.accepts_bids_at(current_time))
        .map(AuctionSummary::from_auction)
        .collect())
}

/// Started auctions whose bidding window has closed but that were not ended.
pub fn get_pending_end<S: KvStore>(
    store: &AuctionStore<S>,
    current_time: u64,
) -> Result<Vec<u64>, MarketplaceError> {
    Ok(store
        .all_auctions()?
        .iter()
        .filter(|auction| {
            auction.state == AuctionState::Started
                && auction.end_auction_at.map_or(false, |end| current_time > end)
        })
        .map(|auction| auction.id)
        .collect())
}
