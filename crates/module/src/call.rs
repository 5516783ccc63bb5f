//! Call message types for the marketplace module.

use borsh::{BorshDeserialize, BorshSerialize};
use marketplace_types::{Address, Params, PrizeType};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

/// Call messages for the marketplace module.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketplaceCall {
    // === Auction Lifecycle ===
    /// Escrow an asset and open a new auction for it.
    CreateAuction {
        asset_id: u64,
        prize_type: PrizeType,
        bid_denom: String,
        duration: u64,
        price_floor: u64,
        instant_sale_price: u64,
        tick_size: u64,
    },

    /// Open the auction for bidding.
    StartAuction { auction_id: u64 },

    /// Hand the auction over to another account.
    SetAuctionAuthority {
        auction_id: u64,
        #[serde_as(as = "Hex")]
        new_authority: Address,
    },

    /// Outbid the current highest bid.
    PlaceBid { auction_id: u64, amount: u64 },

    /// Close the auction and settle it.
    EndAuction { auction_id: u64 },

    /// Remove an ended auction from the store.
    DeleteAuction { auction_id: u64 },

    // === Admin ===
    /// Replace module params (governance only).
    UpdateParams { params: Params },
}

impl MarketplaceCall {
    /// Auction targeted by the call, if any.
    pub fn auction_id(&self) -> Option<u64> {
        match self {
            Self::StartAuction { auction_id }
            | Self::SetAuctionAuthority { auction_id, .. }
            | Self::PlaceBid { auction_id, .. }
            | Self::EndAuction { auction_id }
            | Self::DeleteAuction { auction_id } => Some(*auction_id),
            Self::CreateAuction { .. } | Self::UpdateParams { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateAuction { .. } => "create_auction",
            Self::StartAuction { .. } => "start_auction",
            Self::SetAuctionAuthority { .. } => "set_auction_authority",
            Self::PlaceBid { .. } => "place_bid",
            Self::EndAuction { .. } => "end_auction",
            Self::DeleteAuction { .. } => "delete_auction",
            Self::UpdateParams { .. } => "update_params",
        }
    }
}

/// Result of a successfully executed call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallResponse {
    /// Id of a newly created auction.
    AuctionCreated(u64),
    /// Bid accepted; `settled` is true when it triggered an instant sale.
    BidPlaced { settled: bool },
    Ok,
}
