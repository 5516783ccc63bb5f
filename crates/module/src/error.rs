//! Marketplace module error types.

use thiserror::Error;

use marketplace_types::AuctionState;

/// Errors that can occur in the marketplace module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketplaceError {
    #[error("Auction not found: {0}")]
    AuctionNotFound(u64),

    #[error("Asset not found: {0}")]
    AssetNotFound(u64),

    #[error("Metadata not found: {0}")]
    MetadataNotFound(u64),

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Not the asset owner")]
    NotAssetOwner,

    #[error("Not the metadata update authority")]
    NotMetadataAuthority,

    #[error("Invalid state. Expected: {expected:?}, Got: {got:?}")]
    InvalidState {
        expected: AuctionState,
        got: AuctionState,
    },

    #[error("Auction already ended")]
    AlreadyEnded,

    #[error("Bidding period ended at {end_auction_at}")]
    BiddingEnded { end_auction_at: u64 },

    #[error("Bid too low: need at least {required}, got {got}")]
    BidTooLow { required: u64, got: u64 },

    #[error("Insufficient funds: need {required}{denom}, have {available}{denom}")]
    InsufficientFunds {
        denom: String,
        required: u64,
        available: u64,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Corrupted state: {0}")]
    Corrupted(String),
}

/// Coarse classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    InvalidState,
    BidTooLow,
    InsufficientFunds,
    InvalidRequest,
    /// Not recoverable by the caller; the enclosing transaction must abort
    Internal,
}

impl MarketplaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuctionNotFound(_)
            | Self::AssetNotFound(_)
            | Self::MetadataNotFound(_) => ErrorKind::NotFound,
            Self::NotAuthorized | Self::NotAssetOwner | Self::NotMetadataAuthority => {
                ErrorKind::Unauthorized
            }
            Self::InvalidState { .. } | Self::AlreadyEnded | Self::BiddingEnded { .. } => {
                ErrorKind::InvalidState
            }
            Self::BidTooLow { .. } => ErrorKind::BidTooLow,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Overflow | Self::Corrupted(_) => ErrorKind::Internal,
        }
    }

    /// Whether the error signals broken state rather than a bad request.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}
