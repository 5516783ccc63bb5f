//! Persistent state of the marketplace module.

use borsh::{BorshDeserialize, BorshSerialize};
use marketplace_types::{module_address, Address, Auction, Bid, BidderMetadata, Params};

use crate::error::MarketplaceError;
use crate::keys;
use crate::memory::{InMemoryAssets, InMemoryLedger};
use crate::store::{KvStore, MemoryStore};

/// Accounts the engine acts on behalf of, fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Holds escrowed assets and bids
    pub module_account: Address,
    /// Receives creation fees and the marketplace cut
    pub fee_collector: Address,
    /// May update module params
    pub governance: Address,
}

impl EngineConfig {
    /// Config using the conventional module-derived addresses.
    pub fn derived() -> Self {
        Self {
            module_account: module_address(keys::MODULE_NAME),
            fee_collector: module_address("fee_collector"),
            governance: module_address("gov"),
        }
    }
}

/// Typed view over the module's key-value store.
///
/// Holds the auction records, the authority index, the id counter, the
/// highest bid per auction with its bidder index, bidder metadata and params.
#[derive(Clone, Debug, Default)]
pub struct AuctionStore<S> {
    store: S,
}

impl<S: KvStore> AuctionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying store.
    pub fn inner(&self) -> &S {
        &self.store
    }

    fn read<T: BorshDeserialize>(&self, key: &[u8]) -> Result<Option<T>, MarketplaceError> {
        self.store
            .get(key)
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn write<T: BorshSerialize>(&mut self, key: Vec<u8>, value: &T) -> Result<(), MarketplaceError> {
        let bytes =
            borsh::to_vec(value).map_err(|e| MarketplaceError::Corrupted(e.to_string()))?;
        self.store.set(key, bytes);
        Ok(())
    }

    fn read_prefix<T: BorshDeserialize>(&self, prefix: &[u8]) -> Result<Vec<T>, MarketplaceError> {
        self.store
            .iter_prefix(prefix)
            .into_iter()
            .map(|(_, bytes)| decode(&bytes))
            .collect()
    }

    // === Id counter ===

    pub fn last_auction_id(&self) -> Result<u64, MarketplaceError> {
        Ok(self.read(keys::KEY_LAST_AUCTION_ID)?.unwrap_or(0))
    }

    pub fn set_last_auction_id(&mut self, id: u64) -> Result<(), MarketplaceError> {
        self.write(keys::KEY_LAST_AUCTION_ID.to_vec(), &id)
    }

    /// Id the next auction will get. Not persisted until the auction is.
    pub fn next_auction_id(&self) -> Result<u64, MarketplaceError> {
        self.last_auction_id()?
            .checked_add(1)
            .ok_or(MarketplaceError::Overflow)
    }

    // === Auctions ===

    pub fn get_auction(&self, id: u64) -> Result<Option<Auction>, MarketplaceError> {
        self.read(&keys::auction_key(id))
    }

    /// Store an auction and keep the authority index in step with it.
    pub fn set_auction(&mut self, auction: &Auction) -> Result<(), MarketplaceError> {
        if let Some(previous) = self.get_auction(auction.id)? {
            if previous.authority != auction.authority {
                self.store
                    .delete(&keys::auction_by_authority_key(&previous.authority, previous.id));
            }
        }
        self.write(keys::auction_key(auction.id), auction)?;
        self.store.set(
            keys::auction_by_authority_key(&auction.authority, auction.id),
            Vec::new(),
        );
        Ok(())
    }

    pub fn delete_auction(&mut self, auction: &Auction) -> Result<(), MarketplaceError> {
        if let Some(stored) = self.get_auction(auction.id)? {
            self.store
                .delete(&keys::auction_by_authority_key(&stored.authority, stored.id));
        }
        self.store
            .delete(&keys::auction_by_authority_key(&auction.authority, auction.id));
        self.store.delete(&keys::auction_key(auction.id));
        Ok(())
    }

    /// All auctions in ascending id order.
    pub fn all_auctions(&self) -> Result<Vec<Auction>, MarketplaceError> {
        self.read_prefix(&keys::auctions_prefix())
    }

    pub fn auctions_by_authority(&self, authority: &Address) -> Result<Vec<Auction>, MarketplaceError> {
        self.store
            .iter_prefix(&keys::auctions_by_authority_prefix(authority))
            .into_iter()
            .map(|(key, _)| {
                let id = keys::id_suffix(&key)
                    .ok_or_else(|| MarketplaceError::Corrupted("malformed authority index key".into()))?;
                self.get_auction(id)?.ok_or_else(|| {
                    MarketplaceError::Corrupted(format!("authority index points at missing auction {id}"))
                })
            })
            .collect()
    }

    // === Bids ===

    pub fn get_bid(&self, auction_id: u64) -> Result<Option<Bid>, MarketplaceError> {
        self.read(&keys::bid_key(auction_id))
    }

    /// Replace the highest bid of an auction.
    pub fn set_bid(&mut self, bid: &Bid) -> Result<(), MarketplaceError> {
        self.delete_bid(bid.auction_id)?;
        self.write(keys::bid_key(bid.auction_id), bid)?;
        self.store
            .set(keys::bid_by_bidder_key(&bid.bidder, bid.auction_id), Vec::new());
        Ok(())
    }

    pub fn delete_bid(&mut self, auction_id: u64) -> Result<(), MarketplaceError> {
        if let Some(previous) = self.get_bid(auction_id)? {
            self.store
                .delete(&keys::bid_by_bidder_key(&previous.bidder, auction_id));
            self.store.delete(&keys::bid_key(auction_id));
        }
        Ok(())
    }

    pub fn all_bids(&self) -> Result<Vec<Bid>, MarketplaceError> {
        self.read_prefix(&keys::bids_prefix())
    }

    /// Auctions on which `bidder` currently holds the highest bid.
    pub fn bids_by_bidder(&self, bidder: &Address) -> Result<Vec<Bid>, MarketplaceError> {
        self.store
            .iter_prefix(&keys::bids_by_bidder_prefix(bidder))
            .into_iter()
            .map(|(key, _)| {
                let id = keys::id_suffix(&key)
                    .ok_or_else(|| MarketplaceError::Corrupted("malformed bidder index key".into()))?;
                self.get_bid(id)?.ok_or_else(|| {
                    MarketplaceError::Corrupted(format!("bidder index points at missing bid {id}"))
                })
            })
            .collect()
    }

    // === Bidder metadata ===

    pub fn get_bidder_metadata(
        &self,
        bidder: &Address,
    ) -> Result<Option<BidderMetadata>, MarketplaceError> {
        self.read(&keys::bidder_metadata_key(bidder))
    }

    pub fn set_bidder_metadata(&mut self, metadata: &BidderMetadata) -> Result<(), MarketplaceError> {
        self.write(keys::bidder_metadata_key(&metadata.bidder), metadata)
    }

    pub fn all_bidder_metadata(&self) -> Result<Vec<BidderMetadata>, MarketplaceError> {
        self.read_prefix(&keys::bidder_metadata_prefix())
    }

    // === Params ===

    pub fn params(&self) -> Result<Params, MarketplaceError> {
        Ok(self.read(keys::KEY_PARAMS)?.unwrap_or_default())
    }

    pub fn set_params(&mut self, params: &Params) -> Result<(), MarketplaceError> {
        self.write(keys::KEY_PARAMS.to_vec(), params)
    }
}

fn decode<T: BorshDeserialize>(bytes: &[u8]) -> Result<T, MarketplaceError> {
    borsh::from_slice(bytes).map_err(|e| MarketplaceError::Corrupted(e.to_string()))
}

/// Everything a marketplace call reads or writes.
#[derive(Clone, Debug)]
pub struct MarketplaceState<S, A, L> {
    pub config: EngineConfig,
    pub store: AuctionStore<S>,
    pub assets: A,
    pub ledger: L,
}

impl<S, A, L> MarketplaceState<S, A, L> {
    pub fn new(config: EngineConfig, store: S, assets: A, ledger: L) -> Self {
        Self {
            config,
            store: AuctionStore { store },
            assets,
            ledger,
        }
    }
}

/// State backed entirely by in-memory collaborators.
pub type InMemoryState = MarketplaceState<MemoryStore, InMemoryAssets, InMemoryLedger>;

impl InMemoryState {
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            config,
            MemoryStore::new(),
            InMemoryAssets::new(),
            InMemoryLedger::new(),
        )
    }
}
