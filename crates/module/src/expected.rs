//! Interfaces of the modules the marketplace depends on.

use marketplace_types::Address;

use crate::error::MarketplaceError;

/// A non-fungible asset as seen by the marketplace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    pub id: u64,
    pub owner: Address,
    pub metadata_id: u64,
}

/// Metadata record of an asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub id: u64,
    pub update_authority: Address,
}

/// Asset registry (NFT module).
pub trait AssetRegistry {
    fn get_asset(&self, id: u64) -> Result<Asset, MarketplaceError>;

    fn get_metadata(&self, id: u64) -> Result<Metadata, MarketplaceError>;

    fn transfer_asset(&mut self, id: u64, new_owner: Address) -> Result<(), MarketplaceError>;

    fn set_metadata_authority(
        &mut self,
        metadata_id: u64,
        new_authority: Address,
    ) -> Result<(), MarketplaceError>;
}

/// Fungible balance ledger (bank module).
pub trait BalanceLedger {
    fn balance(&self, address: &Address, denom: &str) -> u64;

    /// Fails with `InsufficientFunds` when `from` holds less than `amount`.
    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        denom: &str,
        amount: u64,
    ) -> Result<(), MarketplaceError>;

    fn mint(&mut self, to: &Address, denom: &str, amount: u64) -> Result<(), MarketplaceError>;
}
