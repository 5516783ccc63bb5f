//! In-memory asset registry and balance ledger.
//!
//! Used by tests and the mock chain in place of the real NFT and bank
//! modules.

use std::collections::BTreeMap;

use marketplace_types::Address;

use crate::error::MarketplaceError;
use crate::expected::{Asset, AssetRegistry, BalanceLedger, Metadata};

/// Asset registry keeping assets and metadata in ordered maps.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAssets {
    assets: BTreeMap<u64, Asset>,
    metadata: BTreeMap<u64, Metadata>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_asset(&mut self, asset: Asset) {
        self.assets.insert(asset.id, asset);
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata.insert(metadata.id, metadata);
    }

    /// Register an asset together with its metadata record.
    pub fn mint_asset(&mut self, id: u64, metadata_id: u64, owner: Address, authority: Address) {
        self.set_asset(Asset {
            id,
            owner,
            metadata_id,
        });
        self.set_metadata(Metadata {
            id: metadata_id,
            update_authority: authority,
        });
    }
}

impl AssetRegistry for InMemoryAssets {
    fn get_asset(&self, id: u64) -> Result<Asset, MarketplaceError> {
        self.assets
            .get(&id)
            .cloned()
            .ok_or(MarketplaceError::AssetNotFound(id))
    }

    fn get_metadata(&self, id: u64) -> Result<Metadata, MarketplaceError> {
        self.metadata
            .get(&id)
            .cloned()
            .ok_or(MarketplaceError::MetadataNotFound(id))
    }

    fn transfer_asset(&mut self, id: u64, new_owner: Address) -> Result<(), MarketplaceError> {
        let asset = self
            .assets
            .get_mut(&id)
            .ok_or(MarketplaceError::AssetNotFound(id))?;
        asset.owner = new_owner;
        Ok(())
    }

    fn set_metadata_authority(
        &mut self,
        metadata_id: u64,
        new_authority: Address,
    ) -> Result<(), MarketplaceError> {
        let metadata = self
            .metadata
            .get_mut(&metadata_id)
            .ok_or(MarketplaceError::MetadataNotFound(metadata_id))?;
        metadata.update_authority = new_authority;
        Ok(())
    }
}

/// Balance ledger keyed by (address, denom).
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    balances: BTreeMap<(Address, String), u64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All non-zero balances, ordered by address then denom.
    pub fn balances(&self) -> impl Iterator<Item = (&Address, &str, u64)> {
        self.balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|((addr, denom), amount)| (addr, denom.as_str(), *amount))
    }

    fn sub(&mut self, address: &Address, denom: &str, amount: u64) -> Result<(), MarketplaceError> {
        let available = self.balance(address, denom);
        if available < amount {
            return Err(MarketplaceError::InsufficientFunds {
                denom: denom.to_string(),
                required: amount,
                available,
            });
        }
        self.balances
            .insert((*address, denom.to_string()), available - amount);
        Ok(())
    }

    fn add(&mut self, address: &Address, denom: &str, amount: u64) -> Result<(), MarketplaceError> {
        let balance = self
            .balances
            .entry((*address, denom.to_string()))
            .or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(MarketplaceError::Overflow)?;
        Ok(())
    }
}

impl BalanceLedger for InMemoryLedger {
    fn balance(&self, address: &Address, denom: &str) -> u64 {
        self.balances
            .get(&(*address, denom.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        denom: &str,
        amount: u64,
    ) -> Result<(), MarketplaceError> {
        // Credit side checked first so a failed credit leaves both balances untouched.
        let credited = self.balance(to, denom);
        if from != to && credited.checked_add(amount).is_none() {
            return Err(MarketplaceError::Overflow);
        }
        self.sub(from, denom, amount)?;
        self.add(to, denom, amount)
    }

    fn mint(&mut self, to: &Address, denom: &str, amount: u64) -> Result<(), MarketplaceError> {
        self.add(to, denom, amount)
    }
}
