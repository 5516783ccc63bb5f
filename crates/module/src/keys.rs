//! Store key layout.
//!
//! Ids are encoded big-endian so that prefix iteration yields ascending ids.

use marketplace_types::Address;

/// Name the module registers under.
pub const MODULE_NAME: &str = "marketplace";

pub const PREFIX_AUCTION: u8 = 0x01;
pub const PREFIX_AUCTION_BY_AUTHORITY: u8 = 0x02;
pub const KEY_LAST_AUCTION_ID: &[u8] = &[0x03];
pub const PREFIX_BID: u8 = 0x04;
pub const PREFIX_BID_BY_BIDDER: u8 = 0x05;
pub const PREFIX_BIDDER_METADATA: u8 = 0x06;
pub const KEY_PARAMS: &[u8] = &[0x07];

fn with_prefix(prefix: u8, parts: &[&[u8]]) -> Vec<u8> {
    let len = 1 + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.push(prefix);
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

pub fn auction_key(id: u64) -> Vec<u8> {
    with_prefix(PREFIX_AUCTION, &[&id.to_be_bytes()])
}

pub fn auctions_prefix() -> Vec<u8> {
    vec![PREFIX_AUCTION]
}

pub fn auction_by_authority_key(authority: &Address, id: u64) -> Vec<u8> {
    with_prefix(PREFIX_AUCTION_BY_AUTHORITY, &[authority, &id.to_be_bytes()])
}

pub fn auctions_by_authority_prefix(authority: &Address) -> Vec<u8> {
    with_prefix(PREFIX_AUCTION_BY_AUTHORITY, &[authority])
}

pub fn bid_key(auction_id: u64) -> Vec<u8> {
    with_prefix(PREFIX_BID, &[&auction_id.to_be_bytes()])
}

pub fn bids_prefix() -> Vec<u8> {
    vec![PREFIX_BID]
}

pub fn bid_by_bidder_key(bidder: &Address, auction_id: u64) -> Vec<u8> {
    with_prefix(PREFIX_BID_BY_BIDDER, &[bidder, &auction_id.to_be_bytes()])
}

pub fn bids_by_bidder_prefix(bidder: &Address) -> Vec<u8> {
    with_prefix(PREFIX_BID_BY_BIDDER, &[bidder])
}

pub fn bidder_metadata_key(bidder: &Address) -> Vec<u8> {
    with_prefix(PREFIX_BIDDER_METADATA, &[bidder])
}

pub fn bidder_metadata_prefix() -> Vec<u8> {
    vec![PREFIX_BIDDER_METADATA]
}

/// Trailing big-endian id of an index key.
pub fn id_suffix(key: &[u8]) -> Option<u64> {
    let start = key.len().checked_sub(8)?;
    let bytes: [u8; 8] = key[start..].try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
