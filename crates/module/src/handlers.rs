//! Call handlers for the marketplace module.
//!
//! These functions implement the auction state machine and settlement. Every
//! handler performs all of its fallible checks before the first write;
//! [`execute_call`] additionally rolls the whole state back if a handler
//! fails part way.

use marketplace_types::{
    format_address, Address, Auction, AuctionState, Bid, BidderMetadata, Params, PrizeType,
    BPS_DENOMINATOR,
};
use tracing::{debug, info, warn};

use crate::call::{CallResponse, MarketplaceCall};
use crate::error::MarketplaceError;
use crate::expected::{AssetRegistry, BalanceLedger};
use crate::state::{AuctionStore, MarketplaceState};
use crate::store::KvStore;

/// Context provided by the runtime for each call.
#[derive(Clone, Debug)]
pub struct CallContext {
    /// Sender of the transaction
    pub sender: Address,
    /// Current block height
    pub block_height: u64,
    /// Current block time (seconds)
    pub timestamp: u64,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, MarketplaceError>;

/// Execute a call atomically: on error the state is restored to what it was
/// before the call.
pub fn execute_call<S, A, L>(
    state: &mut MarketplaceState<S, A, L>,
    ctx: &CallContext,
    call: MarketplaceCall,
) -> HandlerResult<CallResponse>
where
    S: KvStore + Clone,
    A: AssetRegistry + Clone,
    L: BalanceLedger + Clone,
{
    let snapshot = state.clone();
    let name = call.name();
    let auction_id = call.auction_id();

    match handle_call(state, ctx, call) {
        Ok(response) => {
            debug!(
                call = name,
                ?auction_id,
                sender = %format_address(&ctx.sender),
                ?response,
                "call executed"
            );
            Ok(response)
        }
        Err(err) => {
            *state = snapshot;
            if err.is_fatal() {
                warn!(call = name, ?auction_id, error = %err, "call aborted on corrupted state");
            } else {
                debug!(call = name, ?auction_id, error = %err, "call rejected");
            }
            Err(err)
        }
    }
}

impl<S, A, L> MarketplaceState<S, A, L>
where
    S: KvStore + Clone,
    A: AssetRegistry + Clone,
    L: BalanceLedger + Clone,
{
    /// Apply `call` as one transaction. See [`execute_call`].
    pub fn execute(
        &mut self,
        ctx: &CallContext,
        call: MarketplaceCall,
    ) -> HandlerResult<CallResponse> {
        execute_call(self, ctx, call)
    }
}

/// Route a call to its handler.
pub fn handle_call<S, A, L>(
    state: &mut MarketplaceState<S, A, L>,
    ctx: &CallContext,
    call: MarketplaceCall,
) -> HandlerResult<CallResponse>
where
    S: KvStore,
    A: AssetRegistry,
    L: BalanceLedger,
{
    match call {
        MarketplaceCall::CreateAuction {
            asset_id,
            prize_type,
            bid_denom,
            duration,
            price_floor,
            instant_sale_price,
            tick_size,
        } => handle_create_auction(
            state,
            ctx,
            asset_id,
            prize_type,
            bid_denom,
            duration,
            price_floor,
            instant_sale_price,
            tick_size,
        )
        .map(CallResponse::AuctionCreated),
        MarketplaceCall::StartAuction { auction_id } => {
            handle_start_auction(state, ctx, auction_id).map(|_| CallResponse::Ok)
        }
        MarketplaceCall::SetAuctionAuthority {
            auction_id,
            new_authority,
        } => handle_set_auction_authority(state, ctx, auction_id, new_authority)
            .map(|_| CallResponse::Ok),
        MarketplaceCall::PlaceBid { auction_id, amount } => {
            handle_place_bid(state, ctx, auction_id, amount)
                .map(|settled| CallResponse::BidPlaced { settled })
        }
        MarketplaceCall::EndAuction { auction_id } => {
            handle_end_auction(state, ctx, auction_id).map(|_| CallResponse::Ok)
        }
        MarketplaceCall::DeleteAuction { auction_id } => {
            handle_delete_auction(state, ctx, auction_id).map(|_| CallResponse::Ok)
        }
        MarketplaceCall::UpdateParams { params } => {
            handle_update_params(state, ctx, params).map(|_| CallResponse::Ok)
        }
    }
}

/// Handle CreateAuction call.
#[allow(clippy::too_many_arguments)]
pub fn handle_create_auction<S, A, L>(
    state: &mut MarketplaceState<S, A, L>,
    ctx: &CallContext,
    asset_id: u64,
    prize_type: PrizeType,
    bid_denom: String,
    duration: u64,
    price_floor: u64,
    instant_sale_price: u64,
    tick_size: u64,
) -> HandlerResult<u64>
where
    S: KvStore,
    A: AssetRegistry,
    L: BalanceLedger,
{
    validate_auction_rules(&bid_denom, duration, price_floor, instant_sale_price, tick_size)?;

    // Seller must own the asset, and its metadata for full rights
    let asset = state.assets.get_asset(asset_id)?;
    if asset.owner != ctx.sender {
        return Err(MarketplaceError::NotAssetOwner);
    }
    if prize_type == PrizeType::FullRightsTransfer {
        let metadata = state.assets.get_metadata(asset.metadata_id)?;
        if metadata.update_authority != ctx.sender {
            return Err(MarketplaceError::NotMetadataAuthority);
        }
    }

    // Creation fee
    let fee = state.store.params()?.auction_creation_fee;
    if !fee.is_zero() {
        let available = state.ledger.balance(&ctx.sender, &fee.denom);
        if available < fee.amount {
            return Err(MarketplaceError::InsufficientFunds {
                denom: fee.denom,
                required: fee.amount,
                available,
            });
        }
    }

    let auction_id = state.store.next_auction_id()?;

    if !fee.is_zero() {
        state.ledger.transfer(
            &ctx.sender,
            &state.config.fee_collector,
            &fee.denom,
            fee.amount,
        )?;
    }

    // Escrow the prize
    let module_account = state.config.module_account;
    state.assets.transfer_asset(asset_id, module_account)?;
    if prize_type == PrizeType::FullRightsTransfer {
        state
            .assets
            .set_metadata_authority(asset.metadata_id, module_account)?;
    }

    let auction = Auction {
        id: auction_id,
        authority: ctx.sender,
        asset_id,
        prize_type,
        duration,
        bid_denom,
        price_floor,
        instant_sale_price,
        tick_size,
        state: AuctionState::Created,
        last_bid_amount: 0,
        last_bid_time: None,
        ended_at: None,
        end_auction_at: None,
        claimed: 0,
    };
    state.store.set_auction(&auction)?;
    state.store.set_last_auction_id(auction_id)?;

    info!(
        auction_id,
        asset_id,
        authority = %format_address(&ctx.sender),
        ?prize_type,
        "auction created"
    );
    Ok(auction_id)
}

/// Handle StartAuction call.
pub fn handle_start_auction<S, A, L>(
    state: &mut MarketplaceState<S, A, L>,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<()>
where
    S: KvStore,
{
    let mut auction = load_auction(&state.store, auction_id)?;
    ensure_authority(&auction, ctx)?;

    if auction.state != AuctionState::Created {
        return Err(MarketplaceError::InvalidState {
            expected: AuctionState::Created,
            got: auction.state,
        });
    }

    let end_auction_at = ctx
        .timestamp
        .checked_add(auction.duration)
        .ok_or(MarketplaceError::Overflow)?;

    auction.state = AuctionState::Started;
    auction.end_auction_at = Some(end_auction_at);
    state.store.set_auction(&auction)?;

    info!(auction_id, end_auction_at, "auction started");
    Ok(())
}

/// Handle SetAuctionAuthority call.
///
/// Allowed in every state, including after the auction started.
pub fn handle_set_auction_authority<S, A, L>(
    state: &mut MarketplaceState<S, A, L>,
    ctx: &CallContext,
    auction_id: u64,
    new_authority: Address,
) -> HandlerResult<()>
where
    S: KvStore,
{
    let mut auction = load_auction(&state.store, auction_id)?;
    ensure_authority(&auction, ctx)?;

    auction.authority = new_authority;
    state.store.set_auction(&auction)?;

    info!(
        auction_id,
        new_authority = %format_address(&new_authority),
        "auction authority updated"
    );
    Ok(())
}

/// Handle PlaceBid call.
///
/// Returns whether the bid reached the instant sale price and settled the
/// auction.
pub fn handle_place_bid<S, A, L>(
    state: &mut MarketplaceState<S, A, L>,
    ctx: &CallContext,
    auction_id: u64,
    amount: u64,
) -> HandlerResult<bool>
where
    S: KvStore,
    A: AssetRegistry,
    L: BalanceLedger,
{
    let mut auction = load_auction(&state.store, auction_id)?;

    // Bidding window
    match auction.state {
        AuctionState::Started => {}
        AuctionState::Ended => return Err(MarketplaceError::AlreadyEnded),
        AuctionState::Created => {
            return Err(MarketplaceError::InvalidState {
                expected: AuctionState::Started,
                got: AuctionState::Created,
            })
        }
    }
    let end_auction_at = auction.end_auction_at.ok_or_else(|| {
        MarketplaceError::Corrupted(format!("started auction {auction_id} has no deadline"))
    })?;
    if ctx.timestamp > end_auction_at {
        return Err(MarketplaceError::BiddingEnded { end_auction_at });
    }

    let required = min_next_bid(&auction);
    if required.map_or(true, |required| amount < required) {
        return Err(MarketplaceError::BidTooLow {
            required: required.unwrap_or(u64::MAX),
            got: amount,
        });
    }

    let available = state.ledger.balance(&ctx.sender, &auction.bid_denom);
    if available < amount {
        return Err(MarketplaceError::InsufficientFunds {
            denom: auction.bid_denom.clone(),
            required: amount,
            available,
        });
    }

    let previous = if auction.has_bid() {
        Some(load_bid(&state.store, &auction)?)
    } else {
        None
    };

    // Escrow the new bid, then release the one it replaces
    let module_account = state.config.module_account;
    state
        .ledger
        .transfer(&ctx.sender, &module_account, &auction.bid_denom, amount)?;
    if let Some(previous) = &previous {
        state.ledger.transfer(
            &module_account,
            &previous.bidder,
            &previous.denom,
            previous.amount,
        )?;
        debug!(
            auction_id,
            bidder = %format_address(&previous.bidder),
            amount = previous.amount,
            "outbid bidder refunded"
        );
    }

    let bid = Bid {
        auction_id,
        bidder: ctx.sender,
        amount,
        denom: auction.bid_denom.clone(),
        timestamp: ctx.timestamp,
    };
    state.store.set_bid(&bid)?;
    state.store.set_bidder_metadata(&BidderMetadata {
        bidder: ctx.sender,
        last_auction_id: auction_id,
        last_bid: amount,
        last_bid_timestamp: ctx.timestamp,
    })?;

    auction.last_bid_amount = amount;
    auction.last_bid_time = Some(ctx.timestamp);

    info!(
        auction_id,
        bidder = %format_address(&ctx.sender),
        amount,
        "bid placed"
    );

    let settled = auction.instant_sale_enabled() && amount >= auction.instant_sale_price;
    if settled {
        info!(auction_id, amount, "instant sale price reached");
        settle_auction(state, ctx, &mut auction)?;
    }
    state.store.set_auction(&auction)?;

    Ok(settled)
}

/// Handle EndAuction call.
pub fn handle_end_auction<S, A, L>(
    state: &mut MarketplaceState<S, A, L>,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<()>
where
    S: KvStore,
    A: AssetRegistry,
    L: BalanceLedger,
{
    let mut auction = load_auction(&state.store, auction_id)?;
    ensure_authority(&auction, ctx)?;

    match auction.state {
        AuctionState::Started => {}
        AuctionState::Ended => return Err(MarketplaceError::AlreadyEnded),
        AuctionState::Created => {
            return Err(MarketplaceError::InvalidState {
                expected: AuctionState::Started,
                got: AuctionState::Created,
            })
        }
    }

    settle_auction(state, ctx, &mut auction)?;
    state.store.set_auction(&auction)
}

/// Handle DeleteAuction call.
pub fn handle_delete_auction<S, A, L>(
    state: &mut MarketplaceState<S, A, L>,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<()>
where
    S: KvStore,
{
    let auction = load_auction(&state.store, auction_id)?;
    ensure_authority(&auction, ctx)?;

    // Earlier states still hold the prize in escrow
    if auction.state != AuctionState::Ended {
        return Err(MarketplaceError::InvalidState {
            expected: AuctionState::Ended,
            got: auction.state,
        });
    }

    state.store.delete_bid(auction_id)?;
    state.store.delete_auction(&auction)?;

    info!(auction_id, "auction deleted");
    Ok(())
}

/// Handle UpdateParams call.
pub fn handle_update_params<S, A, L>(
    state: &mut MarketplaceState<S, A, L>,
    ctx: &CallContext,
    params: Params,
) -> HandlerResult<()>
where
    S: KvStore,
{
    if ctx.sender != state.config.governance {
        return Err(MarketplaceError::NotAuthorized);
    }
    validate_params(&params)?;
    state.store.set_params(&params)?;

    info!(?params, "params updated");
    Ok(())
}

/// Close an auction and move prize and proceeds.
///
/// Shared by EndAuction and instant-sale bids. The caller persists the
/// auction afterwards.
fn settle_auction<S, A, L>(
    state: &mut MarketplaceState<S, A, L>,
    ctx: &CallContext,
    auction: &mut Auction,
) -> HandlerResult<()>
where
    S: KvStore,
    A: AssetRegistry,
    L: BalanceLedger,
{
    let asset = state.assets.get_asset(auction.asset_id)?;
    let winning_bid = if auction.has_bid() {
        Some(load_bid(&state.store, auction)?)
    } else {
        None
    };
    let cut_bps = state.store.params()?.marketplace_cut_bps;

    auction.state = AuctionState::Ended;
    auction.ended_at = Some(ctx.timestamp);

    let Some(bid) = winning_bid else {
        // No bids: the prize goes back to the authority
        release_prize(state, auction, asset.metadata_id, auction.authority)?;
        info!(auction_id = auction.id, "auction ended without bids");
        return Ok(());
    };

    release_prize(state, auction, asset.metadata_id, bid.bidder)?;

    let cut = marketplace_cut(bid.amount, cut_bps)?;
    let proceeds = bid.amount - cut;
    let module_account = state.config.module_account;
    if cut > 0 {
        state.ledger.transfer(
            &module_account,
            &state.config.fee_collector,
            &bid.denom,
            cut,
        )?;
    }
    if proceeds > 0 {
        state
            .ledger
            .transfer(&module_account, &auction.authority, &bid.denom, proceeds)?;
    }
    auction.claimed = 1;

    info!(
        auction_id = auction.id,
        winner = %format_address(&bid.bidder),
        amount = bid.amount,
        cut,
        "auction settled"
    );
    Ok(())
}

/// Move the escrowed asset, and for full rights its metadata authority.
fn release_prize<S, A, L>(
    state: &mut MarketplaceState<S, A, L>,
    auction: &Auction,
    metadata_id: u64,
    recipient: Address,
) -> HandlerResult<()>
where
    A: AssetRegistry,
{
    state.assets.transfer_asset(auction.asset_id, recipient)?;
    match auction.prize_type {
        PrizeType::AssetOnlyTransfer => {}
        PrizeType::FullRightsTransfer => {
            state.assets.set_metadata_authority(metadata_id, recipient)?;
        }
    }
    Ok(())
}

/// Smallest acceptable next bid, `None` if no amount can satisfy it.
pub fn min_next_bid(auction: &Auction) -> Option<u64> {
    // A zero bid would record no bid at all
    if !auction.has_bid() {
        return Some(auction.price_floor.max(1));
    }
    auction
        .last_bid_amount
        .checked_add(auction.tick_size)
        .map(|next| next.max(auction.price_floor))
}

/// Marketplace share of `amount`, rounded down.
pub fn marketplace_cut(amount: u64, cut_bps: u32) -> HandlerResult<u64> {
    if cut_bps > BPS_DENOMINATOR {
        return Err(MarketplaceError::Corrupted(format!(
            "marketplace cut of {cut_bps} bps exceeds 100%"
        )));
    }
    let cut = u128::from(amount) * u128::from(cut_bps) / u128::from(BPS_DENOMINATOR);
    u64::try_from(cut).map_err(|_| MarketplaceError::Overflow)
}

/// Stateless checks on auction creation parameters.
pub fn validate_auction_rules(
    bid_denom: &str,
    duration: u64,
    price_floor: u64,
    instant_sale_price: u64,
    tick_size: u64,
) -> HandlerResult<()> {
    if bid_denom.is_empty() {
        return Err(MarketplaceError::InvalidRequest("bid denom is empty".into()));
    }
    if duration == 0 {
        return Err(MarketplaceError::InvalidRequest("duration must be positive".into()));
    }
    if tick_size == 0 {
        return Err(MarketplaceError::InvalidRequest("tick size must be positive".into()));
    }
    if instant_sale_price > 0 && instant_sale_price < price_floor {
        return Err(MarketplaceError::InvalidRequest(
            "instant sale price is below the price floor".into(),
        ));
    }
    Ok(())
}

pub fn validate_params(params: &Params) -> HandlerResult<()> {
    if params.marketplace_cut_bps > BPS_DENOMINATOR {
        return Err(MarketplaceError::InvalidRequest(format!(
            "marketplace cut {} bps exceeds {BPS_DENOMINATOR}",
            params.marketplace_cut_bps
        )));
    }
    let fee = &params.auction_creation_fee;
    if !fee.is_zero() && fee.denom.is_empty() {
        return Err(MarketplaceError::InvalidRequest(
            "creation fee has no denom".into(),
        ));
    }
    Ok(())
}

fn load_auction<S: KvStore>(store: &AuctionStore<S>, auction_id: u64) -> HandlerResult<Auction> {
    store
        .get_auction(auction_id)?
        .ok_or(MarketplaceError::AuctionNotFound(auction_id))
}

/// Highest bid of an auction that records one.
fn load_bid<S: KvStore>(store: &AuctionStore<S>, auction: &Auction) -> HandlerResult<Bid> {
    let bid = store.get_bid(auction.id)?.ok_or_else(|| {
        MarketplaceError::Corrupted(format!("auction {} has a bid amount but no bid", auction.id))
    })?;
    if bid.amount != auction.last_bid_amount {
        return Err(MarketplaceError::Corrupted(format!(
            "auction {} bid record does not match last bid amount",
            auction.id
        )));
    }
    Ok(bid)
}

fn ensure_authority(auction: &Auction, ctx: &CallContext) -> HandlerResult<()> {
    if auction.authority != ctx.sender {
        return Err(MarketplaceError::NotAuthorized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::expected::{Asset, Metadata};
    use crate::state::{EngineConfig, InMemoryState};
    use marketplace_types::Coin;

    const OWNER: Address = [1u8; 32];
    const USER2: Address = [2u8; 32];
    const BIDDER_A: Address = [3u8; 32];
    const BIDDER_B: Address = [4u8; 32];

    fn test_context(sender: Address, timestamp: u64) -> CallContext {
        CallContext {
            sender,
            block_height: 100,
            timestamp,
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            module_account: [0xaau8; 32],
            fee_collector: [0xfeu8; 32],
            governance: [0x90u8; 32],
        }
    }

    fn setup_state(asset_owner: Address, metadata_owner: Address) -> InMemoryState {
        let mut state = InMemoryState::in_memory(config());
        state.assets.set_asset(Asset {
            id: 1,
            owner: asset_owner,
            metadata_id: 1,
        });
        state.assets.set_metadata(Metadata {
            id: 1,
            update_authority: metadata_owner,
        });
        state
    }

    fn create(state: &mut InMemoryState, prize_type: PrizeType) -> HandlerResult<u64> {
        handle_create_auction(
            state,
            &test_context(OWNER, 1000),
            1,
            prize_type,
            "tok".to_string(),
            3600,
            1,
            1000,
            1,
        )
    }

    fn started_auction(state: &mut InMemoryState, prize_type: PrizeType) -> u64 {
        let id = create(state, prize_type).unwrap();
        handle_start_auction(state, &test_context(OWNER, 1000), id).unwrap();
        id
    }

    fn fund(state: &mut InMemoryState, who: Address, amount: u64) {
        state.ledger.mint(&who, "tok", amount).unwrap();
    }

    #[test]
    fn test_create_auction() {
        let mut state = setup_state(OWNER, OWNER);

        let id = create(&mut state, PrizeType::FullRightsTransfer).unwrap();
        assert_eq!(id, 1);
        assert_eq!(state.store.last_auction_id().unwrap(), 1);

        let auction = state.store.get_auction(id).unwrap().unwrap();
        assert_eq!(auction.state, AuctionState::Created);
        assert_eq!(auction.claimed, 0);
        assert_eq!(auction.authority, OWNER);
        assert_eq!(auction.last_bid_amount, 0);
        assert!(auction.end_auction_at.is_none());

        let module = config().module_account;
        assert_eq!(state.assets.get_asset(1).unwrap().owner, module);
        assert_eq!(state.assets.get_metadata(1).unwrap().update_authority, module);
    }

    #[test]
    fn test_create_auction_failures() {
        let mut state = setup_state(USER2, OWNER);
        let err = create(&mut state, PrizeType::AssetOnlyTransfer).unwrap_err();
        assert_eq!(err, MarketplaceError::NotAssetOwner);

        let mut state = setup_state(OWNER, USER2);
        let err = create(&mut state, PrizeType::FullRightsTransfer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        // Asset-only auctions do not need the metadata authority
        assert!(create(&mut state, PrizeType::AssetOnlyTransfer).is_ok());

        let mut state = setup_state(OWNER, OWNER);
        let err = handle_create_auction(
            &mut state,
            &test_context(OWNER, 1000),
            0,
            PrizeType::AssetOnlyTransfer,
            "tok".to_string(),
            3600,
            1,
            1000,
            1,
        )
        .unwrap_err();
        assert_eq!(err, MarketplaceError::AssetNotFound(0));
        assert!(state.store.get_auction(1).unwrap().is_none());
    }

    #[test]
    fn test_create_auction_invalid_rules() {
        let mut state = setup_state(OWNER, OWNER);
        let ctx = test_context(OWNER, 1000);

        let err = handle_create_auction(
            &mut state,
            &ctx,
            1,
            PrizeType::AssetOnlyTransfer,
            String::new(),
            3600,
            1,
            0,
            1,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = handle_create_auction(
            &mut state,
            &ctx,
            1,
            PrizeType::AssetOnlyTransfer,
            "tok".to_string(),
            3600,
            500,
            100,
            1,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(state.assets.get_asset(1).unwrap().owner, OWNER);
    }

    #[test]
    fn test_create_auction_charges_fee() {
        let mut state = setup_state(OWNER, USER2);
        state
            .store
            .set_params(&Params {
                auction_creation_fee: Coin::new("tok", 2000),
                marketplace_cut_bps: 0,
            })
            .unwrap();
        fund(&mut state, OWNER, 2000);

        create(&mut state, PrizeType::AssetOnlyTransfer).unwrap();
        assert_eq!(state.ledger.balance(&OWNER, "tok"), 0);
        assert_eq!(state.ledger.balance(&config().fee_collector, "tok"), 2000);
    }

    #[test]
    fn test_create_auction_insufficient_fee_balance() {
        let mut state = setup_state(OWNER, USER2);
        state
            .store
            .set_params(&Params {
                auction_creation_fee: Coin::new("tok", 2000),
                marketplace_cut_bps: 0,
            })
            .unwrap();
        fund(&mut state, OWNER, 1999);

        let err = create(&mut state, PrizeType::AssetOnlyTransfer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(state.ledger.balance(&OWNER, "tok"), 1999);
        assert_eq!(state.assets.get_asset(1).unwrap().owner, OWNER);
        assert_eq!(state.store.last_auction_id().unwrap(), 0);
    }

    #[test]
    fn test_start_auction() {
        let mut state = setup_state(OWNER, OWNER);
        let id = create(&mut state, PrizeType::AssetOnlyTransfer).unwrap();

        let err = handle_start_auction(&mut state, &test_context(OWNER, 2000), 0).unwrap_err();
        assert_eq!(err, MarketplaceError::AuctionNotFound(0));

        let err = handle_start_auction(&mut state, &test_context(USER2, 2000), id).unwrap_err();
        assert_eq!(err, MarketplaceError::NotAuthorized);

        handle_start_auction(&mut state, &test_context(OWNER, 2000), id).unwrap();
        let auction = state.store.get_auction(id).unwrap().unwrap();
        assert_eq!(auction.state, AuctionState::Started);
        assert_eq!(auction.end_auction_at, Some(2000 + 3600));

        let err = handle_start_auction(&mut state, &test_context(OWNER, 2001), id).unwrap_err();
        assert!(matches!(
            err,
            MarketplaceError::InvalidState {
                expected: AuctionState::Created,
                got: AuctionState::Started
            }
        ));
    }

    #[test]
    fn test_start_auction_overflow_is_fatal() {
        let mut state = setup_state(OWNER, OWNER);
        let id = create(&mut state, PrizeType::AssetOnlyTransfer).unwrap();

        let err =
            handle_start_auction(&mut state, &test_context(OWNER, u64::MAX), id).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_set_auction_authority() {
        let mut state = setup_state(OWNER, OWNER);
        let id = create(&mut state, PrizeType::AssetOnlyTransfer).unwrap();

        let err = handle_set_auction_authority(&mut state, &test_context(OWNER, 0), 0, USER2)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = handle_set_auction_authority(&mut state, &test_context(USER2, 0), id, USER2)
            .unwrap_err();
        assert_eq!(err, MarketplaceError::NotAuthorized);

        handle_set_auction_authority(&mut state, &test_context(OWNER, 0), id, USER2).unwrap();
        assert_eq!(state.store.get_auction(id).unwrap().unwrap().authority, USER2);
        assert!(state.store.auctions_by_authority(&OWNER).unwrap().is_empty());
        assert_eq!(state.store.auctions_by_authority(&USER2).unwrap().len(), 1);
    }

    #[test]
    fn test_place_bid_escrows_and_refunds() {
        let mut state = setup_state(OWNER, OWNER);
        let id = started_auction(&mut state, PrizeType::AssetOnlyTransfer);
        fund(&mut state, BIDDER_A, 500);
        fund(&mut state, BIDDER_B, 500);
        let module = config().module_account;

        let settled = handle_place_bid(&mut state, &test_context(BIDDER_A, 1100), id, 100).unwrap();
        assert!(!settled);
        assert_eq!(state.ledger.balance(&BIDDER_A, "tok"), 400);
        assert_eq!(state.ledger.balance(&module, "tok"), 100);

        handle_place_bid(&mut state, &test_context(BIDDER_B, 1200), id, 101).unwrap();
        assert_eq!(state.ledger.balance(&BIDDER_A, "tok"), 500);
        assert_eq!(state.ledger.balance(&BIDDER_B, "tok"), 399);
        assert_eq!(state.ledger.balance(&module, "tok"), 101);

        let auction = state.store.get_auction(id).unwrap().unwrap();
        assert_eq!(auction.last_bid_amount, 101);
        assert_eq!(auction.last_bid_time, Some(1200));
        assert_eq!(state.store.get_bid(id).unwrap().unwrap().bidder, BIDDER_B);

        let metadata = state.store.get_bidder_metadata(&BIDDER_A).unwrap().unwrap();
        assert_eq!(metadata.last_bid, 100);
        assert_eq!(metadata.last_auction_id, id);
    }

    #[test]
    fn test_place_bid_rules() {
        let mut state = setup_state(OWNER, OWNER);
        let id = create(&mut state, PrizeType::AssetOnlyTransfer).unwrap();
        fund(&mut state, BIDDER_A, 10_000);

        // Not started yet
        let err = handle_place_bid(&mut state, &test_context(BIDDER_A, 1000), id, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        handle_start_auction(&mut state, &test_context(OWNER, 1000), id).unwrap();

        let err = handle_place_bid(&mut state, &test_context(BIDDER_A, 1000), id, 0).unwrap_err();
        assert_eq!(err, MarketplaceError::BidTooLow { required: 1, got: 0 });

        handle_place_bid(&mut state, &test_context(BIDDER_A, 1000), id, 10).unwrap();
        // Same amount does not clear the tick
        let err = handle_place_bid(&mut state, &test_context(BIDDER_B, 1000), id, 10).unwrap_err();
        assert_eq!(err, MarketplaceError::BidTooLow { required: 11, got: 10 });

        // Bidder B has no funds
        let err = handle_place_bid(&mut state, &test_context(BIDDER_B, 1000), id, 11).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        // Past the deadline
        let err =
            handle_place_bid(&mut state, &test_context(BIDDER_A, 1000 + 3601), id, 20).unwrap_err();
        assert_eq!(
            err,
            MarketplaceError::BiddingEnded {
                end_auction_at: 4600
            }
        );

        let err = handle_place_bid(&mut state, &test_context(BIDDER_A, 1000), 99, 20).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_instant_sale_settles_immediately() {
        let mut state = setup_state(OWNER, OWNER);
        let id = started_auction(&mut state, PrizeType::FullRightsTransfer);
        fund(&mut state, BIDDER_A, 5000);

        let settled = handle_place_bid(&mut state, &test_context(BIDDER_A, 1500), id, 1000).unwrap();
        assert!(settled);

        let auction = state.store.get_auction(id).unwrap().unwrap();
        assert_eq!(auction.state, AuctionState::Ended);
        assert_eq!(auction.ended_at, Some(1500));
        assert_eq!(auction.claimed, 1);
        assert_eq!(state.assets.get_asset(1).unwrap().owner, BIDDER_A);
        assert_eq!(state.assets.get_metadata(1).unwrap().update_authority, BIDDER_A);
        assert_eq!(state.ledger.balance(&OWNER, "tok"), 1000);

        let err = handle_place_bid(&mut state, &test_context(BIDDER_A, 1501), id, 2000).unwrap_err();
        assert_eq!(err, MarketplaceError::AlreadyEnded);
    }

    #[test]
    fn test_end_auction_without_bids_returns_prize() {
        for prize_type in [PrizeType::AssetOnlyTransfer, PrizeType::FullRightsTransfer] {
            let mut state = setup_state(OWNER, OWNER);
            let id = started_auction(&mut state, prize_type);

            handle_end_auction(&mut state, &test_context(OWNER, 1200), id).unwrap();

            let auction = state.store.get_auction(id).unwrap().unwrap();
            assert_eq!(auction.state, AuctionState::Ended);
            assert_eq!(auction.ended_at, Some(1200));
            assert_eq!(auction.claimed, 0);
            assert_eq!(state.assets.get_asset(1).unwrap().owner, OWNER);

            // Asset-only auctions never moved the metadata authority
            assert_eq!(state.assets.get_metadata(1).unwrap().update_authority, OWNER);
        }
    }

    #[test]
    fn test_end_auction_with_winner_and_cut() {
        let mut state = setup_state(OWNER, OWNER);
        state
            .store
            .set_params(&Params {
                auction_creation_fee: Coin::default(),
                marketplace_cut_bps: 250,
            })
            .unwrap();
        let id = started_auction(&mut state, PrizeType::AssetOnlyTransfer);
        fund(&mut state, BIDDER_A, 999);

        handle_place_bid(&mut state, &test_context(BIDDER_A, 1100), id, 999).unwrap();
        handle_end_auction(&mut state, &test_context(OWNER, 1200), id).unwrap();

        let auction = state.store.get_auction(id).unwrap().unwrap();
        assert_eq!(auction.state, AuctionState::Ended);
        assert_eq!(auction.claimed, 1);
        assert_eq!(state.assets.get_asset(1).unwrap().owner, BIDDER_A);
        // Metadata authority stays with the seller for asset-only auctions
        assert_eq!(state.assets.get_metadata(1).unwrap().update_authority, OWNER);

        // 999 * 2.5% = 24.975, rounded down
        assert_eq!(state.ledger.balance(&config().fee_collector, "tok"), 24);
        assert_eq!(state.ledger.balance(&OWNER, "tok"), 975);
        assert_eq!(state.ledger.balance(&config().module_account, "tok"), 0);
    }

    #[test]
    fn test_end_auction_failures() {
        let mut state = setup_state(OWNER, OWNER);
        let id = started_auction(&mut state, PrizeType::AssetOnlyTransfer);

        let err = handle_end_auction(&mut state, &test_context(OWNER, 1200), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = handle_end_auction(&mut state, &test_context(USER2, 1200), id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        handle_end_auction(&mut state, &test_context(OWNER, 1200), id).unwrap();
        let err = handle_end_auction(&mut state, &test_context(OWNER, 1300), id).unwrap_err();
        assert_eq!(err, MarketplaceError::AlreadyEnded);
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_end_auction_requires_start() {
        let mut state = setup_state(OWNER, OWNER);
        let id = create(&mut state, PrizeType::FullRightsTransfer).unwrap();

        let ctx = test_context(OWNER, 1200);
        let err = execute_call(&mut state, &ctx, MarketplaceCall::EndAuction { auction_id: id })
            .unwrap_err();
        assert_eq!(
            err,
            MarketplaceError::InvalidState {
                expected: AuctionState::Started,
                got: AuctionState::Created,
            }
        );

        let auction = state.store.get_auction(id).unwrap().unwrap();
        assert_eq!(auction.state, AuctionState::Created);
        assert_eq!(auction.ended_at, None);
        assert_eq!(state.assets.get_asset(1).unwrap().owner, config().module_account);
    }

    #[test]
    fn test_zero_floor_rejects_zero_bid() {
        let mut state = setup_state(OWNER, OWNER);
        let id = handle_create_auction(
            &mut state,
            &test_context(OWNER, 1000),
            1,
            PrizeType::AssetOnlyTransfer,
            "tok".to_string(),
            3600,
            0,
            0,
            5,
        )
        .unwrap();
        handle_start_auction(&mut state, &test_context(OWNER, 1000), id).unwrap();
        fund(&mut state, BIDDER_A, 100);

        let ctx = test_context(BIDDER_A, 1020);
        let err = execute_call(
            &mut state,
            &ctx,
            MarketplaceCall::PlaceBid {
                auction_id: id,
                amount: 0,
            },
        )
        .unwrap_err();
        assert_eq!(err, MarketplaceError::BidTooLow { required: 1, got: 0 });

        let auction = state.store.get_auction(id).unwrap().unwrap();
        assert_eq!(auction.last_bid_time, None);
        assert!(state.store.get_bid(id).unwrap().is_none());

        handle_place_bid(&mut state, &ctx, id, 1).unwrap();
        let auction = state.store.get_auction(id).unwrap().unwrap();
        assert_eq!(auction.last_bid_amount, 1);
        assert_eq!(auction.last_bid_time, Some(1020));

        // The resulting state survives a genesis round trip
        let exported = crate::genesis::export_genesis(&state.store).unwrap();
        let mut store = AuctionStore::new(crate::store::MemoryStore::new());
        crate::genesis::init_genesis(&mut store, &exported).unwrap();
        assert_eq!(store.inner(), state.store.inner());
    }

    #[test]
    fn test_end_auction_with_missing_bid_is_fatal() {
        let mut state = setup_state(OWNER, OWNER);
        let id = started_auction(&mut state, PrizeType::AssetOnlyTransfer);

        let mut auction = state.store.get_auction(id).unwrap().unwrap();
        auction.last_bid_amount = 100;
        state.store.set_auction(&auction).unwrap();

        let ctx = test_context(OWNER, 1200);
        let err = execute_call(&mut state, &ctx, MarketplaceCall::EndAuction { auction_id: id })
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(
            state.store.get_auction(id).unwrap().unwrap().state,
            AuctionState::Started
        );
    }

    #[test]
    fn test_delete_auction() {
        let mut state = setup_state(OWNER, OWNER);
        let id = started_auction(&mut state, PrizeType::AssetOnlyTransfer);

        let err = handle_delete_auction(&mut state, &test_context(OWNER, 1200), id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        handle_end_auction(&mut state, &test_context(OWNER, 1200), id).unwrap();
        let err = handle_delete_auction(&mut state, &test_context(USER2, 1200), id).unwrap_err();
        assert_eq!(err, MarketplaceError::NotAuthorized);

        handle_delete_auction(&mut state, &test_context(OWNER, 1200), id).unwrap();
        assert!(state.store.get_auction(id).unwrap().is_none());
        assert!(state.store.auctions_by_authority(&OWNER).unwrap().is_empty());
        // Ids are never reused
        assert_eq!(state.store.next_auction_id().unwrap(), 2);
    }

    #[test]
    fn test_update_params() {
        let mut state = setup_state(OWNER, OWNER);
        let params = Params {
            auction_creation_fee: Coin::new("tok", 10),
            marketplace_cut_bps: 100,
        };

        let err = handle_update_params(&mut state, &test_context(OWNER, 0), params.clone())
            .unwrap_err();
        assert_eq!(err, MarketplaceError::NotAuthorized);

        let governance = config().governance;
        let invalid = Params {
            marketplace_cut_bps: 10_001,
            ..params.clone()
        };
        let err = handle_update_params(&mut state, &test_context(governance, 0), invalid)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        handle_update_params(&mut state, &test_context(governance, 0), params.clone()).unwrap();
        assert_eq!(state.store.params().unwrap(), params);
    }

    #[test]
    fn test_execute_call_rolls_back_on_error() {
        let mut state = setup_state(OWNER, OWNER);
        state
            .store
            .set_params(&Params {
                auction_creation_fee: Coin::new("tok", 2000),
                marketplace_cut_bps: 0,
            })
            .unwrap();
        fund(&mut state, OWNER, 1999);
        let before = state.store.inner().clone();

        let call = MarketplaceCall::CreateAuction {
            asset_id: 1,
            prize_type: PrizeType::AssetOnlyTransfer,
            bid_denom: "tok".to_string(),
            duration: 3600,
            price_floor: 1,
            instant_sale_price: 0,
            tick_size: 1000,
        };
        let err = execute_call(&mut state, &test_context(OWNER, 0), call).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(state.store.inner(), &before);
        assert_eq!(state.assets.get_asset(1).unwrap().owner, OWNER);
    }

    #[test]
    fn test_marketplace_cut_rounds_down() {
        assert_eq!(marketplace_cut(999, 250).unwrap(), 24);
        assert_eq!(marketplace_cut(1000, 0).unwrap(), 0);
        assert_eq!(marketplace_cut(u64::MAX, 10_000).unwrap(), u64::MAX);
        assert!(marketplace_cut(1, 10_001).is_err());
    }

    #[test]
    fn test_min_next_bid() {
        let mut state = setup_state(OWNER, OWNER);
        let id = create(&mut state, PrizeType::AssetOnlyTransfer).unwrap();
        let mut auction = state.store.get_auction(id).unwrap().unwrap();
        assert_eq!(min_next_bid(&auction), Some(1));

        auction.price_floor = 0;
        assert_eq!(min_next_bid(&auction), Some(1));

        auction.last_bid_amount = 50;
        assert_eq!(min_next_bid(&auction), Some(51));

        auction.last_bid_amount = u64::MAX;
        assert_eq!(min_next_bid(&auction), None);
    }
}
