//! End-to-end integration tests for the marketplace module.
//!
//! These tests drive complete auction lifecycles through the atomic executor:
//! 1. Asset and balance seeding
//! 2. Auction creation and escrow
//! 3. Bidding with refunds
//! 4. Settlement of prize, proceeds and marketplace cut
//! 5. Genesis export and re-import
