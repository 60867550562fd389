//! Bid storage backends
//!
//! A store owns every accepted bid, indexed both by item and by user.
//! Implementations must make each `insert` atomic with respect to all the
//! reads: a bid is visible in both indexes at once, or in neither.
mod in_memory;
pub mod postgres;

pub use self::in_memory::*;

use crate::auction::{Bid, ItemId, UserId};
use anyhow::Result;
use std::sync::Arc;

/// A store of accepted bids
///
/// Must be thread-safe; the ledger shares one instance between all request
/// handlers.
pub trait BidStore {
    /// Append a validated bid to its item and user histories.
    fn insert(&self, bid: &Bid) -> Result<()>;

    /// Bids for the item, in acceptance order.
    fn bids_for_item(&self, item_id: &ItemId) -> Result<Vec<Bid>>;

    /// Bids placed by the user across all items, in acceptance order.
    fn bids_for_user(&self, user_id: &UserId) -> Result<Vec<Bid>>;

    fn winning_bid(&self, item_id: &ItemId) -> Result<Option<Bid>>;
}

pub type SharedBidStore = Arc<dyn BidStore + Send + Sync + 'static>;
