//! Bid Ledger
//!
//! Validates incoming bids and answers the item, user and winner queries
//! on top of a [`BidStore`].
use crate::auction::{validate_amount, Amount, Bid, ItemId, Timestamp, UserId, ValidationError};
use crate::store::{BidStore, SharedBidStore};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0}")]
    InvalidIdentifier(ValidationError),
    #[error("{0}")]
    InvalidAmount(ValidationError),
    #[error("item {0} is not available for bidding")]
    ItemNotBiddable(ItemId),
    #[error("no bids for item {0}")]
    NoBidsForItem(ItemId),
    #[error("bid store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<ValidationError> for LedgerError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::InvalidIdentifier { .. } => LedgerError::InvalidIdentifier(e),
            ValidationError::InvalidAmount(_) => LedgerError::InvalidAmount(e),
        }
    }
}

/// Items open for bidding
///
/// An empty set leaves the ledger open to any item.
#[derive(Debug, Clone, Default)]
pub struct BiddableItems(HashSet<ItemId>);

impl BiddableItems {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn allows(&self, item_id: &ItemId) -> bool {
        self.0.is_empty() || self.0.contains(item_id)
    }
}

impl FromIterator<ItemId> for BiddableItems {
    fn from_iter<T: IntoIterator<Item = ItemId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub struct BidLedger {
    store: SharedBidStore,
    biddable: BiddableItems,
}

pub type SharedBidLedger = Arc<BidLedger>;

impl BidLedger {
    pub fn new(store: SharedBidStore, biddable: BiddableItems) -> Self {
        Self { store, biddable }
    }

    pub fn new_shared(store: SharedBidStore, biddable: BiddableItems) -> SharedBidLedger {
        Arc::new(Self::new(store, biddable))
    }

    /// Validate a bid and append it to the ledger.
    ///
    /// Nothing is recorded unless every check passes. Bids lower than the
    /// current winner are accepted; they just never win.
    pub fn submit_bid(
        &self,
        user_id: &str,
        item_id: &str,
        timestamp: Timestamp,
        amount: Amount,
    ) -> Result<Bid> {
        let bid = self.validate(user_id, item_id, timestamp, amount).map_err(|e| {
            debug!(user_id, item_id, amount, error = %e, "bid rejected");
            e
        })?;

        self.store.insert(&bid)?;
        info!(
            item = %bid.item_id,
            user = %bid.user_id,
            timestamp = bid.timestamp,
            amount = bid.amount,
            "bid accepted"
        );
        Ok(bid)
    }

    fn validate(
        &self,
        user_id: &str,
        item_id: &str,
        timestamp: Timestamp,
        amount: Amount,
    ) -> Result<Bid> {
        let bid = Bid {
            user_id: user_id.parse()?,
            item_id: item_id.parse()?,
            timestamp,
            amount: validate_amount(amount)?,
        };

        if !self.biddable.allows(&bid.item_id) {
            return Err(LedgerError::ItemNotBiddable(bid.item_id));
        }
        Ok(bid)
    }

    /// All bids for the item in acceptance order; empty if there are none.
    pub fn list_bids_by_item(&self, item_id: &str) -> Result<Vec<Bid>> {
        let item_id: ItemId = item_id.parse()?;
        Ok(self.store.bids_for_item(&item_id)?)
    }

    /// All bids placed by the user in acceptance order; empty if there are none.
    pub fn list_bids_by_user(&self, user_id: &str) -> Result<Vec<Bid>> {
        let user_id: UserId = user_id.parse()?;
        Ok(self.store.bids_for_user(&user_id)?)
    }

    pub fn get_winning_bid(&self, item_id: &str) -> Result<Bid> {
        let item_id: ItemId = item_id.parse()?;
        self.store
            .winning_bid(&item_id)?
            .ok_or(LedgerError::NoBidsForItem(item_id))
    }
}
