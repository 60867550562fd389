use super::*;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;

/// Position of a bid in global acceptance order
type Seq = usize;

#[derive(Default)]
struct ItemBids {
    bids: Vec<Seq>,
    winning: Option<Seq>,
}

#[derive(Default)]
struct InMemoryBidStoreInner {
    accepted: Vec<Bid>,
    items: HashMap<ItemId, ItemBids>,
    users: HashMap<UserId, Vec<Seq>>,
}

impl InMemoryBidStoreInner {
    fn collect(&self, seqs: Option<&Vec<Seq>>) -> Vec<Bid> {
        seqs.map(|seqs| seqs.iter().map(|&seq| self.accepted[seq]).collect())
            .unwrap_or_default()
    }
}

/// Bid store kept entirely in process memory.
///
/// A single lock covers the item index, the user index and the winner cache,
/// so writers are serialized and readers always see whole bids.
#[derive(Default)]
pub struct InMemoryBidStore {
    inner: RwLock<InMemoryBidStoreInner>,
}

impl InMemoryBidStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> SharedBidStore {
        Arc::new(Self::new())
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryBidStoreInner> {
        self.inner.read()
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryBidStoreInner> {
        self.inner.write()
    }
}

impl BidStore for InMemoryBidStore {
    fn insert(&self, bid: &Bid) -> Result<()> {
        let mut write = self.write();
        let inner = &mut *write;

        let seq = inner.accepted.len();
        inner.accepted.push(*bid);

        let item = inner.items.entry(bid.item_id).or_default();
        item.bids.push(seq);
        match item.winning {
            Some(current) if !bid.outbids(&inner.accepted[current]) => {}
            _ => item.winning = Some(seq),
        }

        inner.users.entry(bid.user_id).or_default().push(seq);

        Ok(())
    }

    fn bids_for_item(&self, item_id: &ItemId) -> Result<Vec<Bid>> {
        let read = self.read();
        Ok(read.collect(read.items.get(item_id).map(|item| &item.bids)))
    }

    fn bids_for_user(&self, user_id: &UserId) -> Result<Vec<Bid>> {
        let read = self.read();
        Ok(read.collect(read.users.get(user_id)))
    }

    fn winning_bid(&self, item_id: &ItemId) -> Result<Option<Bid>> {
        let read = self.read();
        Ok(read
            .items
            .get(item_id)
            .and_then(|item| item.winning)
            .map(|seq| read.accepted[seq]))
    }
}
