use crate::{
    auction::{resolve_winner, Bid, ItemId, UserId},
    ledger::{BidLedger, BiddableItems, LedgerError, SharedBidLedger},
    store::InMemoryBidStore,
};
use anyhow::Result;
use proptest::prelude::*;
use std::{collections::HashSet, thread};
use uuid::Uuid;

const ITEMS: [&str; 3] = [
    "b2f9ee6d-79fe-4b14-9c19-35a69a89219a",
    "b16ab43e-aa13-4079-b8c5-592e81312c01",
    "7f272d43-0ff2-4e0f-9ebc-589eae48e3ad",
];
const USERS: [&str; 3] = [
    "1c916ab6-255b-4a36-9574-e456e0f774c9",
    "215248b5-8402-4211-93c0-9f71a93e69a9",
    "e5129c2c-718e-4ce6-b327-e74855967ab8",
];

fn new_ledger() -> SharedBidLedger {
    BidLedger::new_shared(InMemoryBidStore::new_shared(), BiddableItems::any())
}

#[test]
fn increasing_bids_from_one_user() -> Result<()> {
    let ledger = new_ledger();

    for amount in [32.0, 33.0, 99.0, 121.0] {
        ledger.submit_bid(USERS[0], ITEMS[0], 12312321321, amount)?;
    }

    let winner = ledger.get_winning_bid(ITEMS[0])?;
    assert_eq!(winner.amount, 121.0);
    assert_eq!(
        ledger
            .list_bids_by_item(ITEMS[0])?
            .iter()
            .map(|b| b.amount)
            .collect::<Vec<_>>(),
        vec![32.0, 33.0, 99.0, 121.0]
    );
    Ok(())
}

#[test]
fn malformed_item_never_shows_up() -> Result<()> {
    let ledger = new_ledger();

    ledger.submit_bid(USERS[0], ITEMS[0], 1, 10.0)?;
    assert!(matches!(
        ledger.submit_bid(USERS[0], "b2f9ee6d89219a", 1, 500.0),
        Err(LedgerError::InvalidIdentifier(_))
    ));

    assert_eq!(ledger.list_bids_by_user(USERS[0])?.len(), 1);
    assert_eq!(ledger.get_winning_bid(ITEMS[0])?.amount, 10.0);
    Ok(())
}

#[test]
fn user_bids_span_items_in_acceptance_order() -> Result<()> {
    let ledger = new_ledger();

    let first = ledger.submit_bid(USERS[0], ITEMS[1], 5, 30.0)?;
    ledger.submit_bid(USERS[1], ITEMS[1], 5, 31.0)?;
    let second = ledger.submit_bid(USERS[0], ITEMS[0], 2, 32.5)?;

    assert_eq!(ledger.list_bids_by_user(USERS[0])?, vec![first, second]);
    assert!(ledger.list_bids_by_user(USERS[2])?.is_empty());
    Ok(())
}

#[test]
fn equal_amounts_prefer_earlier_timestamp_then_first_accepted() -> Result<()> {
    let ledger = new_ledger();

    ledger.submit_bid(USERS[0], ITEMS[0], 20, 50.0)?;
    ledger.submit_bid(USERS[1], ITEMS[0], 10, 50.0)?;
    ledger.submit_bid(USERS[2], ITEMS[0], 10, 50.0)?;

    let winner = ledger.get_winning_bid(ITEMS[0])?;
    assert_eq!(winner.user_id, USERS[1].parse::<UserId>()?);
    assert_eq!(winner.timestamp, 10);
    Ok(())
}

#[test]
fn concurrent_submissions_on_one_item() -> Result<()> {
    const THREADS: i64 = 8;
    const BIDS_PER_THREAD: i64 = 250;

    let ledger = new_ledger();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let ledger = ledger.clone();
            thread::spawn(move || -> Result<()> {
                let user = Uuid::new_v4().to_string();
                for i in 0..BIDS_PER_THREAD {
                    let amount = (t * BIDS_PER_THREAD + i) as f64;
                    ledger.submit_bid(&user, ITEMS[0], i, amount)?;
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("submitter panicked")?;
    }

    let bids = ledger.list_bids_by_item(ITEMS[0])?;
    assert_eq!(bids.len() as i64, THREADS * BIDS_PER_THREAD);

    // amounts are unique per submission, so duplicates or losses would show
    let amounts: HashSet<i64> = bids.iter().map(|b| b.amount as i64).collect();
    assert_eq!(amounts.len() as i64, THREADS * BIDS_PER_THREAD);

    let winner = ledger.get_winning_bid(ITEMS[0])?;
    assert_eq!(winner.amount, (THREADS * BIDS_PER_THREAD - 1) as f64);

    // each submitter's own bids keep their submission order
    for bid in &bids {
        let own: Vec<_> = ledger
            .list_bids_by_user(&bid.user_id.to_string())?
            .iter()
            .map(|b| b.timestamp)
            .collect();
        assert_eq!(own, (0..BIDS_PER_THREAD).collect::<Vec<_>>());
    }
    Ok(())
}

#[test]
fn concurrent_readers_see_whole_bids() -> Result<()> {
    let ledger = new_ledger();

    let writer = {
        let ledger = ledger.clone();
        thread::spawn(move || -> Result<()> {
            for i in 0..1000 {
                ledger.submit_bid(USERS[0], ITEMS[0], i, i as f64)?;
            }
            Ok(())
        })
    };

    let mut last_seen = 0;
    while last_seen < 1000 {
        let by_item = ledger.list_bids_by_item(ITEMS[0])?;
        assert!(by_item.len() >= last_seen);
        for (i, bid) in by_item.iter().enumerate() {
            assert_eq!(bid.timestamp, i as i64);
        }
        if let Some(last) = by_item.last() {
            assert!(ledger.get_winning_bid(ITEMS[0])?.amount >= last.amount);
        }
        last_seen = by_item.len();
    }

    writer.join().expect("writer panicked")?;
    Ok(())
}

fn arb_submission() -> impl Strategy<Value = (usize, usize, i64, u8)> {
    // few distinct values so that ties are common
    (0..ITEMS.len(), 0..USERS.len(), 0i64..4, 0u8..6)
}

proptest! {
    #[test]
    fn ledger_matches_a_linear_scan(submissions in prop::collection::vec(arb_submission(), 0..60)) {
        let ledger = new_ledger();

        let mut accepted: Vec<Bid> = Vec::new();
        for (item, user, timestamp, amount) in submissions {
            let bid = ledger
                .submit_bid(USERS[user], ITEMS[item], timestamp, f64::from(amount))
                .unwrap();
            accepted.push(bid);
        }

        for item in ITEMS {
            let item_id: ItemId = item.parse().unwrap();
            let expected: Vec<Bid> = accepted
                .iter()
                .filter(|b| b.item_id == item_id)
                .copied()
                .collect();

            prop_assert_eq!(&ledger.list_bids_by_item(item).unwrap(), &expected);
            match resolve_winner(&expected) {
                Some(winner) => {
                    let got = ledger.get_winning_bid(item).unwrap();
                    prop_assert_eq!(&got, winner);
                    prop_assert!(expected.iter().all(|b| b.amount <= got.amount));
                }
                None => prop_assert!(matches!(
                    ledger.get_winning_bid(item),
                    Err(LedgerError::NoBidsForItem(_))
                )),
            }
        }

        for user in USERS {
            let user_id: UserId = user.parse().unwrap();
            let expected: Vec<Bid> = accepted
                .iter()
                .filter(|b| b.user_id == user_id)
                .copied()
                .collect();
            prop_assert_eq!(ledger.list_bids_by_user(user).unwrap(), expected);
        }
    }
}
