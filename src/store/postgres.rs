use super::*;
use anyhow::Context;
use r2d2_postgres::{
    postgres::{self, NoTls, Row},
    PostgresConnectionManager,
};
use tracing::info;
use uuid::Uuid;

type Pool = r2d2::Pool<PostgresConnectionManager<NoTls>>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS bids (
    seq BIGSERIAL PRIMARY KEY,
    item_id UUID NOT NULL,
    user_id UUID NOT NULL,
    timestamp BIGINT NOT NULL,
    amount DOUBLE PRECISION NOT NULL
);
CREATE INDEX IF NOT EXISTS bids_item_id_seq ON bids (item_id, seq);
CREATE INDEX IF NOT EXISTS bids_user_id_seq ON bids (user_id, seq);
";

// Self-conflicting but leaves plain reads alone: writers take `seq` values in
// commit order.
const LOCK_BIDS_FOR_INSERT: &str = "LOCK TABLE bids IN SHARE ROW EXCLUSIVE MODE";

const INSERT_BID: &str =
    "INSERT INTO bids (item_id, user_id, timestamp, amount) VALUES ($1, $2, $3, $4)";

const SELECT_ITEM_BIDS: &str =
    "SELECT item_id, user_id, timestamp, amount FROM bids WHERE item_id = $1 ORDER BY seq";

const SELECT_USER_BIDS: &str =
    "SELECT item_id, user_id, timestamp, amount FROM bids WHERE user_id = $1 ORDER BY seq";

// Must agree with `Bid::outbids`.
const SELECT_WINNING_BID: &str = "SELECT item_id, user_id, timestamp, amount FROM bids \
     WHERE item_id = $1 ORDER BY amount DESC, timestamp ASC, seq ASC LIMIT 1";

/// Bid store backed by a Postgres `bids` table.
///
/// The `seq` column records acceptance order. Inserts are serialized on a
/// table lock so that a bid never becomes visible ahead of one with a lower
/// `seq`.
#[derive(Debug, Clone)]
pub struct PostgresBidStore {
    pool: Pool,
}

impl PostgresBidStore {
    pub fn connect(url: &str, pool_size: u32) -> Result<Self> {
        let config: postgres::Config = url.parse().context("invalid postgres url")?;
        let pool = r2d2::Pool::builder()
            .max_size(pool_size)
            .build(PostgresConnectionManager::new(config, NoTls))
            .context("failed to build postgres connection pool")?;

        let store = Self { pool };
        store.ensure_schema()?;
        info!(pool_size, "connected to postgres");
        Ok(store)
    }

    pub fn new_shared(url: &str, pool_size: u32) -> Result<SharedBidStore> {
        Ok(Arc::new(Self::connect(url, pool_size)?))
    }

    fn ensure_schema(&self) -> Result<()> {
        self.pool
            .get()?
            .batch_execute(SCHEMA)
            .context("failed to create bids schema")
    }

    fn query_bids(&self, query: &str, id: &Uuid) -> Result<Vec<Bid>> {
        self.pool
            .get()?
            .query(query, &[id])?
            .iter()
            .map(row_to_bid)
            .collect()
    }
}

fn row_to_bid(row: &Row) -> Result<Bid> {
    Ok(Bid {
        item_id: row.try_get::<'_, _, Uuid>("item_id")?.into(),
        user_id: row.try_get::<'_, _, Uuid>("user_id")?.into(),
        timestamp: row.try_get("timestamp")?,
        amount: row.try_get("amount")?,
    })
}

impl BidStore for PostgresBidStore {
    fn insert(&self, bid: &Bid) -> Result<()> {
        let mut conn = self.pool.get()?;
        let mut transaction = conn.transaction()?;
        transaction.batch_execute(LOCK_BIDS_FOR_INSERT)?;
        transaction.execute(
            INSERT_BID,
            &[
                bid.item_id.as_uuid(),
                bid.user_id.as_uuid(),
                &bid.timestamp,
                &bid.amount,
            ],
        )?;
        transaction.commit()?;
        Ok(())
    }

    fn bids_for_item(&self, item_id: &ItemId) -> Result<Vec<Bid>> {
        self.query_bids(SELECT_ITEM_BIDS, item_id.as_uuid())
    }

    fn bids_for_user(&self, user_id: &UserId) -> Result<Vec<Bid>> {
        self.query_bids(SELECT_USER_BIDS, user_id.as_uuid())
    }

    fn winning_bid(&self, item_id: &ItemId) -> Result<Option<Bid>> {
        self.pool
            .get()?
            .query_opt(SELECT_WINNING_BID, &[item_id.as_uuid()])?
            .as_ref()
            .map(row_to_bid)
            .transpose()
    }
}
