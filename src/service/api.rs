//! HTTP API
//!
//! Thin axum layer over the [`BidLedger`](crate::ledger::BidLedger):
//! decodes requests, runs the blocking ledger calls off the async workers
//! and maps ledger errors to status codes.
use crate::{
    auction::{Amount, Bid, Timestamp},
    ledger::{self, SharedBidLedger},
    service::LoopService,
};
use anyhow::{bail, format_err, Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{future::Future, net::SocketAddr, time::Duration};
use tokio::{runtime::Runtime, sync::oneshot};
use tower_http::{
    compression::CompressionLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

mod response;
pub use self::response::*;

pub const URL_BIDS: &str = "/api/v1/bids";
pub const URL_ITEM_BIDS: &str = "/api/v1/bids/:itemuuid";
pub const URL_ITEM_WINNING_BID: &str = "/api/v1/bids/:itemuuid/winning";
pub const URL_USER_BIDS: &str = "/api/v1/users/:useruuid/bids";
pub const URL_HEALTHZ: &str = "/healthz";

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Body of `POST /api/v1/bids`
///
/// Identifiers stay strings here so that malformed ones reach the ledger
/// and get reported as such.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BidRequest {
    pub useruuid: String,
    pub itemuuid: String,
    pub timestamp: Timestamp,
    pub amount: Amount,
}

type ApiResult<T> = std::result::Result<ApiResponse<T>, ApiError>;

/// Run a ledger call on the blocking pool; stores may do I/O.
async fn with_ledger<T, F>(ledger: SharedBidLedger, f: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce(&ledger::BidLedger) -> ledger::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&*ledger))
        .await
        .map_err(|e| ApiError::internal(format!("ledger task failed: {e}")))?
        .map_err(ApiError::from)
}

async fn post_bid(
    State(ledger): State<SharedBidLedger>,
    payload: std::result::Result<Json<BidRequest>, JsonRejection>,
) -> ApiResult<Bid> {
    let Json(req) = payload?;
    let bid = with_ledger(ledger, move |ledger| {
        ledger.submit_bid(&req.useruuid, &req.itemuuid, req.timestamp, req.amount)
    })
    .await?;
    Ok(ApiResponse::ok("Bid accepted", bid))
}

async fn get_item_bids(
    State(ledger): State<SharedBidLedger>,
    Path(item_uuid): Path<String>,
) -> ApiResult<Vec<Bid>> {
    let bids = with_ledger(ledger, move |ledger| ledger.list_bids_by_item(&item_uuid)).await?;
    Ok(ApiResponse::ok("Bids for item", bids))
}

async fn get_winning_bid(
    State(ledger): State<SharedBidLedger>,
    Path(item_uuid): Path<String>,
) -> ApiResult<Bid> {
    let bid = with_ledger(ledger, move |ledger| ledger.get_winning_bid(&item_uuid)).await?;
    Ok(ApiResponse::ok("Winning bid for item", bid))
}

async fn get_user_bids(
    State(ledger): State<SharedBidLedger>,
    Path(user_uuid): Path<String>,
) -> ApiResult<Vec<Bid>> {
    let bids = with_ledger(ledger, move |ledger| ledger.list_bids_by_user(&user_uuid)).await?;
    Ok(ApiResponse::ok("Bids by user", bids))
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "No such resource")
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

pub fn router(ledger: SharedBidLedger) -> Router {
    Router::new()
        .route(
            URL_HEALTHZ,
            get(|| async { "Healthy" }).fallback(method_not_allowed),
        )
        .route(URL_BIDS, post(post_bid).fallback(method_not_allowed))
        .route(
            URL_ITEM_BIDS,
            get(get_item_bids).fallback(method_not_allowed),
        )
        .route(
            URL_ITEM_WINNING_BID,
            get(get_winning_bid).fallback(method_not_allowed),
        )
        .route(
            URL_USER_BIDS,
            get(get_user_bids).fallback(method_not_allowed),
        )
        .fallback(not_found)
        // access log: method, uri, status and latency of every request
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .with_state(ledger)
}

/// Serve the API on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: std::net::TcpListener,
    ledger: SharedBidLedger,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    axum::Server::from_tcp(listener)?
        .serve(router(ledger).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// The HTTP API as a [`LoopService`]
///
/// Owns the tokio runtime the server runs on. Dropping it shuts the server
/// down gracefully.
pub struct HttpApi {
    runtime: Option<Runtime>,
    server_task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_rx: oneshot::Receiver<Result<()>>,
    local_addr: SocketAddr,
}

impl HttpApi {
    pub fn new(address: &str, ledger: SharedBidLedger) -> Result<Self> {
        let runtime = Runtime::new()?;

        let listener = std::net::TcpListener::bind(address)
            .with_context(|| format!("Failed to bind to {address}"))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let (tx, rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server_task = runtime.spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            let res = serve(listener, ledger, shutdown)
                .await
                .with_context(|| format!("Failed to run http server on {local_addr}"));
            // the receiver is gone only if `HttpApi` was dropped
            let _ = tx.send(res);
        });
        info!(%local_addr, "http api listening");

        Ok(Self {
            runtime: Some(runtime),
            server_task: Some(server_task),
            shutdown_tx: Some(shutdown_tx),
            server_rx: rx,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl LoopService for HttpApi {
    fn run_iteration(&mut self) -> Result<()> {
        // don't hog the cpu
        std::thread::sleep(Duration::from_millis(100));

        match self.server_rx.try_recv() {
            Ok(Ok(())) => bail!("http server stopped"),
            Ok(Err(e)) => Err(e),
            Err(oneshot::error::TryRecvError::Empty) => Ok(()),
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(format_err!("http server died without leaving a response?!"))
            }
        }
    }
}

impl Drop for HttpApi {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let (Some(runtime), Some(server_task)) =
            (self.runtime.take(), self.server_task.take())
        {
            // let in-flight requests finish
            if runtime
                .block_on(tokio::time::timeout(SHUTDOWN_TIMEOUT, server_task))
                .is_err()
            {
                warn!(local_addr = %self.local_addr, "http api did not shut down in time");
            }
            runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
        }
        info!(local_addr = %self.local_addr, "http api stopped");
    }
}
