use crate::beacon_chain::{BeaconNode, BeaconNodeHttp, Slot};
use crate::env::EnvConfig;
use crate::execution_chain::{ExecutionNode, ExecutionNodeHttp};
use crate::explorer::EtherscanApi;
use crate::health::HealthCheckable;
use crate::rewards::{
    FeeCalculator, LastTransactionHeuristic, RewardComposer, RewardError, RewardMode,
    RewardResult,
};
use crate::server::health::ServerHealth;
use crate::sync_duties::get_sync_duties;
use crate::upstream::http_client;
use anyhow::Result;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tracing::{error, info, warn};

mod health;

const INVALID_SLOT_NUMBER: &str = "Invalid slot number";
const INVALID_BLOCK_NUMBER: &str = "Invalid block number";
const SLOT_IN_FUTURE: &str = "Slot is in the future";

pub struct State {
    pub beacon_node: Arc<dyn BeaconNode>,
    pub composer: RewardComposer,
    pub health: ServerHealth,
    pub reward_mode: RewardMode,
}

pub type StateExtension = Extension<Arc<State>>;

#[derive(Debug, Serialize)]
struct SyncDuties {
    validators: Vec<String>,
}

enum ApiError {
    BadRequest(&'static str),
    Reward(RewardError),
}

impl From<RewardError> for ApiError {
    fn from(err: RewardError) -> Self {
        ApiError::Reward(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.to_string()),
            ApiError::Reward(err) => match err {
                RewardError::InFuture(_) => (StatusCode::BAD_REQUEST, SLOT_IN_FUTURE.to_string()),
                RewardError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                RewardError::UpstreamFetch(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
                RewardError::Decode(_) | RewardError::Computation(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                }
            },
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Negative slots are well-formed numbers naming a slot that never existed.
fn parse_slot(text: &str) -> Result<Slot, ApiError> {
    let slot = text
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest(INVALID_SLOT_NUMBER))?;
    u64::try_from(slot)
        .map(Slot)
        .map_err(|_| RewardError::NotFound(format!("slot {slot} does not exist")).into())
}

impl State {
    /// Feeds the outcome of a request that went upstream into the health check.
    fn record<T>(&self, result: &Result<T, RewardError>) {
        match result {
            Ok(_) | Err(RewardError::NotFound(_)) => self.health.set_upstream_ok(),
            Err(err @ (RewardError::UpstreamFetch(_) | RewardError::Decode(_))) => {
                warn!(%err, "upstream call failed");
                self.health.set_upstream_failed();
            }
            Err(RewardError::Computation(message)) => {
                error!(%message, "reward computation failed");
            }
            Err(RewardError::InFuture(_)) => (),
        }
    }
}

async fn get_block_reward(
    state: StateExtension,
    Path(slot): Path<String>,
) -> Result<Json<RewardResult>, ApiError> {
    let slot = parse_slot(&slot)?;
    let now: DateTime<Utc> = Utc::now();
    let result = state
        .composer
        .reward_for_slot(slot, state.reward_mode, &now)
        .await;
    state.record(&result);
    Ok(Json(result?))
}

async fn get_block_reward_by_height(
    state: StateExtension,
    Path(height): Path<String>,
) -> Result<Json<RewardResult>, ApiError> {
    let height = height
        .parse::<u64>()
        .map_err(|_| ApiError::BadRequest(INVALID_BLOCK_NUMBER))?;
    let result = state.composer.reward_for_block(height).await;
    state.record(&result);
    Ok(Json(result?))
}

async fn get_sync_duties_for_slot(
    state: StateExtension,
    Path(slot): Path<String>,
) -> Result<Json<SyncDuties>, ApiError> {
    let slot = parse_slot(&slot)?;
    let now: DateTime<Utc> = Utc::now();
    let result = get_sync_duties(
        state.beacon_node.as_ref(),
        state.composer.clock(),
        slot,
        &now,
    )
    .await;
    state.record(&result);
    Ok(Json(SyncDuties {
        validators: result?,
    }))
}

pub fn router(shared_state: Arc<State>) -> Router {
    Router::new()
        .route("/blockreward/:slot", get(get_block_reward))
        .route("/blockreward/height/:height", get(get_block_reward_by_height))
        .route("/syncduties/:slot", get(get_sync_duties_for_slot))
        .route(
            "/healthz",
            get(|state: StateExtension| async move {
                state.health.health_status().into_response()
            }),
        )
        .layer(
            ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .layer(Extension(shared_state)),
        )
}

pub async fn start_server(config: &EnvConfig) -> Result<()> {
    info!(mode = %config.reward_mode, "starting proposer rewards server");
    let started_on = Utc::now();

    let client = http_client(config.upstream_timeout)?;
    let beacon_node: Arc<dyn BeaconNode> =
        Arc::new(BeaconNodeHttp::new(&config.beacon_url, client.clone()));
    let execution_node: Arc<dyn ExecutionNode> =
        Arc::new(ExecutionNodeHttp::new(&config.execution_url, client.clone()));
    let explorer = Arc::new(EtherscanApi::new(
        &config.explorer_url,
        &config.etherscan_api_key,
        client,
    ));

    let composer = RewardComposer::new(
        beacon_node.clone(),
        execution_node.clone(),
        Arc::new(LastTransactionHeuristic::new(explorer, execution_node.clone())),
        FeeCalculator::new(execution_node, config.receipt_fetch_delay),
        config.slot_clock()?,
    );

    let shared_state = Arc::new(State {
        beacon_node,
        composer,
        health: ServerHealth::new(started_on),
        reward_mode: config.reward_mode,
    });

    let app = router(shared_state);
    let socket_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%socket_addr, "listening");

    axum::Server::bind(&socket_addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
