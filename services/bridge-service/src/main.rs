use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use sb_bridge::{ConnectError, ConnectOutcome, DetectionEvent, DetectionSender, WalletBridge};
use sb_controller::{ControllerCallFailed, ControllerHandle};
use sb_types::{
    ConnectionView, CreateCollectionParams, CreateTokenParams, IssueNftParams, IssueSptParams,
    MintedToken, TransactionResult, TransferOwnershipParams, UpdateAssetParams,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

mod sim;

use sim::SimulatedWallet;

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct ConnectResponse {
    status: &'static str,
}

#[derive(Debug, Deserialize)]
struct AddressQuery {
    address: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddressValidResponse {
    address: String,
    valid: bool,
}

#[derive(Debug, Deserialize)]
struct SimulateUpdateRequest {
    balance: Option<f64>,
    locked: Option<bool>,
}

#[derive(Debug, Serialize)]
struct SimulateResponse {
    applied: bool,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Clone)]
struct AppState {
    bridge: Arc<WalletBridge>,
    detector: DetectionSender,
    sim: Arc<SimulatedWallet>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (bridge, detector) = WalletBridge::spawn();
    let state = AppState {
        bridge,
        detector,
        sim: SimulatedWallet::new(),
    };

    // The simulated extension announces itself at page load, as the real
    // one does via its broadcast event.
    state
        .detector
        .announce(DetectionEvent::installed(state.sim.clone().handle()));

    let app = router(state);

    let addr: SocketAddr = std::env::var("BRIDGE_SERVICE_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_owned())
        .parse()?;
    info!("bridge-service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/connection", get(connection))
        .route("/connect", post(connect))
        .route("/tokens", get(tokens))
        .route("/address/valid", get(address_valid))
        .route("/assets/token", post(create_token))
        .route("/assets/nft", post(issue_nft))
        .route("/assets/spt", post(issue_spt))
        .route("/assets/update", post(update_asset))
        .route("/assets/transfer", post(transfer_ownership))
        .route("/assets/collection", post(create_collection))
        .route("/simulate/announce", post(simulate_announce))
        .route("/simulate/remove", post(simulate_remove))
        .route("/simulate/update", post(simulate_update))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "bridge-service",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "bridge-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn connection(State(state): State<AppState>) -> Json<ConnectionView> {
    Json(state.bridge.store().get().view())
}

async fn connect(State(state): State<AppState>) -> ApiResult<ConnectResponse> {
    match state.bridge.connect().await {
        Ok(ConnectOutcome::Connected) => Ok(Json(ConnectResponse {
            status: "connected",
        })),
        Ok(ConnectOutcome::AlreadyInFlight) => Ok(Json(ConnectResponse {
            status: "already_connecting",
        })),
        Err(ConnectError::NotInstalled) => Err(conflict("wallet extension not detected")),
        Err(ConnectError::Rejected(err)) => Err(bad_gateway(err)),
    }
}

async fn tokens(State(state): State<AppState>) -> ApiResult<Vec<MintedToken>> {
    let controller = controller(&state)?;
    let minted = controller
        .get_user_minted_tokens()
        .await
        .map_err(bad_gateway)?;
    Ok(Json(minted))
}

async fn address_valid(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> ApiResult<AddressValidResponse> {
    if query.address.trim().is_empty() {
        return Err(bad_request("address is required"));
    }
    let controller = controller(&state)?;
    let valid = controller
        .is_valid_sys_address(&query.address)
        .await
        .map_err(bad_gateway)?;
    Ok(Json(AddressValidResponse {
        address: query.address,
        valid,
    }))
}

async fn create_token(
    State(state): State<AppState>,
    Json(params): Json<CreateTokenParams>,
) -> ApiResult<TransactionResult> {
    let controller = controller(&state)?;
    let result = controller
        .handle_create_token(params)
        .await
        .map_err(bad_gateway)?;
    Ok(Json(result))
}

async fn issue_nft(
    State(state): State<AppState>,
    Json(params): Json<IssueNftParams>,
) -> ApiResult<TransactionResult> {
    let controller = controller(&state)?;
    let result = controller
        .handle_issue_nft(params)
        .await
        .map_err(bad_gateway)?;
    Ok(Json(result))
}

async fn issue_spt(
    State(state): State<AppState>,
    Json(params): Json<IssueSptParams>,
) -> ApiResult<TransactionResult> {
    let controller = controller(&state)?;
    let result = controller
        .handle_issue_spt(params)
        .await
        .map_err(bad_gateway)?;
    Ok(Json(result))
}

async fn update_asset(
    State(state): State<AppState>,
    Json(params): Json<UpdateAssetParams>,
) -> ApiResult<TransactionResult> {
    let controller = controller(&state)?;
    let result = controller
        .handle_update_asset(params)
        .await
        .map_err(bad_gateway)?;
    Ok(Json(result))
}

async fn transfer_ownership(
    State(state): State<AppState>,
    Json(params): Json<TransferOwnershipParams>,
) -> ApiResult<TransactionResult> {
    let controller = controller(&state)?;
    let result = controller
        .handle_transfer_ownership(params)
        .await
        .map_err(bad_gateway)?;
    Ok(Json(result))
}

async fn create_collection(
    State(state): State<AppState>,
    Json(params): Json<CreateCollectionParams>,
) -> ApiResult<TransactionResult> {
    let controller = controller(&state)?;
    let result = controller
        .handle_create_collection(params)
        .await
        .map_err(bad_gateway)?;
    Ok(Json(result))
}

async fn simulate_announce(State(state): State<AppState>) -> Json<SimulateResponse> {
    state
        .detector
        .announce(DetectionEvent::installed(state.sim.clone().handle()));
    Json(SimulateResponse { applied: true })
}

async fn simulate_remove(State(state): State<AppState>) -> Json<SimulateResponse> {
    state.detector.announce(DetectionEvent::removed());
    Json(SimulateResponse { applied: true })
}

async fn simulate_update(
    State(state): State<AppState>,
    Json(request): Json<SimulateUpdateRequest>,
) -> Json<SimulateResponse> {
    if let Some(balance) = request.balance {
        state.sim.set_balance(balance);
    }
    if let Some(locked) = request.locked {
        state.sim.set_locked(locked);
    }
    Json(SimulateResponse { applied: true })
}

fn controller(state: &AppState) -> Result<ControllerHandle, (StatusCode, Json<ErrorResponse>)> {
    state
        .bridge
        .store()
        .controller()
        .ok_or_else(|| conflict("wallet extension not detected"))
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn conflict(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn bad_gateway(err: ControllerCallFailed) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}
