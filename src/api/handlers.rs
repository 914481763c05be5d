use super::AppState;
use super::models::{NotionalResponse, SpreadsResponse};
use crate::board::SpreadObservation;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

/// GET /health: simple liveness check
pub async fn health() -> &'static str {
    "OK"
}

/// GET /metrics: Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> String {
    state.prometheus.render()
}

/// GET /spreads: latest spread and delta of every published symbol
pub async fn get_all_spreads(State(state): State<AppState>) -> Json<SpreadsResponse> {
    Json(SpreadsResponse {
        spreads: state.board.spreads(),
    })
}

/// GET /spreads/{symbol}: latest spread for one symbol (e.g. BTCUSDT)
pub async fn get_symbol_spread(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<SpreadObservation>, StatusCode> {
    state
        .board
        .get(&symbol.to_uppercase())
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /notional: order book notional computed at startup
pub async fn get_notional(State(state): State<AppState>) -> Json<NotionalResponse> {
    Json(NotionalResponse {
        notional: state.board.notionals(),
    })
}
