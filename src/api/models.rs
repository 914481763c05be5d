use crate::board::{NotionalObservation, SpreadObservation};
use serde::Serialize;

/// Response for GET /spreads
#[derive(Serialize)]
pub struct SpreadsResponse {
    pub spreads: Vec<SpreadObservation>,
}

/// Response for GET /notional
#[derive(Serialize)]
pub struct NotionalResponse {
    pub notional: Vec<NotionalObservation>,
}
