//! Simulation control endpoints.
//!
//! ### `POST /api/reset-position?latitude=..&longitude=..`
//! Move the aircraft and restore default altitude, airspeed and heading.
//! Both parameters are optional and default to the home position.
//!
//! ### `POST /api/set-flight-parameters?heading_change=..&altitude_change=..&speed_change=..`
//! Set the rate parameters used by the next tick. Missing values are `0`.

use arinc_core::Field;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

pub const DEFAULT_LATITUDE: f64 = 41.2622;
pub const DEFAULT_LONGITUDE: f64 = 28.7278;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reset-position", post(reset_position))
        .route("/set-flight-parameters", post(set_flight_parameters))
}

#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FlightParameters {
    #[serde(default)]
    pub heading_change: f64,
    #[serde(default)]
    pub altitude_change: f64,
    #[serde(default)]
    pub speed_change: f64,
}

#[derive(Debug, Serialize)]
pub struct ParametersResponse {
    pub status: &'static str,
    pub parameters: FlightParameters,
}

fn check_in_envelope(field: Field, value: f64) -> Result<(), ApiError> {
    if field.envelope().contains(value) {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(format!(
            "{} {} is outside its valid range",
            field.name(),
            value
        )))
    }
}

fn check_finite(name: &str, value: f64) -> Result<(), ApiError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(format!("{name} must be a finite number")))
    }
}

/// POST /api/reset-position
async fn reset_position(
    State(state): State<AppState>,
    query: Result<Query<ResetQuery>, QueryRejection>,
) -> Result<Json<ResetResponse>, ApiError> {
    let Query(query) = query?;
    let latitude = query.latitude.unwrap_or(DEFAULT_LATITUDE);
    let longitude = query.longitude.unwrap_or(DEFAULT_LONGITUDE);
    check_in_envelope(Field::Latitude, latitude)?;
    check_in_envelope(Field::Longitude, longitude)?;

    state.broadcaster.reset_position(latitude, longitude).await;

    Ok(Json(ResetResponse {
        status: "success",
        message: format!("Position reset to {latitude}, {longitude}"),
    }))
}

/// POST /api/set-flight-parameters
async fn set_flight_parameters(
    State(state): State<AppState>,
    query: Result<Query<FlightParameters>, QueryRejection>,
) -> Result<Json<ParametersResponse>, ApiError> {
    let Query(params) = query?;
    check_finite("heading_change", params.heading_change)?;
    check_finite("altitude_change", params.altitude_change)?;
    check_finite("speed_change", params.speed_change)?;

    state
        .broadcaster
        .set_rates(params.heading_change, params.altitude_change, params.speed_change)
        .await;

    Ok(Json(ParametersResponse {
        status: "success",
        parameters: params,
    }))
}
