//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use tracing::{error, warn};

use super::AppState;
use super::types::{
    ErrorResponse, ExcessQuery, ExcessResponse, ForecastQuery, ForecastResponse, HealthResponse,
    SystemsResponse, WindowQuery, WindowResponse,
};
use crate::error::ForecastError;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Maps a service error to its HTTP status and JSON body.
fn error_response(err: ForecastError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        ForecastError::InputValidation(_) => StatusCode::BAD_REQUEST,
        ForecastError::NotFound { .. } => StatusCode::NOT_FOUND,
        ForecastError::InfeasibleWindow(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ForecastError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ForecastError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    match status {
        StatusCode::INTERNAL_SERVER_ERROR => error!("request failed: {err}"),
        StatusCode::SERVICE_UNAVAILABLE => warn!("request failed: {err}"),
        _ => {}
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
}

/// Unwraps query parameters, turning a rejection into a 400 JSON body.
fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, (StatusCode, Json<ErrorResponse>)> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| error_response(ForecastError::invalid(rejection.body_text())))
}

/// `GET /health` → 200
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        weather_source: state.service.weather_source().to_string(),
    })
}

/// `GET /systems` → 200 + configured systems and devices
pub async fn list_systems(State(state): State<Arc<AppState>>) -> Json<SystemsResponse> {
    let catalog = state.service.catalog();
    Json(SystemsResponse {
        systems: catalog.systems(),
        devices: catalog.devices(),
    })
}

/// Hourly forecast grouped by day.
///
/// `GET /systems/{id}/forecast?days=N` → 200 + `ForecastResponse`
pub async fn get_forecast(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: Result<Query<ForecastQuery>, QueryRejection>,
) -> ApiResult<ForecastResponse> {
    let query = query_params(query)?;
    let forecast = state
        .service
        .forecast(&id, query.days, (state.clock)())
        .await
        .map_err(error_response)?;
    Ok(Json(ForecastResponse {
        system_id: id,
        forecast,
    }))
}

/// Best run window for a device.
///
/// `GET /systems/{id}/optimal-window?device=D&days_lookahead=N` → 200 + `WindowResponse`,
/// 422 when no window fits
pub async fn get_optimal_window(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<WindowResponse> {
    let query = query_params(query)?;
    let window = state
        .service
        .optimal_window(&id, &query.device, query.days_lookahead.unwrap_or(1), (state.clock)())
        .await
        .map_err(error_response)?;
    Ok(Json(WindowResponse {
        system_id: id,
        device_id: query.device,
        window,
    }))
}

/// `GET /systems/{id}/excess?consumption_kw=X&days=N` → 200 + `ExcessResponse`
pub async fn get_excess(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: Result<Query<ExcessQuery>, QueryRejection>,
) -> ApiResult<ExcessResponse> {
    let query = query_params(query)?;
    let excess = state
        .service
        .excess(&id, query.consumption_kw, query.days, (state.clock)())
        .await
        .map_err(error_response)?;
    Ok(Json(ExcessResponse {
        system_id: id,
        excess,
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{DateTime, TimeZone, Utc};
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::config::ServiceConfig;
    use crate::error::InfeasibleReason;
    use crate::service::ForecastService;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 6, 15, 0).unwrap()
    }

    fn make_test_state() -> Arc<AppState> {
        let service = ForecastService::from_config(&ServiceConfig::offline()).unwrap();
        Arc::new(AppState {
            service,
            clock: fixed_now,
        })
    }

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let app = router(make_test_state());
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    #[test]
    fn errors_map_to_statuses() {
        let cases = [
            (ForecastError::invalid("x"), StatusCode::BAD_REQUEST),
            (
                ForecastError::NotFound {
                    kind: "system",
                    id: "x".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ForecastError::InfeasibleWindow(InfeasibleReason::DegenerateDevice),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ForecastError::upstream("x"), StatusCode::SERVICE_UNAVAILABLE),
            (ForecastError::Unexpected("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(error_response(err).0, expected);
        }
    }

    #[tokio::test]
    async fn health_returns_200() {
        let (status, json) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["weather_source"], "synthetic");
    }

    #[tokio::test]
    async fn systems_lists_presets() {
        let (status, json) = get("/systems").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["systems"][0]["id"], "vienna-roof");
        assert_eq!(json["devices"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn forecast_returns_requested_days() {
        let (status, json) = get("/systems/vienna-roof/forecast?days=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["system_id"], "vienna-roof");
        assert_eq!(json["forecast_hours"], 48);
        assert_eq!(json["days"][0]["day"], "2024-06-20");
        assert_eq!(json["days"][1]["forecast"].as_array().map(Vec::len), Some(24));
    }

    #[tokio::test]
    async fn forecast_days_out_of_range_returns_400() {
        let (status, json) = get("/systems/vienna-roof/forecast?days=9").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_input");
    }

    #[tokio::test]
    async fn unknown_system_returns_404() {
        let (status, json) = get("/systems/atlantis/forecast").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "not_found");
    }

    #[tokio::test]
    async fn optimal_window_returns_split() {
        let (status, json) = get("/systems/vienna-roof/optimal-window?device=dishwasher&days_lookahead=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["device_id"], "dishwasher");
        let solar = json["solar_power_used_kwh"].as_f64().unwrap();
        let grid = json["grid_power_needed_kwh"].as_f64().unwrap();
        assert!((solar + grid - 1.2).abs() < 1e-9);
        assert!(json["start_time"].as_str().unwrap().starts_with("2024-06-2"));
    }

    #[tokio::test]
    async fn unknown_device_returns_404() {
        let (status, _) = get("/systems/vienna-roof/optimal-window?device=toaster").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_query_returns_json_400() {
        for uri in [
            "/systems/vienna-roof/forecast?days=abc",
            "/systems/vienna-roof/excess",
            "/systems/vienna-roof/optimal-window",
        ] {
            let (status, json) = get(uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(json["code"], "invalid_input", "{uri}");
            assert!(!json["error"].as_str().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn excess_returns_hours() {
        let (status, json) = get("/systems/vienna-roof/excess?consumption_kw=0.5&days=1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["excess_hours"].as_u64().unwrap() > 0);
    }
}
