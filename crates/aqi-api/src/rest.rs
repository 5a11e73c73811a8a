//! REST handlers per spec §6. Transport-thin: every handler validates its
//! own query/body shape, then delegates to the Scheduler, SubscriptionRegistry,
//! or AlertDispatcher and serializes the result.

use crate::state::AppState;
use aqi_core::{AqiError, LatLng, Pollutant, Query as DomainQuery};
use aqi_scheduler::DEFAULT_RADIUS_KM;
use aqi_subscriptions::{ContactInfo, SubscriberId, SubscriberLocation, SubscriberPrefs, SubscriberPrefsPatch};
use axum::{
    extract::{Query as AxumQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Wraps `AqiError` for the transport boundary. Per §7, only `BadRequest`
/// and `Internal` are meant to reach a caller; the other variants are
/// absorbed well before they get here, but every variant still needs a
/// mapping since `AqiError` is threaded through a single `Result` type.
pub struct ApiError(AqiError);

impl From<AqiError> for ApiError {
    fn from(e: AqiError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AqiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AqiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AqiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no provider produced data and mock fallback is disabled".to_string(),
            ),
            AqiError::Timeout | AqiError::Upstream(_) | AqiError::FallbackMock => {
                // These are meant to be absorbed at the client boundary and
                // never reach here; surfaced as 503 defensively rather than
                // panicking on an unexpected path.
                error!(error = %self.0, "error variant reached the transport boundary unexpectedly");
                (StatusCode::SERVICE_UNAVAILABLE, "upstream temporarily unavailable".to_string())
            }
            AqiError::Internal(msg) => {
                error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Deserialize)]
pub struct CurrentAirQualityParams {
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "radiusKm")]
    pub radius_km: Option<f64>,
}

pub async fn current_air_quality(
    State(state): State<AppState>,
    AxumQuery(params): AxumQuery<CurrentAirQualityParams>,
) -> ApiResult<aqi_core::Snapshot> {
    let query = DomainQuery::new(
        params.lat,
        params.lng,
        params.radius_km.unwrap_or(DEFAULT_RADIUS_KM),
        state.config.scheduler.default_horizon_hours,
    );
    query.validate()?;
    let snapshot = state.scheduler.snapshot_now(&query).await?;
    Ok(Json(snapshot))
}

#[derive(Deserialize)]
pub struct HorizonParams {
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "horizonHours")]
    pub horizon_hours: Option<u32>,
}

pub async fn forecast(
    State(state): State<AppState>,
    AxumQuery(params): AxumQuery<HorizonParams>,
) -> ApiResult<aqi_core::Forecast> {
    let query = DomainQuery::new(
        params.lat,
        params.lng,
        DEFAULT_RADIUS_KM,
        params.horizon_hours.unwrap_or(24),
    );
    query.validate()?;
    let forecast = state.scheduler.refresh_now(&query).await?;
    Ok(Json(forecast))
}

#[derive(Deserialize)]
pub struct PollutantForecastParams {
    pub lat: f64,
    pub lng: f64,
    pub pollutant: String,
    #[serde(rename = "horizonHours")]
    pub horizon_hours: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollutantForecastResponse {
    pub pollutant: Pollutant,
    pub per_pollutant: Vec<aqi_core::domain::HourPrediction>,
    pub confidence: Vec<aqi_core::domain::Band>,
    pub alerts: Vec<aqi_core::Alert>,
    pub recommendations: Vec<aqi_core::Recommendation>,
}

pub async fn pollutant_forecast(
    State(state): State<AppState>,
    AxumQuery(params): AxumQuery<PollutantForecastParams>,
) -> ApiResult<PollutantForecastResponse> {
    let Some(pollutant) = Pollutant::normalize(&params.pollutant) else {
        return Err(AqiError::BadRequest(format!("unknown pollutant {:?}", params.pollutant)).into());
    };
    let query = DomainQuery::new(
        params.lat,
        params.lng,
        DEFAULT_RADIUS_KM,
        params.horizon_hours.unwrap_or(24),
    );
    query.validate()?;
    let forecast = state.scheduler.refresh_now(&query).await?;

    let per_pollutant = forecast.per_pollutant.get(&pollutant).cloned().unwrap_or_default();
    let confidence = forecast.confidence.get(&pollutant).cloned().unwrap_or_default();
    let alerts = forecast
        .alerts
        .iter()
        .filter(|a| a.pollutant == Some(pollutant))
        .cloned()
        .collect();
    // `Recommendation` carries no pollutant association in this domain
    // model, so "filtered by pollutant" degrades to the full list.
    let recommendations = forecast.recommendations.clone();

    Ok(Json(PollutantForecastResponse {
        pollutant,
        per_pollutant,
        confidence,
        alerts,
        recommendations,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AqiForecastResponse {
    pub aqi: Vec<aqi_core::domain::AqiPrediction>,
    pub alerts: Vec<aqi_core::Alert>,
    pub recommendations: Vec<aqi_core::Recommendation>,
    pub summary: aqi_core::ForecastSummary,
}

pub async fn aqi_forecast(
    State(state): State<AppState>,
    AxumQuery(params): AxumQuery<HorizonParams>,
) -> ApiResult<AqiForecastResponse> {
    let query = DomainQuery::new(
        params.lat,
        params.lng,
        DEFAULT_RADIUS_KM,
        params.horizon_hours.unwrap_or(24),
    );
    query.validate()?;
    let forecast = state.scheduler.refresh_now(&query).await?;
    let summary = forecast.summary();
    Ok(Json(AqiForecastResponse {
        aqi: forecast.aqi,
        alerts: forecast.alerts,
        recommendations: forecast.recommendations,
        summary,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub subscriber_id: SubscriberId,
    pub location: LocationPayload,
    #[serde(default)]
    pub prefs: SubscriberPrefs,
    #[serde(default)]
    pub contact: ContactInfo,
}

#[derive(Deserialize, Serialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
}

impl From<LocationPayload> for SubscriberLocation {
    fn from(p: LocationPayload) -> Self {
        SubscriberLocation {
            location: LatLng::new(p.lat, p.lng),
            radius_km: p.radius_km,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberResponse {
    pub id: SubscriberId,
    pub location: LocationPayload,
    pub prefs: SubscriberPrefs,
    pub last_dispatch_at: Option<DateTime<Utc>>,
}

impl From<aqi_subscriptions::Subscriber> for SubscriberResponse {
    fn from(s: aqi_subscriptions::Subscriber) -> Self {
        SubscriberResponse {
            id: s.id,
            location: LocationPayload {
                lat: s.location.location.lat,
                lng: s.location.location.lng,
                radius_km: s.location.radius_km,
            },
            prefs: s.prefs,
            last_dispatch_at: s.last_dispatch_at,
        }
    }
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscribeRequest>,
) -> ApiResult<SubscriberResponse> {
    let location: SubscriberLocation = body.location.into();
    state
        .registry
        .subscribe(body.subscriber_id, location, body.prefs, body.contact)
        .await;
    let subscriber = state
        .registry
        .get(body.subscriber_id)
        .await
        .ok_or_else(|| AqiError::Internal("subscriber vanished immediately after subscribe".to_string()))?;
    Ok(Json(subscriber.into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest {
    pub subscriber_id: SubscriberId,
}

#[derive(Serialize)]
pub struct Ack {
    pub acknowledged: bool,
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(body): Json<UnsubscribeRequest>,
) -> Json<Ack> {
    state.registry.unsubscribe(body.subscriber_id).await;
    Json(Ack { acknowledged: true })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePrefsRequest {
    pub subscriber_id: SubscriberId,
    pub prefs: SubscriberPrefsPatch,
}

pub async fn update_prefs(
    State(state): State<AppState>,
    Json(body): Json<UpdatePrefsRequest>,
) -> ApiResult<SubscriberResponse> {
    state.registry.update_prefs(body.subscriber_id, body.prefs).await?;
    let subscriber = state
        .registry
        .get(body.subscriber_id)
        .await
        .ok_or_else(|| AqiError::NotFound(format!("subscriber {} not found", body.subscriber_id)))?;
    Ok(Json(subscriber.into()))
}

#[derive(Deserialize)]
pub struct HistoryParams {
    #[serde(rename = "subscriberId")]
    pub subscriber_id: SubscriberId,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRecordResponse {
    pub subscriber_id: SubscriberId,
    pub alerts: Vec<aqi_core::Alert>,
    pub channels_sent: Vec<&'static str>,
    pub at: DateTime<Utc>,
}

impl From<aqi_subscriptions::DispatchRecord> for DispatchRecordResponse {
    fn from(r: aqi_subscriptions::DispatchRecord) -> Self {
        DispatchRecordResponse {
            subscriber_id: r.subscriber_id,
            alerts: r.alerts,
            channels_sent: r.channels_sent,
            at: r.at,
        }
    }
}

pub async fn history(
    State(state): State<AppState>,
    AxumQuery(params): AxumQuery<HistoryParams>,
) -> ApiResult<Vec<DispatchRecordResponse>> {
    let limit = params.limit.unwrap_or(100).min(1000);
    let records = state
        .dispatcher
        .history_for(params.subscriber_id, limit)
        .await
        .into_iter()
        .map(DispatchRecordResponse::from)
        .collect();
    Ok(Json(records))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAlertRequest {
    pub subscriber_id: SubscriberId,
}

pub async fn test_alert(
    State(state): State<AppState>,
    Json(body): Json<TestAlertRequest>,
) -> ApiResult<DispatchRecordResponse> {
    let record = state
        .dispatcher
        .dispatch_test(body.subscriber_id)
        .await
        .ok_or_else(|| AqiError::NotFound(format!("subscriber {} not found", body.subscriber_id)))?;
    Ok(Json(record.into()))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/current-air-quality", get(current_air_quality))
        .route("/forecast", get(forecast))
        .route("/pollutant-forecast", get(pollutant_forecast))
        .route("/aqi-forecast", get(aqi_forecast))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", delete(unsubscribe))
        .route("/prefs", put(update_prefs))
        .route("/history", get(history))
        .route("/test", post(test_alert))
}
