use crate::domain::{Alert, Forecast};
use crate::geo::LatLng;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Realtime payloads fanned out over the Push Bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum PushEvent {
    /// Published to a `loc:<lat>,<lng>` room on every scheduler tick.
    AirQualityUpdate { forecast: Box<Forecast> },
    /// Published only to a `user:<id>` room.
    #[serde(rename_all = "camelCase")]
    AirQualityAlert {
        subscriber_id: String,
        alerts: Vec<Alert>,
        at: DateTime<Utc>,
        location: LatLng,
    },
}

impl PushEvent {
    pub fn update(forecast: Forecast) -> Self {
        PushEvent::AirQualityUpdate {
            forecast: Box::new(forecast),
        }
    }

    pub fn alert(subscriber_id: impl Into<String>, alerts: Vec<Alert>, location: LatLng) -> Self {
        PushEvent::AirQualityAlert {
            subscriber_id: subscriber_id.into(),
            alerts,
            at: Utc::now(),
            location,
        }
    }
}
