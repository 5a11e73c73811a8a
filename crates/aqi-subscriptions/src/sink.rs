//! Capability interface for the email/sms delivery channels. Per §1's
//! scope note, the actual delivery channels are "capability sinks" — this
//! crate owns message construction and rate limiting, not the transport.

use crate::types::Subscriber;
use aqi_core::Alert;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct AlertBundle<'a> {
    pub subscriber: &'a Subscriber,
    pub alerts: &'a [Alert],
    pub location_label: String,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn channel_name(&self) -> &'static str;

    /// Sends the bundle; never panics. A transport failure is logged by
    /// the implementation and reported back as `Ok(false)` rather than
    /// propagated, since one failed channel must not block the others.
    async fn send(&self, bundle: &AlertBundle<'_>) -> bool;
}

/// `{count, location, alerts[*].message, alerts[*].severity,
/// alerts[*].hoursUntil}` placeholder substitution shared by both sinks.
pub fn build_body(bundle: &AlertBundle<'_>) -> String {
    let lines: Vec<String> = bundle
        .alerts
        .iter()
        .map(|a| format!("{:?} in {}h: {}", a.kind, a.hours_until, a.message))
        .collect();
    format!(
        "{} air-quality alert(s) near {}:\n{}",
        bundle.alerts.len(),
        bundle.location_label,
        lines.join("\n")
    )
}

/// SMS body prefers critical/emergency alerts and caps near 160 chars —
/// grounded on the truncate-with-ellipsis pattern in this crate's SMS
/// sink.
pub fn build_sms_body(bundle: &AlertBundle<'_>) -> String {
    let mut sorted: Vec<&Alert> = bundle.alerts.iter().collect();
    sorted.sort_by_key(|a| match a.kind {
        aqi_core::AlertKind::AqiEmergency => 0,
        aqi_core::AlertKind::AqiCritical | aqi_core::AlertKind::PollutantCritical => 1,
        aqi_core::AlertKind::AqiWarning | aqi_core::AlertKind::PollutantWarning => 2,
        aqi_core::AlertKind::Info => 3,
    });
    let mut body = format!("{} air-quality alert(s) near {}: ", sorted.len(), bundle.location_label);
    for alert in &sorted {
        let piece = format!("{} ", alert.message);
        if body.len() + piece.len() > 157 {
            break;
        }
        body.push_str(&piece);
    }
    if body.len() > 160 {
        body.truncate(157);
        body.push_str("...");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, Subscriber, SubscriberLocation, SubscriberPrefs};
    use aqi_core::{AlertKind, LatLng};
    use chrono::Utc;

    fn subscriber() -> Subscriber {
        Subscriber::new(
            uuid::Uuid::new_v4(),
            SubscriberLocation {
                location: LatLng::new(1.0, 1.0),
                radius_km: 10.0,
            },
            SubscriberPrefs::default(),
        )
    }

    #[test]
    fn sms_body_stays_near_160_chars() {
        let subscriber = subscriber();
        let alerts: Vec<Alert> = (0..10)
            .map(|i| Alert {
                kind: AlertKind::AqiWarning,
                hours_until: i,
                aqi: Some(120),
                pollutant: None,
                value: None,
                message: format!("AQI forecast to reach 120 in {i}h, a fairly long message body"),
                at: Utc::now(),
            })
            .collect();
        let bundle = AlertBundle {
            subscriber: &subscriber,
            alerts: &alerts,
            location_label: "40.00,-73.00".to_string(),
        };
        let body = build_sms_body(&bundle);
        assert!(body.len() <= 161, "body was {} chars", body.len());
        let _ = Channel::Sms;
    }
}
