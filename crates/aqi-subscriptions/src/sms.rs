//! SMS notification sink using a Twilio-style REST API.

use crate::sink::{build_sms_body, AlertBundle, NotificationSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_url: String,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from_number", &self.from_number)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl SmsConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            account_sid: std::env::var("AQI_SMS_ACCOUNT_SID").context("AQI_SMS_ACCOUNT_SID not set")?,
            auth_token: std::env::var("AQI_SMS_AUTH_TOKEN").context("AQI_SMS_AUTH_TOKEN not set")?,
            from_number: std::env::var("AQI_SMS_FROM_NUMBER").context("AQI_SMS_FROM_NUMBER not set")?,
            api_url: std::env::var("AQI_SMS_API_URL")
                .unwrap_or_else(|_| "https://api.twilio.com/2010-04-01".to_string()),
        })
    }
}

pub struct SmsNotifier {
    config: SmsConfig,
    client: Client,
}

impl SmsNotifier {
    pub fn new(config: SmsConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("failed to build sms http client");
        Self { config, client }
    }
}

#[async_trait]
impl NotificationSink for SmsNotifier {
    fn channel_name(&self) -> &'static str {
        "sms"
    }

    async fn send(&self, bundle: &AlertBundle<'_>) -> bool {
        let Some(phone) = &bundle.subscriber.contact.phone else {
            warn!(subscriber = %bundle.subscriber.id, "sms channel enabled but no phone on file");
            return false;
        };
        let body = build_sms_body(bundle);
        let url = format!("{}/Accounts/{}/Messages.json", self.config.api_url, self.config.account_sid);
        let result = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", phone.as_str()), ("From", &self.config.from_number), ("Body", &body)])
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                info!(subscriber = %bundle.subscriber.id, "alert sms sent");
                true
            }
            Ok(response) => {
                error!(subscriber = %bundle.subscriber.id, status = %response.status(), "sms provider rejected alert");
                false
            }
            Err(e) => {
                error!(subscriber = %bundle.subscriber.id, error = %e, "failed to send alert sms");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Subscriber, SubscriberLocation, SubscriberPrefs};
    use aqi_core::{Alert, AlertKind, LatLng};
    use chrono::Utc;

    #[test]
    fn config_debug_redacts_auth_token() {
        let config = SmsConfig {
            account_sid: "AC123".to_string(),
            auth_token: "shh-very-secret".to_string(),
            from_number: "+15551234567".to_string(),
            api_url: "https://api.twilio.com/2010-04-01".to_string(),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("shh-very-secret"));
    }

    #[test]
    fn sms_body_prefers_critical_alerts() {
        let mut subscriber = Subscriber::new(
            uuid::Uuid::new_v4(),
            SubscriberLocation {
                location: LatLng::new(1.0, 1.0),
                radius_km: 10.0,
            },
            SubscriberPrefs::default(),
        );
        subscriber.contact.phone = Some("+15551234567".to_string());
        let alerts = vec![
            Alert {
                kind: AlertKind::AqiWarning,
                hours_until: 1,
                aqi: Some(110),
                pollutant: None,
                value: None,
                message: "warning alert".to_string(),
                at: Utc::now(),
            },
            Alert {
                kind: AlertKind::AqiEmergency,
                hours_until: 2,
                aqi: Some(260),
                pollutant: None,
                value: None,
                message: "emergency alert".to_string(),
                at: Utc::now(),
            },
        ];
        let bundle = AlertBundle {
            subscriber: &subscriber,
            alerts: &alerts,
            location_label: "1.00,1.00".to_string(),
        };
        let body = build_sms_body(&bundle);
        assert!(body.contains("emergency alert"));
    }
}
