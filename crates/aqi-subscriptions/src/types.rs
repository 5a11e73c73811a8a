//! Subscriber data model: location-scoped alert preferences.

use aqi_core::{AqiThresholds, LatLng, Pollutant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type SubscriberId = Uuid;

/// Delivery channels a subscriber may enable. Push fans out through the
/// Push Bus; email and sms go through [`crate::sink::NotificationSink`]
/// implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Push,
    Email,
    Sms,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollutantThreshold {
    pub warning: f64,
    pub critical: f64,
}

impl PollutantThreshold {
    pub fn defaults_for(pollutant: Pollutant) -> Self {
        Self {
            warning: pollutant.default_warning_threshold(),
            critical: pollutant.default_critical_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberPrefs {
    pub aqi_thresholds: AqiThresholds,
    pub per_pollutant_thresholds: HashMap<Pollutant, PollutantThreshold>,
    pub channels: Vec<Channel>,
    pub enabled: bool,
}

impl Default for SubscriberPrefs {
    fn default() -> Self {
        Self {
            aqi_thresholds: AqiThresholds::default(),
            per_pollutant_thresholds: Pollutant::ALL
                .iter()
                .map(|p| (*p, PollutantThreshold::defaults_for(*p)))
                .collect(),
            channels: vec![Channel::Push],
            enabled: true,
        }
    }
}

impl SubscriberPrefs {
    /// Merges `patch` onto `self`: any field present in `patch` replaces
    /// the current value; absent fields are left untouched. Per §4.7,
    /// `UpdatePrefs` rejects fields that don't correspond to a known
    /// preference, which in a typed model is enforced by the compiler —
    /// there is no untyped "unknown field" path to reject.
    pub fn merge(&mut self, patch: SubscriberPrefsPatch) {
        if let Some(t) = patch.aqi_thresholds {
            self.aqi_thresholds = t;
        }
        if let Some(m) = patch.per_pollutant_thresholds {
            self.per_pollutant_thresholds.extend(m);
        }
        if let Some(c) = patch.channels {
            self.channels = c;
        }
        if let Some(e) = patch.enabled {
            self.enabled = e;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberPrefsPatch {
    pub aqi_thresholds: Option<AqiThresholds>,
    pub per_pollutant_thresholds: Option<HashMap<Pollutant, PollutantThreshold>>,
    pub channels: Option<Vec<Channel>>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberLocation {
    pub location: LatLng,
    pub radius_km: f64,
}

/// Delivery address for the email/sms sinks. Not part of spec.md's opaque
/// subscriber identity, but the email/sms channels cannot be made
/// deliverable without one — added here the same way `Recipient` carries
/// destination fields in this crate's notification layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// `{ id, location, prefs, lastDispatchAt }` per spec §3. Mutated only
/// through [`crate::registry::SubscriptionRegistry`] — this type has no
/// interior mutability of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: SubscriberId,
    pub location: SubscriberLocation,
    pub prefs: SubscriberPrefs,
    pub contact: ContactInfo,
    pub last_dispatch_at: Option<DateTime<Utc>>,
}

impl Subscriber {
    pub fn new(id: SubscriberId, location: SubscriberLocation, prefs: SubscriberPrefs) -> Self {
        Self {
            id,
            location,
            prefs,
            contact: ContactInfo::default(),
            last_dispatch_at: None,
        }
    }

    pub fn cooldown_elapsed(&self, now: DateTime<Utc>, cooldown: chrono::Duration) -> bool {
        match self.last_dispatch_at {
            None => true,
            Some(last) => now - last >= cooldown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefs_enabled_with_push_only() {
        let prefs = SubscriberPrefs::default();
        assert!(prefs.enabled);
        assert_eq!(prefs.channels, vec![Channel::Push]);
        assert_eq!(prefs.per_pollutant_thresholds.len(), 7);
    }

    #[test]
    fn merge_replaces_only_present_fields() {
        let mut prefs = SubscriberPrefs::default();
        let patch = SubscriberPrefsPatch {
            enabled: Some(false),
            ..Default::default()
        };
        prefs.merge(patch);
        assert!(!prefs.enabled);
        assert_eq!(prefs.channels, vec![Channel::Push]);
    }
}
