//! Subscriber registry, per-subscriber alert evaluation, and multi-channel
//! (push/email/sms) delivery.

pub mod dispatcher;
pub mod email;
pub mod rate_limiter;
pub mod registry;
pub mod sink;
pub mod sms;
pub mod types;

pub use dispatcher::{AlertDispatcher, DispatchRecord};
pub use email::{EmailConfig, EmailNotifier};
pub use rate_limiter::{NotificationRateLimiter, RateLimitConfig, RateLimiterRegistry};
pub use registry::SubscriptionRegistry;
pub use sink::{AlertBundle, NotificationSink};
pub use sms::{SmsConfig, SmsNotifier};
pub use types::{
    Channel, ContactInfo, PollutantThreshold, Subscriber, SubscriberId, SubscriberLocation,
    SubscriberPrefs, SubscriberPrefsPatch,
};
