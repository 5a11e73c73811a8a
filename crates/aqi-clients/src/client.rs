use crate::payload::{AirQualityPayload, RequestContext, WeatherPayload};
use aqi_core::{AqiError, Query};
use async_trait::async_trait;

/// Capability interface shared by the satellite client and both ground
/// networks. The Canonicalizer works against this trait's output, never
/// against a provider's raw wire shape.
#[async_trait]
pub trait AirQualityClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Live fetch. Transport errors, non-2xx, parse failures, and deadline
    /// overruns are all absorbed here — callers use [`Self::mock_fetch`] as
    /// the fallback rather than seeing those errors propagate, except for
    /// `ErrBadRequest` on an invalid query.
    async fn fetch(&self, ctx: &RequestContext, query: &Query) -> Result<AirQualityPayload, AqiError>;

    /// Deterministic mock fallback: identical `query` (rounded to 2dp) and
    /// pollutant always produce the identical payload.
    fn mock_fetch(&self, query: &Query) -> AirQualityPayload;
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, ctx: &RequestContext, query: &Query) -> Result<WeatherPayload, AqiError>;

    fn mock_fetch(&self, query: &Query) -> WeatherPayload;
}
