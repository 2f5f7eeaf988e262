// =============================================================================
// Exchange Module
// =============================================================================
//
// Public spot REST access for the supported venues, with the transport
// concerns (retry middleware, request-weight cooldown) kept here so the
// scanner only ever sees `MarketDataProvider`.

pub mod client;
pub mod rate_limit;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use client::SpotRestClient;
pub use rate_limit::WeightLimits;
pub use retry::RetryPolicy;
