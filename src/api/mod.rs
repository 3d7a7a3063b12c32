pub mod fx_client;

pub use fx_client::{FxClient, RateSource, RatesPayload};
#[cfg(test)]
pub use fx_client::MockRateSource;
