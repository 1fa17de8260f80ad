pub mod eastmoney;
pub mod sina;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::FetchError;
use crate::model::{PricedCode, Quote, QuoteConvention};

/// Real-time quote endpoint.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn QuoteSource`).
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch a single quote, decoded with the given field layout.
    fn fetch_quote(
        &self,
        code: &str,
        convention: QuoteConvention,
    ) -> BoxFuture<'_, Result<Quote, Report<FetchError>>>;

    /// Fetch current prices for many codes in one request.
    ///
    /// Returns one entry per decodable response line; a line whose price
    /// cannot be read yields `price: None` instead of failing the batch.
    fn fetch_prices(
        &self,
        codes: &[String],
    ) -> BoxFuture<'_, Result<Vec<PricedCode>, Report<FetchError>>>;
}

/// Listing of the tradable convertible-bond universe.
pub trait BondUniverse: Send + Sync {
    /// Fetch exchange-prefixed bond codes (e.g. `sh113001`).
    fn fetch_bond_codes(&self) -> BoxFuture<'_, Result<Vec<String>, Report<FetchError>>>;
}
