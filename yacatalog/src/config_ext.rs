//! Extension pour lire les paramètres du catalogue depuis yaconfig

use crate::client::{ClientBuilder, HttpCatalogClient};
use crate::retry::RetryPolicy;
use yaconfig::Config;

/// Trait d'extension pour construire le client et la politique de retry
/// à partir de `yaconfig::Config`.
///
/// ```rust,ignore
/// use yacatalog::CatalogConfigExt;
///
/// let policy = config.get_retry_policy();
/// let client = config.catalog_client_builder().connect().await?;
/// ```
pub trait CatalogConfigExt {
    /// `api.retries`, `api.retry_delay_ms` et `api.timeout_ms`
    fn get_retry_policy(&self) -> RetryPolicy;

    /// Builder pré-rempli avec `api.base_url` et `token`
    fn catalog_client_builder(&self) -> ClientBuilder;
}

impl CatalogConfigExt for Config {
    fn get_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.get_api_retries() as u32,
            self.get_api_retry_delay(),
            self.get_api_timeout(),
        )
    }

    fn catalog_client_builder(&self) -> ClientBuilder {
        let builder = HttpCatalogClient::builder().api_base(self.get_api_base_url());
        match self.get_token() {
            Some(token) => builder.token(token),
            None => builder,
        }
    }
}
