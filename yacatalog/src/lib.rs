//! # yacatalog - Client du catalogue Yandex.Music
//!
//! Cette crate fournit l'accès au catalogue distant utilisé par les
//! contrôleurs de sources :
//!
//! - **Trait `CatalogClient`** : la capacité consommée par les contrôleurs
//! - **`HttpCatalogClient`** : implémentation `reqwest` (OAuth, enveloppe `result`)
//! - **`RetryPolicy` / `with_retry`** : 3 tentatives, délai fixe, timeout par appel
//! - **Modèles** : stations rotor, tracks, descripteurs de téléchargement...
//!
//! ## Exemple
//!
//! ```no_run
//! use yacatalog::{CatalogClient, CatalogError, HttpCatalogClient, RetryPolicy, with_retry};
//!
//! # async fn run() -> yacatalog::Result<()> {
//! let client = HttpCatalogClient::builder().token("...").connect().await?;
//! let policy = RetryPolicy::default();
//! let stations = with_retry(&policy, "rotor_stations_list", CatalogError::is_retryable, || {
//!     client.rotor_stations_list(policy.timeout)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config_ext;
pub mod error;
pub mod models;
pub mod retry;
#[cfg(feature = "testing")]
pub mod testing;

pub use client::{CatalogClient, ClientBuilder, HttpCatalogClient, sign_direct_link};
pub use config_ext::CatalogConfigExt;
pub use error::{CatalogError, Result};
pub use models::*;
pub use retry::{RetryPolicy, with_retry};
