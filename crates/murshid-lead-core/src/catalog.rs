//! Program catalog resolution
//!
//! Maps a lead's package identifier to a sellable Stripe price. Direct
//! price-map entries from configuration win; otherwise the brand-tagged
//! product catalog is searched and cached for the process lifetime.
//! Entries without a resolvable active price or a program id are dropped
//! with a warning, never silently substituted.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::StripeConfig;
use crate::error::LeadError;
use crate::stripe::{StripeClient, StripeProduct};

/// A sellable coaching program resolved from the billing catalog.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub program_id: String,
    pub product_id: String,
    pub price_id: String,
    /// Amount in the currency's minor unit
    pub amount_minor: i64,
    pub currency: String,
    pub sessions: Option<u32>,
    pub duration_label: Option<String>,
    /// Raw product metadata, kept for notification templating
    pub metadata: HashMap<String, String>,
}

/// Resolves package identifiers to catalog entries, with an in-process
/// cache of the searched catalog.
pub struct CatalogResolver {
    stripe: StripeClient,
    config: StripeConfig,
    cache: RwLock<Option<Arc<HashMap<String, CatalogEntry>>>>,
}

impl CatalogResolver {
    pub fn new(stripe: StripeClient, config: StripeConfig) -> Self {
        Self {
            stripe,
            config,
            cache: RwLock::new(None),
        }
    }

    /// Resolve a program id to a catalog entry.
    ///
    /// Returns `None` (after logging) when no active price is resolvable;
    /// the payment-link job treats that as "no link", not an error.
    pub async fn resolve(&self, program_id: &str) -> Option<CatalogEntry> {
        // Direct price-map lookup first.
        if let Some(price_id) = self.config.get_price_id(program_id) {
            match self.entry_from_price(program_id, price_id).await {
                Ok(entry) => return Some(entry),
                Err(e) => {
                    warn!(program_id, price_id, error = %e,
                        "Configured price lookup failed, falling back to catalog search");
                }
            }
        }

        let catalog = match self.load_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(program_id, error = %e, "Catalog search failed");
                return None;
            }
        };

        let entry = catalog.get(program_id).cloned();
        if entry.is_none() {
            warn!(program_id, "No catalog entry for requested program");
        }
        entry
    }

    /// Build an entry from a configured price id.
    async fn entry_from_price(
        &self,
        program_id: &str,
        price_id: &str,
    ) -> Result<CatalogEntry, LeadError> {
        let price = self.stripe.get_price(price_id).await?;
        if !price.active {
            return Err(LeadError::Provider(format!("price {price_id} is inactive")));
        }
        let amount_minor = price
            .unit_amount
            .ok_or_else(|| LeadError::Provider(format!("price {price_id} has no amount")))?;

        Ok(CatalogEntry {
            program_id: program_id.to_string(),
            product_id: String::new(),
            price_id: price.id,
            amount_minor,
            currency: price.currency,
            sessions: None,
            duration_label: None,
            metadata: HashMap::new(),
        })
    }

    /// Return the cached catalog, searching Stripe on first use.
    async fn load_catalog(&self) -> Result<Arc<HashMap<String, CatalogEntry>>, LeadError> {
        if let Some(catalog) = self.cache.read().await.as_ref() {
            return Ok(catalog.clone());
        }

        let mut write_guard = self.cache.write().await;
        // Double-check after acquiring the write lock.
        if let Some(catalog) = write_guard.as_ref() {
            return Ok(catalog.clone());
        }

        let products = self.stripe.search_products(&self.config.brand_tag).await?;
        let mut catalog = HashMap::new();

        for product in products {
            match self.entry_from_product(&product).await {
                Some(entry) => {
                    debug!(program_id = %entry.program_id, price_id = %entry.price_id,
                        "Catalog entry resolved");
                    catalog.insert(entry.program_id.clone(), entry);
                }
                None => {
                    warn!(product_id = %product.id, name = %product.name,
                        "Dropping catalog product without program id or active price");
                }
            }
        }

        info!(entries = catalog.len(), "Program catalog loaded");
        let catalog = Arc::new(catalog);
        *write_guard = Some(catalog.clone());
        Ok(catalog)
    }

    /// Build an entry from a searched product, or `None` if it is not
    /// sellable.
    async fn entry_from_product(&self, product: &StripeProduct) -> Option<CatalogEntry> {
        let program_id = product.metadata.get("program_id")?.clone();

        let price = if let Some(default_price) = &product.default_price {
            self.stripe.get_price(default_price).await.ok()?
        } else {
            self.stripe
                .list_prices(&product.id)
                .await
                .ok()?
                .into_iter()
                .find(|p| p.active)?
        };
        if !price.active {
            return None;
        }
        let amount_minor = price.unit_amount?;

        let sessions = product
            .metadata
            .get("sessions")
            .and_then(|s| s.parse().ok());
        let duration_label = product.metadata.get("duration").cloned();

        Some(CatalogEntry {
            program_id,
            product_id: product.id.clone(),
            price_id: price.id,
            amount_minor,
            currency: price.currency,
            sessions,
            duration_label,
            metadata: product.metadata.clone(),
        })
    }
}

impl std::fmt::Debug for CatalogResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogResolver")
            .field("brand_tag", &self.config.brand_tag)
            .finish_non_exhaustive()
    }
}
