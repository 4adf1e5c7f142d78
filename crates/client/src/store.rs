//! In-memory product store holding the last fetched catalog snapshot.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use pricelist_catalog::{FilterLayer, Product, VisibilityPolicy};
use pricelist_core::{Entity, ProductId};

use crate::api::{ApiError, CatalogApi};

/// Authoritative catalog held by the client.
///
/// A successful load replaces the whole collection; a failed load keeps the
/// previous collection and records the error until the next success.
#[derive(Debug, Default)]
pub struct ProductStore {
    products: Vec<Product>,
    last_error: Option<ApiError>,
    policy: VisibilityPolicy,
    generation: u64,
    loaded_at: Option<DateTime<Utc>>,
}

impl ProductStore {
    pub fn new(policy: VisibilityPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Fetch the listing once and apply the outcome. No retry.
    ///
    /// Returns the number of products held after a successful load.
    pub async fn load(&mut self, api: &CatalogApi) -> Result<usize, ApiError> {
        let outcome = api.list_products().await;
        self.apply(outcome)
    }

    /// Apply the outcome of a listing request fetched elsewhere.
    ///
    /// Lets callers issue the request without holding the store borrowed.
    pub fn apply(&mut self, outcome: Result<Vec<Product>, ApiError>) -> Result<usize, ApiError> {
        match outcome {
            Ok(snapshot) => Ok(self.replace(snapshot)),
            Err(err) => {
                tracing::warn!(error = %err, kept = self.products.len(), "catalog load failed");
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Replace the held collection with `snapshot`.
    ///
    /// Store-layer visibility rules are applied here; duplicate ids keep the
    /// first record.
    pub fn replace(&mut self, snapshot: Vec<Product>) -> usize {
        let received = snapshot.len();
        let mut seen = HashSet::with_capacity(received);
        let mut duplicates = 0usize;

        let products: Vec<Product> = snapshot
            .into_iter()
            .filter(|product| {
                let fresh = seen.insert(*product.id());
                if !fresh {
                    duplicates += 1;
                }
                fresh
            })
            .filter(|product| self.policy.admits_at(FilterLayer::Store, product))
            .collect();

        if duplicates > 0 {
            tracing::warn!(duplicates, "catalog snapshot contained duplicate product ids");
        }

        tracing::info!(
            received,
            held = products.len(),
            layer = ?self.policy.layer,
            "catalog snapshot loaded"
        );

        self.products = products;
        self.last_error = None;
        self.generation += 1;
        self.loaded_at = Some(Utc::now());
        self.products.len()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: ProductId) -> bool {
        self.get(id).is_some()
    }

    /// Error of the most recent load, `None` if it succeeded or none failed yet.
    pub fn error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    pub fn policy(&self) -> &VisibilityPolicy {
        &self.policy
    }

    /// Number of successful loads so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn is_loaded(&self) -> bool {
        self.generation > 0
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
