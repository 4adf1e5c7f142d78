//! Catalog session: the state the presentation layer talks to.

use pricelist_catalog::{
    Facets, Product, SelectionTracker, SortDirective, ViewQuery, VisibilityPolicy, facets,
    project,
};
use pricelist_core::ProductId;

use crate::api::{ApiError, CatalogApi};
use crate::storage::{self, LocalStorage};
use crate::store::ProductStore;

/// One rendered table row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowView<'a> {
    pub product: &'a Product,
    pub checked: bool,
}

/// Owns the product store, the selection and the active view query.
///
/// The saved cart token is merged into the selection when storage is
/// attached, and every change writes the selection back. After the first
/// successful load, ids the catalog does not have are dropped.
pub struct CatalogSession {
    api: CatalogApi,
    store: ProductStore,
    selection: SelectionTracker,
    query: ViewQuery,
    storage: Option<LocalStorage>,
    reconciled: bool,
}

impl CatalogSession {
    pub fn new(api: CatalogApi, policy: VisibilityPolicy) -> Self {
        Self {
            api,
            store: ProductStore::new(policy),
            selection: SelectionTracker::new(),
            query: ViewQuery::default(),
            storage: None,
            reconciled: false,
        }
    }

    /// Persist the selection in `storage`, picking up any saved cart.
    pub fn with_storage(mut self, storage: LocalStorage) -> Self {
        let restored = self.selection.restore(storage::load_cart(&storage));
        if restored > 0 {
            tracing::debug!(restored, "saved cart restored");
        }
        self.storage = Some(storage);
        self
    }

    pub fn api(&self) -> &CatalogApi {
        &self.api
    }

    /// Load the catalog snapshot. The failure is also kept on the store.
    pub async fn load(&mut self) -> Result<usize, ApiError> {
        let held = self.store.load(&self.api).await?;

        if !self.reconciled {
            self.reconciled = true;
            let store = &self.store;
            let dropped = self.selection.retain(|id| store.contains(id));
            if dropped > 0 {
                tracing::info!(
                    dropped,
                    kept = self.selection.len(),
                    "dropped unknown ids from saved cart"
                );
                self.persist_selection();
            }
        }

        Ok(held)
    }

    pub fn store(&self) -> &ProductStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    /// Current filtered, sorted view.
    pub fn view(&self) -> Vec<&Product> {
        project(self.store.products(), &self.query, self.store.policy())
    }

    /// Current view with each row's checkbox state.
    pub fn rows(&self) -> Vec<RowView<'_>> {
        self.view()
            .into_iter()
            .map(|product| RowView {
                product,
                checked: self.selection.contains(product.id),
            })
            .collect()
    }

    /// Brand and category choices over the whole catalog.
    pub fn facets(&self) -> Facets {
        facets(self.store.products())
    }

    /// `""` shows every brand.
    pub fn set_brand_filter(&mut self, brand: impl Into<String>) {
        self.query = std::mem::take(&mut self.query).with_brand(brand);
    }

    /// `""` shows every category.
    pub fn set_category_filter(&mut self, category: impl Into<String>) {
        self.query = std::mem::take(&mut self.query).with_category(category);
    }

    pub fn set_sort(&mut self, sort: SortDirective) {
        self.query.sort = sort;
    }

    /// Flip the selection of `id`; returns whether it is now selected.
    pub fn toggle(&mut self, id: ProductId) -> bool {
        let selected = self.selection.toggle(id);
        self.persist_selection();
        selected
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.persist_selection();
    }

    fn persist_selection(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(err) = storage::save_cart(storage, self.selection.ids()) {
            tracing::warn!(error = %format!("{err:#}"), "failed to persist cart");
        }
    }
}
