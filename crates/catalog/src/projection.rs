//! Filter/sort projection of the catalog.
//!
//! The projection owns no state: every change to the catalog or to the
//! filter/sort inputs produces a fresh ordered view borrowing from the
//! catalog slice.

use core::cmp::Ordering;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use pricelist_core::{DomainError, ValueObject};

use crate::product::{Product, SortKey};

/// Product field a view can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Title,
    Brand,
    #[default]
    CategoryName,
    PriceUah,
    PriceUsd,
    Stock,
    Article,
    ProductCode,
}

impl SortField {
    pub const ALL: [SortField; 8] = [
        SortField::Title,
        SortField::Brand,
        SortField::CategoryName,
        SortField::PriceUah,
        SortField::PriceUsd,
        SortField::Stock,
        SortField::Article,
        SortField::ProductCode,
    ];

    /// Wire name of the field (matches the backend JSON key).
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Brand => "brand",
            SortField::CategoryName => "category_name",
            SortField::PriceUah => "price_uah",
            SortField::PriceUsd => "price_usd",
            SortField::Stock => "stock",
            SortField::Article => "article",
            SortField::ProductCode => "product_code",
        }
    }

    /// Comparison key of this field on `product`.
    pub fn key<'a>(&self, product: &'a Product) -> SortKey<'a> {
        let text = |value: &'a Option<String>| SortKey::Text(value.as_deref().unwrap_or(""));
        match self {
            SortField::Title => text(&product.title),
            SortField::Brand => text(&product.brand),
            SortField::CategoryName => text(&product.category_name),
            SortField::Article => text(&product.article),
            SortField::ProductCode => text(&product.product_code),
            SortField::PriceUah => product.price_uah.sort_key(),
            SortField::PriceUsd => product.price_usd.sort_key(),
            SortField::Stock => product.stock.sort_key(),
        }
    }
}

impl FromStr for SortField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortField::ALL
            .into_iter()
            .find(|field| field.as_str() == s.trim())
            .ok_or_else(|| DomainError::unknown_field(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(DomainError::validation(format!(
                "sort order must be asc or desc, got {other:?}"
            ))),
        }
    }
}

/// Field + direction. Defaults to `category_name asc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortDirective {
    pub field: SortField,
    pub order: SortOrder,
}

impl ValueObject for SortDirective {}

impl SortDirective {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }
}

/// Parses `field` or `field:order`, e.g. `price_uah:desc`.
impl FromStr for SortDirective {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((field, order)) => Ok(Self::new(field.parse()?, order.parse()?)),
            None => Ok(Self::new(s.parse()?, SortOrder::Asc)),
        }
    }
}

/// Active filter and sort inputs of a view.
///
/// A filter set to `None` is pass-through; `Some(value)` keeps only products
/// whose field equals `value` exactly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewQuery {
    pub brand: Option<String>,
    pub category: Option<String>,
    pub sort: SortDirective,
}

impl ViewQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty string clears the filter, the way the "all brands" option does.
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = non_empty(brand.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = non_empty(category.into());
        self
    }

    pub fn with_sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = SortDirective::new(field, order);
        self
    }

    pub fn matches(&self, product: &Product) -> bool {
        let brand_ok = self.brand.as_deref().is_none_or(|b| product.brand() == b);
        let category_ok = self
            .category
            .as_deref()
            .is_none_or(|c| product.category_name() == c);
        brand_ok && category_ok
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Where the baseline visibility rules are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterLayer {
    /// Drop invisible products when a snapshot is loaded.
    Store,
    /// Keep the whole snapshot and hide products during projection.
    #[default]
    View,
}

impl FromStr for FilterLayer {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "store" => Ok(FilterLayer::Store),
            "view" => Ok(FilterLayer::View),
            other => Err(DomainError::validation(format!(
                "filter layer must be store or view, got {other:?}"
            ))),
        }
    }
}

/// Baseline rules deciding which products are shown at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityPolicy {
    pub require_stock: bool,
    pub require_positive_prices: bool,
    pub layer: FilterLayer,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self {
            require_stock: true,
            require_positive_prices: true,
            layer: FilterLayer::View,
        }
    }
}

impl VisibilityPolicy {
    /// Show everything.
    pub fn permissive() -> Self {
        Self {
            require_stock: false,
            require_positive_prices: false,
            layer: FilterLayer::View,
        }
    }

    /// Only the `stock > 0` baseline, applied during projection.
    pub fn in_stock_only() -> Self {
        Self {
            require_stock: true,
            ..Self::permissive()
        }
    }

    pub fn at(mut self, layer: FilterLayer) -> Self {
        self.layer = layer;
        self
    }

    pub fn admits(&self, product: &Product) -> bool {
        (!self.require_stock || product.is_in_stock())
            && (!self.require_positive_prices || product.has_positive_prices())
    }

    /// `admits` when the rules live at `layer`, otherwise everything passes.
    pub fn admits_at(&self, layer: FilterLayer, product: &Product) -> bool {
        self.layer != layer || self.admits(product)
    }
}

/// String ordering close to a root-locale collation.
///
/// Letters compare case-insensitively first; strings equal under that rule
/// are ordered lowercase-first at the first differing character, so distinct
/// strings never compare equal.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    let folded = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
    folded(a).cmp(&folded(b)).then_with(|| {
        let case_rank = |c: char| u8::from(!c.is_lowercase());
        a.chars()
            .zip(b.chars())
            .find(|(x, y)| x != y)
            .map(|(x, y)| case_rank(x).cmp(&case_rank(y)))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(b))
    })
}

/// Keys order by class first: missing, then numbers, then other text.
fn key_class(key: &SortKey<'_>) -> u8 {
    match key {
        SortKey::Text("") => 0,
        SortKey::Numeric { .. } => 1,
        SortKey::Text(_) => 2,
    }
}

fn compare_keys(a: SortKey<'_>, b: SortKey<'_>) -> Ordering {
    key_class(&a).cmp(&key_class(&b)).then_with(|| match (a, b) {
        (SortKey::Numeric { value: x, text: tx }, SortKey::Numeric { value: y, text: ty }) => {
            x.total_cmp(&y).then_with(|| locale_cmp(tx, ty))
        }
        _ => locale_cmp(a.as_text(), b.as_text()),
    })
}

/// Compare two products under `sort`.
pub fn compare(a: &Product, b: &Product, sort: &SortDirective) -> Ordering {
    let ordering = compare_keys(sort.field.key(a), sort.field.key(b));
    match sort.order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

/// Filtered, sorted view of `products`.
///
/// The sort is stable: products with equal keys keep their catalog order in
/// both directions.
pub fn project<'a>(
    products: &'a [Product],
    query: &ViewQuery,
    policy: &VisibilityPolicy,
) -> Vec<&'a Product> {
    let mut view: Vec<&Product> = products
        .iter()
        .filter(|p| policy.admits_at(FilterLayer::View, p))
        .filter(|p| query.matches(p))
        .collect();

    view.sort_by(|a, b| compare(a, b, &query.sort));

    tracing::trace!(
        total = products.len(),
        shown = view.len(),
        sort = query.sort.field.as_str(),
        order = query.sort.order.as_str(),
        "projected catalog view"
    );

    view
}

/// Distinct filter values present in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Facets {
    pub brands: Vec<String>,
    pub categories: Vec<String>,
}

/// Distinct non-empty brands and category names, in first-seen order.
///
/// Computed over the full collection, not the filtered view, so the selectors
/// keep offering every value.
pub fn facets(products: &[Product]) -> Facets {
    fn push_unique(values: &mut Vec<String>, candidate: &str) {
        if !candidate.is_empty() && !values.iter().any(|v| v == candidate) {
            values.push(candidate.to_string());
        }
    }

    let mut facets = Facets::default();
    for product in products {
        push_unique(&mut facets.brands, product.brand());
        push_unique(&mut facets.categories, product.category_name());
    }
    facets
}
