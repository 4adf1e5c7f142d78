use core::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use pricelist_core::{Entity, ProductId, ValueObject};

/// Coerce backend text into a number.
///
/// Surrounding whitespace is ignored, whitespace inside the number is treated
/// as digit grouping (`"1 200"`), and a lone decimal comma is accepted
/// (`"12,5"`). When both separators appear, commas are thousands separators.
/// An empty string coerces to `0`. Anything else that does not parse to a
/// finite number yields `None`.
pub fn coerce_number(text: &str) -> Option<f64> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();

    if compact.is_empty() {
        return Some(0.0);
    }

    let normalized = if compact.contains('.') {
        compact.replace(',', "")
    } else {
        compact.replace(',', ".")
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A numeric product field as transmitted by the backend.
///
/// Prices and stock arrive either as JSON numbers or as strings. The received
/// text is kept next to the coerced value so that non-numeric content can
/// still take part in string ordering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Amount {
    raw: Option<String>,
    value: Option<f64>,
}

impl ValueObject for Amount {}

impl Amount {
    /// An absent value (`null` or a missing key).
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn from_number(value: f64) -> Self {
        Self {
            raw: Some(value.to_string()),
            value: value.is_finite().then_some(value),
        }
    }

    pub fn parse(text: &str) -> Self {
        Self {
            raw: Some(text.to_string()),
            value: coerce_number(text),
        }
    }

    /// Coerced numeric value, if the field is numeric at all.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Original text, or the empty string when absent.
    pub fn text(&self) -> &str {
        self.raw.as_deref().unwrap_or("")
    }

    pub fn is_present(&self) -> bool {
        self.raw.is_some()
    }

    /// `true` only for values that coerce to a number strictly above zero.
    pub fn is_positive(&self) -> bool {
        self.value.is_some_and(|v| v > 0.0)
    }

    pub fn sort_key(&self) -> SortKey<'_> {
        match self.value {
            Some(value) => SortKey::Numeric {
                value,
                text: self.text(),
            },
            _ => SortKey::Text(self.text()),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.text())
    }
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Self::from_number(value)
    }
}

impl From<&str> for Amount {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (&self.value, &self.raw) {
            (Some(v), _) => serializer.serialize_f64(*v),
            (None, Some(raw)) => serializer.serialize_str(raw),
            (None, None) => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number, a numeric string, or null")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                Ok(Amount {
                    raw: Some(v.to_string()),
                    value: Some(v as f64),
                })
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount {
                    raw: Some(v.to_string()),
                    value: Some(v as f64),
                })
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                Ok(Amount::from_number(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                Ok(Amount::parse(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Amount, E> {
                Ok(Amount {
                    raw: Some(v.to_string()),
                    value: None,
                })
            }

            fn visit_none<E: de::Error>(self) -> Result<Amount, E> {
                Ok(Amount::missing())
            }

            fn visit_unit<E: de::Error>(self) -> Result<Amount, E> {
                Ok(Amount::missing())
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Amount, D::Error> {
                Amount::deserialize(d)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Comparison key extracted from one product field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortKey<'a> {
    /// A field whose value coerced to a number; `text` is the received form.
    Numeric { value: f64, text: &'a str },
    /// Anything else. Missing values are the empty string.
    Text(&'a str),
}

impl<'a> SortKey<'a> {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SortKey::Numeric { value, .. } => Some(*value),
            SortKey::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> &'a str {
        match self {
            SortKey::Numeric { text, .. } => text,
            SortKey::Text(text) => text,
        }
    }
}

/// Product record as served by `GET /products`.
///
/// Snapshots are immutable: a reload replaces the whole collection rather than
/// patching individual records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub article: Option<String>,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub price_uah: Amount,
    #[serde(default)]
    pub price_usd: Amount,
    #[serde(default)]
    pub stock: Amount,
    #[serde(default)]
    pub image: Option<String>,
}

impl Product {
    /// A bare record with only an id; the remaining fields are absent.
    pub fn new(id: impl Into<ProductId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            brand: None,
            category: None,
            category_name: None,
            article: None,
            product_code: None,
            price_uah: Amount::missing(),
            price_usd: Amount::missing(),
            stock: Amount::missing(),
            image: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_category_name(mut self, name: impl Into<String>) -> Self {
        self.category_name = Some(name.into());
        self
    }

    pub fn with_prices(mut self, uah: impl Into<Amount>, usd: impl Into<Amount>) -> Self {
        self.price_uah = uah.into();
        self.price_usd = usd.into();
        self
    }

    pub fn with_stock(mut self, stock: impl Into<Amount>) -> Self {
        self.stock = stock.into();
        self
    }

    pub fn brand(&self) -> &str {
        self.brand.as_deref().unwrap_or("")
    }

    pub fn category_name(&self) -> &str {
        self.category_name.as_deref().unwrap_or("")
    }

    pub fn is_in_stock(&self) -> bool {
        self.stock.is_positive()
    }

    /// Both prices coerce to a number above zero.
    pub fn has_positive_prices(&self) -> bool {
        self.price_uah.is_positive() && self.price_usd.is_positive()
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
