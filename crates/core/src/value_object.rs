//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity; two instances holding the same values are
/// interchangeable. Coerced amounts and sort directives are modelled this way.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct Amount(Option<f64>);
///
/// impl ValueObject for Amount {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
