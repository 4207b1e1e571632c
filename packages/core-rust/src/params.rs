//! Ordered request parameters.
//!
//! Parameters travel as `name=value` pairs in form bodies, multipart text
//! parts, and query strings. Insertion order is preserved end to end so the
//! wire body matches the order the caller built it in.

use serde::{Deserialize, Serialize};

/// A single request parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name as sent on the wire.
    pub name: String,
    /// Parameter value (UTF-8 text).
    pub value: String,
}

impl Parameter {
    /// Creates a parameter from anything convertible into strings.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered sequence of request parameters.
///
/// Names are not required to be unique. [`Params::get`] returns the first
/// occurrence; callers should avoid sending duplicates because the receiving
/// side gives no guarantee about which one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Vec<Parameter>);

impl Params {
    /// Creates an empty parameter list.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a parameter, keeping insertion order.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(Parameter::new(name, value));
    }

    /// Builder-style variant of [`Params::push`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    /// Returns the value of the first parameter named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Whether a parameter named `name` is present (blank values count).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.name == name)
    }

    /// Number of parameters, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over parameters in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.0.iter()
    }

    /// Parameter names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.name.as_str())
    }

    /// Returns a copy with all parameters named `name` removed.
    #[must_use]
    pub fn without(&self, name: &str) -> Self {
        self.0.iter().filter(|p| p.name != name).cloned().collect()
    }
}

impl From<Vec<Parameter>> for Params {
    fn from(params: Vec<Parameter>) -> Self {
        Self(params)
    }
}

impl<N, V> FromIterator<(N, V)> for Params
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| Parameter::new(name, value))
                .collect(),
        )
    }
}

impl FromIterator<Parameter> for Params {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Params {
    type Item = Parameter;
    type IntoIter = std::vec::IntoIter<Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Extend<Parameter> for Params {
    fn extend<I: IntoIterator<Item = Parameter>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn get_returns_first_occurrence() {
        let params = Params::new()
            .with("username", "teo")
            .with("username", "other");
        assert_eq!(params.get("username"), Some("teo"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn get_missing_is_none() {
        let params = Params::new().with("a", "1");
        assert_eq!(params.get("b"), None);
        assert!(!params.contains("b"));
    }

    #[test]
    fn without_drops_every_match() {
        let params: Params = vec![("module", "users"), ("op", "x"), ("module", "again")]
            .into_iter()
            .collect();
        let rest = params.without("module");
        assert_eq!(rest.names().collect::<Vec<_>>(), vec!["op"]);
    }

    #[test]
    fn serializes_as_plain_array() {
        let params = Params::new().with("a", "1");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!([{"name": "a", "value": "1"}]));
    }

    proptest! {
        #[test]
        fn insertion_order_is_preserved(
            pairs in prop::collection::vec(("[a-z]{1,8}", ".{0,12}"), 0..32),
        ) {
            let mut params = Params::new();
            for (name, value) in &pairs {
                params.push(name.clone(), value.clone());
            }
            let back: Vec<(String, String)> = params
                .into_iter()
                .map(|p| (p.name, p.value))
                .collect();
            prop_assert_eq!(back, pairs);
        }
    }
}
