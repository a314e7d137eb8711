//! Hierarchical cache keys.
//!
//! A [`QueryKey`] is an ordered list of segments: a resource kind first, then
//! sub-operation names and parameter objects, e.g.
//! `["posts", "listing", {"page": 2, "search": "rust"}]`. Keys compare and
//! hash by value, so two keys built from equal inputs always address the same
//! cache entry.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use serde_json::{Map, Value};

/// Identifies one cached read result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKey {
    segments: Vec<Value>,
}

impl QueryKey {
    /// A key consisting of a single resource kind.
    ///
    /// ```
    /// use plaza::subscription::http::QueryKey;
    ///
    /// let all_posts = QueryKey::new("posts");
    /// let listing = all_posts.clone().segment("listing");
    /// assert!(listing.starts_with(&all_posts));
    /// ```
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            segments: vec![Value::String(kind.into())],
        }
    }

    /// Appends a name segment such as `listing` or an entity id.
    #[must_use]
    pub fn segment(mut self, name: impl Into<String>) -> Self {
        self.segments.push(Value::String(name.into()));
        self
    }

    /// Appends a parameter object.
    ///
    /// Parameters are stored as canonical JSON, so field order never matters.
    /// A value that fails to serialize becomes `null` instead of an error:
    /// key construction is total.
    #[must_use]
    pub fn params<P: Serialize + ?Sized>(mut self, params: &P) -> Self {
        self.segments
            .push(serde_json::to_value(params).unwrap_or(Value::Null));
        self
    }

    /// Appends an optional parameter object; `None` becomes `{}`.
    #[must_use]
    pub fn params_opt<P: Serialize>(self, params: Option<&P>) -> Self {
        match params {
            Some(params) => self.params(params),
            None => self.params(&Map::new()),
        }
    }

    /// The raw segments.
    #[must_use]
    pub fn segments(&self) -> &[Value] {
        &self.segments
    }

    /// Returns `true` if `prefix`'s segments are a leading run of this key's.
    ///
    /// Every key starts with itself.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.len().hash(state);
        for segment in &self.segments {
            hash_value(segment, state);
        }
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Number(n) => {
            2u8.hash(state);
            // Number equality is representation based, and so is its Display.
            n.to_string().hash(state);
        }
        Value::String(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        Value::Array(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(map) => {
            5u8.hash(state);
            map.len().hash(state);
            // serde_json's default map is ordered by key
            for (k, v) in map {
                k.hash(state);
                hash_value(v, state);
            }
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                Value::String(s) => f.write_str(s)?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for QueryKey {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

/// Selects the cache entries an invalidation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyFilter {
    /// Every key that starts with this key, including the key itself.
    Prefix(QueryKey),
    /// Only this key.
    Exact(QueryKey),
}

impl KeyFilter {
    /// Returns `true` if `key` is selected by this filter.
    #[must_use]
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Prefix(prefix) => key.starts_with(prefix),
            Self::Exact(exact) => key == exact,
        }
    }
}

impl From<QueryKey> for KeyFilter {
    fn from(key: QueryKey) -> Self {
        Self::Prefix(key)
    }
}

impl From<&QueryKey> for KeyFilter {
    fn from(key: &QueryKey) -> Self {
        Self::Prefix(key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::hash_map::DefaultHasher;

    #[derive(Serialize)]
    struct Paging {
        page: u32,
        search: Option<String>,
    }

    fn hash_of(key: &QueryKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equal_inputs_give_equal_keys() {
        let a = QueryKey::new("users").segment("listing").params(&Paging {
            page: 1,
            search: Some("kim".into()),
        });
        let b = QueryKey::new("users").segment("listing").params(&Paging {
            page: 1,
            search: Some("kim".into()),
        });
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_any_differing_qualifier_changes_the_key() {
        let base = || QueryKey::new("users").segment("listing");
        let p1 = base().params(&Paging { page: 1, search: None });
        let p2 = base().params(&Paging { page: 2, search: None });
        let p3 = base().params(&Paging {
            page: 1,
            search: Some(String::new()),
        });
        assert_ne!(p1, p2);
        assert_ne!(p1, p3);
        assert_ne!(base(), p1);
        assert_ne!(QueryKey::new("users"), QueryKey::new("tags"));
    }

    #[test]
    fn test_object_field_order_is_irrelevant() {
        let a = QueryKey::new("t").params(&serde_json::json!({"a": 1, "b": 2}));
        let b = QueryKey::new("t").params(&serde_json::json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_missing_params_are_an_empty_object() {
        let none = QueryKey::new("transactions").params_opt::<Paging>(None);
        let again = QueryKey::new("transactions").params_opt::<Paging>(None);
        assert_eq!(none, again);
        assert_eq!(none.segments()[1], Value::Object(Map::new()));
    }

    #[test]
    fn test_name_and_string_param_do_not_collide_with_numbers() {
        let named = QueryKey::new("posts").segment("1");
        let numbered = QueryKey::new("posts").params(&1);
        assert_ne!(named, numbered);
    }

    #[test]
    fn test_prefix_matching() {
        let all = QueryKey::new("comments");
        let by_post = all.clone().segment("byPost").segment("p-1");
        let listing = all.clone().segment("listing");

        assert!(KeyFilter::from(&all).matches(&by_post));
        assert!(KeyFilter::from(&all).matches(&all));
        assert!(!KeyFilter::from(&listing).matches(&by_post));
        assert!(!KeyFilter::from(&by_post).matches(&all));
        assert!(!KeyFilter::Prefix(QueryKey::new("comment")).matches(&all));
    }

    #[test]
    fn test_exact_matching() {
        let listing = QueryKey::new("posts").segment("listing");
        let paged = listing.clone().params(&Paging { page: 1, search: None });

        assert!(KeyFilter::Exact(listing.clone()).matches(&listing));
        assert!(!KeyFilter::Exact(listing).matches(&paged));
    }

    #[test]
    fn test_display() {
        let key = QueryKey::new("posts")
            .segment("listing")
            .params(&serde_json::json!({"page": 2}));
        assert_eq!(key.to_string(), r#"posts.listing.{"page":2}"#);
    }
}
