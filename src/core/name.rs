//! Metric identity: a dotted key plus ordered tags.
//!
//! Names are validated once, when they are built. Recording paths only ever
//! see an already-valid `MetricName`.

use crate::core::error::{MetricsError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

static VALID_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}0-9\-_./]+$").expect("valid metric name pattern"));

/// Importance of a metric, used by exporters to pick what to ship
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetricLevel {
    Trivial,
    Minor,
    #[default]
    Normal,
    Major,
    Critical,
}

/// Identity of a metric.
///
/// Equality, hashing and ordering consider the key and the tags only; the
/// level is descriptive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricName {
    key: String,
    tags: BTreeMap<String, String>,
    #[serde(default)]
    level: MetricLevel,
}

fn validate(what: &str, value: &str) -> Result<()> {
    if VALID_SEGMENT.is_match(value) {
        Ok(())
    } else {
        Err(MetricsError::invalid_name(format!(
            "{} '{}' must match [A-Za-z0-9-_./] or unicode letters",
            what, value
        )))
    }
}

impl MetricName {
    /// Creates a new name with no tags after validating the key
    pub fn new<S: Into<String>>(key: S) -> Result<Self> {
        let key = key.into();
        validate("key", &key)?;
        Ok(Self {
            key,
            tags: BTreeMap::new(),
            level: MetricLevel::Normal,
        })
    }

    /// Creates a name with tags, validating key and every tag value
    pub fn with_tags<S, I, K, V>(key: S, tags: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut name = Self::new(key)?;
        for (k, v) in tags {
            name = name.tagged(k, v)?;
        }
        Ok(name)
    }

    /// Adds (or replaces) one tag
    pub fn tagged<K: Into<String>, V: Into<String>>(mut self, tag: K, value: V) -> Result<Self> {
        let tag = tag.into();
        let value = value.into();
        if tag.is_empty() {
            return Err(MetricsError::invalid_name("tag name cannot be empty"));
        }
        validate("tag value", &value)?;
        self.tags.insert(tag, value);
        Ok(self)
    }

    /// Appends a dotted segment to the key, keeping tags and level
    pub fn resolve(&self, part: &str) -> Result<Self> {
        validate("key segment", part)?;
        let key = if self.key.is_empty() {
            part.to_string()
        } else {
            format!("{}.{}", self.key, part)
        };
        Ok(Self {
            key,
            tags: self.tags.clone(),
            level: self.level,
        })
    }

    /// Returns a copy with a different level
    pub fn with_level(mut self, level: MetricLevel) -> Self {
        self.level = level;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).map(String::as_str)
    }

    pub fn level(&self) -> MetricLevel {
        self.level
    }
}

impl PartialEq for MetricName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.tags == other.tags
    }
}

impl Eq for MetricName {}

impl Hash for MetricName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.tags.hash(state);
    }
}

impl PartialOrd for MetricName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetricName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.tags.cmp(&other.tags))
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if !self.tags.is_empty() {
            write!(f, "{{")?;
            for (i, (k, v)) in self.tags.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}={}", k, v)?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(MetricName::new("middleware.hsf.qps").is_ok());
        assert!(MetricName::new("jvm/gc-count_total").is_ok());
        assert!(MetricName::new("请求.耗时").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(MetricName::new("").is_err());
        assert!(MetricName::new("has space").is_err());
        assert!(MetricName::new("semi;colon").is_err());
        assert!(MetricName::new("a=b").is_err());
    }

    #[test]
    fn test_invalid_tag_value() {
        let err = MetricName::new("rpc").unwrap().tagged("service", "a b").unwrap_err();
        assert_eq!(err.category(), "name");
        assert!(MetricName::new("rpc").unwrap().tagged("", "x").is_err());
    }

    #[test]
    fn test_structural_equality_ignores_level() {
        let a = MetricName::with_tags("rpc.qps", [("b", "2"), ("a", "1")]).unwrap();
        let b = MetricName::with_tags("rpc.qps", [("a", "1"), ("b", "2")])
            .unwrap()
            .with_level(MetricLevel::Critical);
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn test_ordering_by_key_then_tags() {
        let a = MetricName::new("a").unwrap();
        let b = MetricName::new("b").unwrap();
        let a_tagged = MetricName::new("a").unwrap().tagged("x", "1").unwrap();
        assert!(a < b);
        assert!(a < a_tagged);
        assert!(a_tagged < b);
    }

    #[test]
    fn test_resolve_and_display() {
        let base = MetricName::new("shop")
            .unwrap()
            .tagged("region", "eu")
            .unwrap()
            .tagged("app", "cart")
            .unwrap();
        let resolved = base.resolve("checkout").unwrap();
        assert_eq!(resolved.key(), "shop.checkout");
        assert_eq!(resolved.tag("region"), Some("eu"));
        assert_eq!(resolved.to_string(), "shop.checkout{app=cart,region=eu}");
        assert!(base.resolve("bad part").is_err());
    }
}
