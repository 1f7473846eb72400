//! Caller-supplied annotation set.
//!
//! Annotations are propagated onto a copied image twice: as legacy config
//! labels and as OCI manifest annotations. They are also embedded in the
//! signing payload. A `BTreeMap` keeps iteration (and therefore payload
//! bytes) deterministic.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StowError};

/// Mapping of annotation key to value. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations(BTreeMap<String, String>);

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single `key=value` pair.
    ///
    /// The text must split on `=` into exactly two parts and the key must
    /// not be empty.
    pub fn parse_pair(pair: &str) -> Result<(String, String)> {
        let parts: Vec<&str> = pair.split('=').collect();
        if parts.len() != 2 {
            return Err(StowError::InvalidAnnotation(format!(
                "invalid key=value pair: {}",
                pair
            )));
        }
        if parts[0].is_empty() {
            return Err(StowError::InvalidAnnotation(format!(
                "empty key in pair: {}",
                pair
            )));
        }
        Ok((parts[0].to_string(), parts[1].to_string()))
    }

    /// Build a set from repeated `key=value` pairs. Later pairs win.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut annotations = Self::new();
        for pair in pairs {
            let (key, value) = Self::parse_pair(pair.as_ref())?;
            annotations.insert(key, value);
        }
        Ok(annotations)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Merge into an existing label map.
    ///
    /// Same-keyed labels are overwritten, unrelated labels are kept.
    pub fn merge_into(&self, labels: &mut HashMap<String, String>) {
        for (key, value) in &self.0 {
            labels.insert(key.clone(), value.clone());
        }
    }

    /// Project into a generic JSON value map for the signing payload.
    pub fn to_json_values(&self) -> BTreeMap<String, serde_json::Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect()
    }

    pub fn to_hash_map(&self) -> HashMap<String, String> {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl FromStr for Annotations {
    type Err = StowError;

    /// Parse a comma separated list of `key=value` pairs.
    fn from_str(s: &str) -> Result<Self> {
        Self::from_pairs(s.split(',').map(str::trim).filter(|p| !p.is_empty()))
    }
}

impl fmt::Display for Annotations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", pairs.join(","))
    }
}

impl From<BTreeMap<String, String>> for Annotations {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<HashMap<String, String>> for Annotations {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Annotations {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        let (k, v) = Annotations::parse_pair("env=prod").unwrap();
        assert_eq!(k, "env");
        assert_eq!(v, "prod");
    }

    #[test]
    fn test_parse_pair_empty_value() {
        let (k, v) = Annotations::parse_pair("flag=").unwrap();
        assert_eq!(k, "flag");
        assert_eq!(v, "");
    }

    #[test]
    fn test_parse_pair_rejects_missing_separator() {
        assert!(matches!(
            Annotations::parse_pair("env"),
            Err(StowError::InvalidAnnotation(_))
        ));
    }

    #[test]
    fn test_parse_pair_rejects_extra_separator() {
        assert!(Annotations::parse_pair("a=b=c").is_err());
    }

    #[test]
    fn test_parse_pair_rejects_empty_key() {
        assert!(Annotations::parse_pair("=prod").is_err());
    }

    #[test]
    fn test_from_pairs_later_wins() {
        let a = Annotations::from_pairs(["env=dev", "team=core", "env=prod"]).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.get("env"), Some("prod"));
    }

    #[test]
    fn test_from_str_comma_list() {
        let a: Annotations = "env=prod, team=core,".parse().unwrap();
        assert_eq!(a.get("env"), Some("prod"));
        assert_eq!(a.get("team"), Some("core"));
        assert_eq!(a.to_string(), "env=prod,team=core");
    }

    #[test]
    fn test_from_str_empty() {
        let a: Annotations = "".parse().unwrap();
        assert!(a.is_empty());
    }

    #[test]
    fn test_merge_overwrites_and_preserves() {
        let mut labels = HashMap::new();
        labels.insert("env".to_string(), "dev".to_string());
        labels.insert("maintainer".to_string(), "ops".to_string());

        let a: Annotations = [("env", "prod"), ("tier", "web")].into_iter().collect();
        a.merge_into(&mut labels);

        assert_eq!(labels.len(), 3);
        assert_eq!(labels["env"], "prod");
        assert_eq!(labels["maintainer"], "ops");
        assert_eq!(labels["tier"], "web");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut once = HashMap::new();
        once.insert("keep".to_string(), "me".to_string());
        let mut twice = once.clone();

        let a: Annotations = [("env", "prod"), ("keep", "overwritten")].into_iter().collect();
        a.merge_into(&mut once);
        a.merge_into(&mut twice);
        a.merge_into(&mut twice);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_to_json_values() {
        let a: Annotations = [("env", "prod")].into_iter().collect();
        let values = a.to_json_values();
        assert_eq!(values["env"], serde_json::json!("prod"));
    }

    #[test]
    fn test_serde_transparent() {
        let a: Annotations = serde_json::from_str(r#"{"env":"prod"}"#).unwrap();
        assert_eq!(a.get("env"), Some("prod"));
        assert_eq!(serde_json::to_string(&a).unwrap(), r#"{"env":"prod"}"#);
    }
}
