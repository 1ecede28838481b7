//! Equality-based label selectors

use crate::error::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A conjunction of `key=value` requirements
///
/// An empty selector matches nothing. Workflows without template labels must
/// never claim every job in their namespace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Selector requiring every label in `labels`
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        Self {
            match_labels: labels.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        !self.is_empty()
            && self
                .match_labels
                .iter()
                .all(|(k, v)| labels.get(k) == Some(v))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .match_labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for LabelSelector {
    type Err = TypesError;

    fn from_str(s: &str) -> TypesResult<Self> {
        let mut match_labels = BTreeMap::new();
        for requirement in s.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            let (key, value) = requirement
                .split_once("==")
                .or_else(|| requirement.split_once('='))
                .ok_or_else(|| TypesError::InvalidSelector {
                    selector: s.to_string(),
                    reason: format!("requirement {:?} is not key=value", requirement),
                })?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                return Err(TypesError::InvalidSelector {
                    selector: s.to_string(),
                    reason: "empty label key".to_string(),
                });
            }
            match_labels.insert(key.to_string(), value.to_string());
        }
        Ok(Self { match_labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_subset_match() {
        let selector = LabelSelector::from_labels(&labels(&[("foo", "bar")]));
        assert!(selector.matches(&labels(&[("foo", "bar"), ("extra", "x")])));
        assert!(!selector.matches(&labels(&[("foo", "baz")])));
        assert!(!selector.matches(&labels(&[])));
    }

    #[test]
    fn test_empty_selector_matches_nothing() {
        let selector = LabelSelector::default();
        assert!(!selector.matches(&labels(&[("foo", "bar")])));
        assert!(!selector.matches(&labels(&[])));
    }

    #[test]
    fn test_parse_and_display() {
        let selector: LabelSelector = "app = web, tier==front".parse().unwrap();
        assert_eq!(selector.match_labels.len(), 2);
        assert_eq!(selector.to_string(), "app=web,tier=front");
    }

    #[test]
    fn test_parse_rejects_bare_key() {
        assert!("app".parse::<LabelSelector>().is_err());
        assert!("=web".parse::<LabelSelector>().is_err());
    }
}
