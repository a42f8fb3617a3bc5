//! # Equality-based label selectors.
//!
//! Grammar (comma separated requirements, whitespace ignored):
//! ```text
//! app=myapp        label `app` equals `myapp`   (`==` is accepted too)
//! tier!=db         label `tier` absent or not equal to `db`
//! env              label `env` present (any value)
//! ```
//! The empty selector matches every resource.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty label key in requirement {0:?}")]
    EmptyKey(String),

    #[error("invalid character in requirement {0:?}")]
    InvalidRequirement(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
            Requirement::Exists(k) => labels.contains_key(k),
        }
    }

    fn parse(raw: &str) -> Result<Self, SelectorError> {
        let (key, value, negate) = if let Some((k, v)) = raw.split_once("!=") {
            (k, Some(v), true)
        } else if let Some((k, v)) = raw.split_once("==") {
            (k, Some(v), false)
        } else if let Some((k, v)) = raw.split_once('=') {
            (k, Some(v), false)
        } else {
            (raw, None, false)
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(SelectorError::EmptyKey(raw.to_string()));
        }
        if key.contains(['=', '!']) {
            return Err(SelectorError::InvalidRequirement(raw.to_string()));
        }

        Ok(match value.map(str::trim) {
            Some(v) if v.contains(['=', '!']) => {
                return Err(SelectorError::InvalidRequirement(raw.to_string()));
            }
            Some(v) if negate => Requirement::NotEquals(key.to_string(), v.to_string()),
            Some(v) => Requirement::Equals(key.to_string(), v.to_string()),
            None => Requirement::Exists(key.to_string()),
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Equals(k, v) => write!(f, "{k}={v}"),
            Requirement::NotEquals(k, v) => write!(f, "{k}!={v}"),
            Requirement::Exists(k) => write!(f, "{k}"),
        }
    }
}

/// Selection criterion over resource labels (all requirements must hold).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Selector that matches everything.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Parses a selector string, see the module docs for the grammar.
    pub fn parse(raw: &str) -> Result<Self, SelectorError> {
        let requirements = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Requirement::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }

    /// Adds an equality requirement.
    #[must_use]
    pub fn with_equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements
            .push(Requirement::Equals(key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{r}")?;
        }
        Ok(())
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
    fn test_empty_selector_matches_everything() {
        let sel = LabelSelector::parse("  ").unwrap();
        assert!(sel.is_empty());
        assert!(sel.matches(&labels(&[])));
        assert!(sel.matches(&labels(&[("app", "x")])));
    }

    #[test]
    fn test_mixed_requirements() {
        let sel: LabelSelector = "app=myapp, tier!=db ,env".parse().unwrap();
        assert_eq!(sel.to_string(), "app=myapp,tier!=db,env");

        assert!(sel.matches(&labels(&[("app", "myapp"), ("env", "prod")])));
        assert!(sel.matches(&labels(&[("app", "myapp"), ("env", ""), ("tier", "web")])));
        assert!(!sel.matches(&labels(&[("app", "myapp"), ("env", "prod"), ("tier", "db")])));
        assert!(!sel.matches(&labels(&[("app", "other"), ("env", "prod")])));
        assert!(!sel.matches(&labels(&[("app", "myapp")])));
    }

    #[test]
    fn test_double_equals_is_equality() {
        let sel = LabelSelector::parse("component==my-config").unwrap();
        assert_eq!(sel, LabelSelector::everything().with_equals("component", "my-config"));
    }

    #[test]
    fn test_rejects_malformed_requirements() {
        assert_eq!(
            LabelSelector::parse("=x"),
            Err(SelectorError::EmptyKey("=x".into()))
        );
        assert!(matches!(
            LabelSelector::parse("a=b=c"),
            Err(SelectorError::InvalidRequirement(_))
        ));
    }
}
