//! Binding target selectors.
//!
//! A selector is a comma-separated conjunction of `key=value` terms:
//!
//! ```text
//! type=rds-postgres,label.tier=primary
//! name=orders-*
//! capability=queue:sqs
//! ```
//!
//! Supported keys are `name`, `type`, `capability` and `label.<key>`. A value
//! ending in `*` matches by prefix. A selector must match exactly one
//! component; the source component itself is never a candidate.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors from parsing or evaluating a selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("selector is empty")]
    Empty,

    #[error("term '{0}' is not of the form key=value")]
    MalformedTerm(String),

    #[error("unknown selector key '{0}' (expected name, type, capability or label.<key>)")]
    UnknownKey(String),

    #[error("no component matches")]
    NoMatch,

    #[error("matches {} components", .0.len())]
    Ambiguous(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Key {
    Name,
    Type,
    Capability,
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Exact(String),
    Prefix(String),
}

impl Pattern {
    fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Exact(expected) => value == expected,
            Pattern::Prefix(prefix) => value.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    key: Key,
    pattern: Pattern,
}

/// A component as seen by a selector.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub name: &'a str,
    pub component_type: &'a str,
    pub labels: &'a BTreeMap<String, String>,
    pub capabilities: &'a [String],
}

/// A parsed selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    terms: Vec<Term>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let terms = input
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(parse_term)
            .collect::<Result<Vec<_>, _>>()?;
        if terms.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(Self {
            source: input.trim().to_string(),
            terms,
        })
    }

    pub fn matches(&self, candidate: &Candidate<'_>) -> bool {
        self.terms.iter().all(|term| match &term.key {
            Key::Name => term.pattern.matches(candidate.name),
            Key::Type => term.pattern.matches(candidate.component_type),
            Key::Capability => candidate
                .capabilities
                .iter()
                .any(|c| term.pattern.matches(c)),
            Key::Label(label) => candidate
                .labels
                .get(label)
                .is_some_and(|v| term.pattern.matches(v)),
        })
    }

    /// The single candidate this selector picks for `source`.
    pub fn select<'c>(
        &self,
        source: &str,
        candidates: &'c [Candidate<'c>],
    ) -> Result<&'c Candidate<'c>, SelectorError> {
        let matched: Vec<&Candidate<'c>> = candidates
            .iter()
            .filter(|c| c.name != source && self.matches(c))
            .collect();
        match matched.as_slice() {
            [] => Err(SelectorError::NoMatch),
            [single] => Ok(*single),
            many => Err(SelectorError::Ambiguous(
                many.iter().map(|c| c.name.to_string()).collect(),
            )),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_term(term: &str) -> Result<Term, SelectorError> {
    let (key, value) = term
        .split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .ok_or_else(|| SelectorError::MalformedTerm(term.to_string()))?;

    let key = match key {
        "name" => Key::Name,
        "type" => Key::Type,
        "capability" => Key::Capability,
        other => match other.strip_prefix("label.") {
            Some(label) if !label.is_empty() => Key::Label(label.to_string()),
            _ => return Err(SelectorError::UnknownKey(other.to_string())),
        },
    };

    let pattern = match value.strip_suffix('*') {
        Some(prefix) => Pattern::Prefix(prefix.to_string()),
        None => Pattern::Exact(value.to_string()),
    };

    Ok(Term { key, pattern })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        labels: BTreeMap<String, String>,
        no_labels: BTreeMap<String, String>,
        db_caps: Vec<String>,
        queue_caps: Vec<String>,
    }

    fn fixture() -> Fixture {
        Fixture {
            labels: [("tier".to_string(), "primary".to_string())].into(),
            no_labels: BTreeMap::new(),
            db_caps: vec!["db:postgres".to_string()],
            queue_caps: vec!["queue:sqs".to_string()],
        }
    }

    fn candidates(f: &Fixture) -> Vec<Candidate<'_>> {
        vec![
            Candidate {
                name: "api",
                component_type: "lambda-api",
                labels: &f.no_labels,
                capabilities: &[],
            },
            Candidate {
                name: "orders-db",
                component_type: "rds-postgres",
                labels: &f.labels,
                capabilities: &f.db_caps,
            },
            Candidate {
                name: "orders-replica",
                component_type: "rds-postgres",
                labels: &f.no_labels,
                capabilities: &f.db_caps,
            },
            Candidate {
                name: "events",
                component_type: "sqs-queue",
                labels: &f.no_labels,
                capabilities: &f.queue_caps,
            },
        ]
    }

    #[test]
    fn selects_single_match() {
        let f = fixture();
        let all = candidates(&f);
        let selector = Selector::parse("type=rds-postgres, label.tier=primary").unwrap();
        assert_eq!(selector.select("api", &all).unwrap().name, "orders-db");

        let selector = Selector::parse("capability=queue:*").unwrap();
        assert_eq!(selector.select("api", &all).unwrap().name, "events");
    }

    #[test]
    fn reports_ambiguity_with_candidates() {
        let f = fixture();
        let all = candidates(&f);
        let selector = Selector::parse("name=orders-*").unwrap();
        assert_eq!(
            selector.select("api", &all).unwrap_err(),
            SelectorError::Ambiguous(vec!["orders-db".into(), "orders-replica".into()])
        );
    }

    #[test]
    fn excludes_the_source_component() {
        let f = fixture();
        let all = candidates(&f);
        let selector = Selector::parse("type=sqs-queue").unwrap();
        assert_eq!(selector.select("events", &all).unwrap_err(), SelectorError::NoMatch);
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert_eq!(Selector::parse(" , ").unwrap_err(), SelectorError::Empty);
        assert!(matches!(
            Selector::parse("type").unwrap_err(),
            SelectorError::MalformedTerm(_)
        ));
        assert_eq!(
            Selector::parse("color=red").unwrap_err(),
            SelectorError::UnknownKey("color".into())
        );
    }
}
