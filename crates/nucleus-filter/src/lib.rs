//! Nucleus Filter - LDAP-style attribute filter engine.
//!
//! Filters are boolean expressions over string-keyed property maps, in the
//! classic LDAP surface syntax:
//!
//! - `(attr=value)`, `(attr>=value)`, `(attr<=value)`
//! - presence: `(attr=*)`, substrings: `(attr=foo*bar)`
//! - combinators: `(&(..)(..))`, `(|(..)(..))`, `(!(..))`
//!
//! Attribute names are matched case-insensitively, values case-sensitively.
//! A missing attribute makes its comparison false, never an error.
//! Multi-valued (array) properties match if any element matches.
//!
//! # Example
//!
//! ```rust
//! use nucleus_filter::Filter;
//! use nucleus_core::Properties;
//! use serde_json::json;
//!
//! let filter = Filter::parse("(&(objectclass=logger)(level>=3))").unwrap();
//!
//! let mut props = Properties::new();
//! props.insert("objectclass".to_string(), json!(["logger", "sink"]));
//! props.insert("level".to_string(), json!(5));
//! assert!(filter.matches(&props));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod expr;
mod parse;

pub use error::FilterError;

use expr::Node;
use nucleus_core::Properties;
use std::fmt;
use std::str::FromStr;

/// A parsed, immutable filter expression.
///
/// Stateless after construction: evaluation is deterministic and
/// side-effect-free. The `Display` form is a canonical re-serialization of
/// the parsed tree; it need not be byte-identical to the input but
/// re-parses to an equivalent tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    node: Node,
}

impl Filter {
    /// Parse a filter string.
    ///
    /// # Errors
    ///
    /// Returns a [`FilterError`] naming the offending fragment for
    /// unbalanced parentheses, unknown operators, or empty expressions.
    pub fn parse(src: &str) -> Result<Self, FilterError> {
        Ok(Self {
            node: parse::Parser::new(src).parse()?,
        })
    }

    /// Evaluate the filter against a property map.
    #[must_use]
    pub fn matches(&self, props: &Properties) -> bool {
        self.node.matches(props)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(pairs: &[(&str, serde_json::Value)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_missing_attribute_is_false_not_error() {
        let filter = Filter::parse("(vendor=acme)").unwrap();
        assert!(!filter.matches(&Properties::new()));

        // ...and stays false under negation's usual rules.
        let negated = Filter::parse("(!(vendor=acme))").unwrap();
        assert!(negated.matches(&Properties::new()));
    }

    #[test]
    fn test_attribute_names_case_insensitive() {
        let filter = Filter::parse("(VENDOR=acme)").unwrap();
        assert!(filter.matches(&props(&[("vendor", json!("acme"))])));
        assert!(!filter.matches(&props(&[("vendor", json!("ACME"))])));
    }

    #[test]
    fn test_array_membership() {
        let filter = Filter::parse("(objectclass=logger)").unwrap();
        assert!(filter.matches(&props(&[("objectclass", json!(["logger", "sink"]))])));
        assert!(!filter.matches(&props(&[("objectclass", json!(["printer"]))])));
    }

    #[test]
    fn test_short_circuit_combinators() {
        let filter = Filter::parse("(&(a=1)(b=2))").unwrap();
        assert!(filter.matches(&props(&[("a", json!(1)), ("b", json!(2))])));
        assert!(!filter.matches(&props(&[("a", json!(1))])));

        let filter = Filter::parse("(|(a=1)(b=2))").unwrap();
        assert!(filter.matches(&props(&[("b", json!(2))])));
    }

    #[test]
    fn test_display_round_trips_to_equivalent_tree() {
        for src in [
            "(vendor=acme)",
            "(vendor=*)",
            "( vendor = acme )",
            "(name=foo*bar*)",
            "(&(a=1)(|(b=2)(c=3))(!(d=4)))",
            "(service.ranking>=5)",
            r"(path=a\*b\(c\))",
        ] {
            let parsed = Filter::parse(src).unwrap();
            let reparsed = Filter::parse(&parsed.to_string()).unwrap();
            assert_eq!(parsed, reparsed, "canonical form of {src} did not round-trip");
        }
    }

    #[test]
    fn test_match_is_deterministic() {
        let filter = Filter::parse("(&(a>=1)(a<=3))").unwrap();
        let p = props(&[("a", json!(2))]);
        for _ in 0..3 {
            assert!(filter.matches(&p));
        }
    }
}
