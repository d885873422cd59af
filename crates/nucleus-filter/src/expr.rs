//! The parsed filter expression tree and its evaluation rules.

use nucleus_core::{Properties, Value, get_ci};
use std::fmt;

/// Comparison operators recognized by the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Equal,
    GreaterEq,
    LessEq,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::GreaterEq => ">=",
            CompareOp::LessEq => "<=",
        }
    }
}

/// A node of the parsed expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    /// `(attr=*)` - true iff the attribute exists.
    Present { attr: String },
    /// `(attr=value)`, `(attr>=value)`, `(attr<=value)`.
    Compare {
        attr: String,
        op: CompareOp,
        operand: String,
    },
    /// `(attr=pre*mid*post)` - wildcard match over string values.
    /// `parts` are the literal segments between `*` markers; leading and
    /// trailing empty segments are significant.
    Substring { attr: String, parts: Vec<String> },
}

impl Node {
    /// Evaluate this node against a property map.
    ///
    /// A missing attribute makes the enclosing comparison false, never an
    /// error.
    pub(crate) fn matches(&self, props: &Properties) -> bool {
        match self {
            Node::And(children) => children.iter().all(|c| c.matches(props)),
            Node::Or(children) => children.iter().any(|c| c.matches(props)),
            Node::Not(child) => !child.matches(props),
            Node::Present { attr } => get_ci(props, attr).is_some(),
            Node::Compare { attr, op, operand } => get_ci(props, attr)
                .is_some_and(|value| compare_value(value, *op, operand)),
            Node::Substring { attr, parts } => get_ci(props, attr)
                .is_some_and(|value| substring_value(value, parts)),
        }
    }
}

/// Compare a single property value against a filter operand.
///
/// Multi-valued (array) properties match if any element matches.
fn compare_value(value: &Value, op: CompareOp, operand: &str) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| compare_value(v, op, operand)),
        Value::String(s) => match op {
            CompareOp::Equal => s == operand,
            CompareOp::GreaterEq => s.as_str() >= operand,
            CompareOp::LessEq => s.as_str() <= operand,
        },
        Value::Number(n) => {
            let operand = operand.trim();
            // Integer operands compare exactly. An f64 round-trip would
            // conflate distinct integers above 2^53.
            if let (Some(lhs), Ok(rhs)) = (n.as_i64(), operand.parse::<i64>()) {
                compare_ord(lhs, op, rhs)
            } else if let (Some(lhs), Ok(rhs)) = (n.as_u64(), operand.parse::<u64>()) {
                compare_ord(lhs, op, rhs)
            } else if let (Some(lhs), Ok(rhs)) = (n.as_f64(), operand.parse::<f64>()) {
                match op {
                    CompareOp::Equal => (lhs - rhs).abs() < f64::EPSILON,
                    CompareOp::GreaterEq => lhs >= rhs,
                    CompareOp::LessEq => lhs <= rhs,
                }
            } else {
                false
            }
        }
        Value::Bool(b) => {
            op == CompareOp::Equal && ((*b && operand == "true") || (!*b && operand == "false"))
        }
        Value::Null | Value::Object(_) => false,
    }
}

fn compare_ord<T: PartialOrd>(lhs: T, op: CompareOp, rhs: T) -> bool {
    match op {
        CompareOp::Equal => lhs == rhs,
        CompareOp::GreaterEq => lhs >= rhs,
        CompareOp::LessEq => lhs <= rhs,
    }
}

fn substring_value(value: &Value, parts: &[String]) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| substring_value(v, parts)),
        Value::String(s) => wildcard_match(parts, s),
        _ => false,
    }
}

/// Match `text` against the segments of a wildcard pattern
/// `parts[0] * parts[1] * ... * parts[n]`.
fn wildcard_match(parts: &[String], text: &str) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return text.is_empty();
    };
    let Some(mut remaining) = text.strip_prefix(first.as_str()) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        // Single segment, no wildcard: the whole text must be consumed.
        return remaining.is_empty();
    };
    for part in middle {
        match remaining.find(part.as_str()) {
            Some(idx) => {
                let after = idx.saturating_add(part.len());
                remaining = remaining.get(after..).unwrap_or("");
            }
            None => return false,
        }
    }
    remaining.ends_with(last.as_str())
}

/// Re-escape a literal for canonical rendering.
fn escape(literal: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for ch in literal.chars() {
        if matches!(ch, '\\' | '(' | ')' | '*') {
            write!(f, "\\")?;
        }
        write!(f, "{ch}")?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::And(children) => {
                write!(f, "(&")?;
                for c in children {
                    write!(f, "{c}")?;
                }
                write!(f, ")")
            }
            Node::Or(children) => {
                write!(f, "(|")?;
                for c in children {
                    write!(f, "{c}")?;
                }
                write!(f, ")")
            }
            Node::Not(child) => write!(f, "(!{child})"),
            Node::Present { attr } => write!(f, "({attr}=*)"),
            Node::Compare { attr, op, operand } => {
                write!(f, "({attr}{}", op.symbol())?;
                escape(operand, f)?;
                write!(f, ")")
            }
            Node::Substring { attr, parts } => {
                write!(f, "({attr}=")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "*")?;
                    }
                    escape(part, f)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_wildcard_match() {
        // "foo*" style
        assert!(wildcard_match(&seg(&["foo", ""]), "foobar"));
        assert!(!wildcard_match(&seg(&["foo", ""]), "barfoo"));
        // "*bar" style
        assert!(wildcard_match(&seg(&["", "bar"]), "foobar"));
        // "a*b*c" style
        assert!(wildcard_match(&seg(&["a", "b", "c"]), "axxbyyc"));
        assert!(!wildcard_match(&seg(&["a", "b", "c"]), "acb"));
        // bare "*"
        assert!(wildcard_match(&seg(&["", ""]), "anything"));
        assert!(wildcard_match(&seg(&["", ""]), ""));
    }

    #[test]
    fn test_numeric_compare() {
        assert!(compare_value(&Value::from(10), CompareOp::GreaterEq, "9"));
        assert!(compare_value(&Value::from(10), CompareOp::Equal, "10"));
        assert!(!compare_value(&Value::from(8), CompareOp::GreaterEq, "9"));
        assert!(compare_value(&Value::from(8), CompareOp::LessEq, "9"));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        // 2^53 and 2^53 + 1 round to the same f64.
        let above = Value::from(9_007_199_254_740_993_i64);
        assert!(compare_value(&above, CompareOp::Equal, "9007199254740993"));
        assert!(!compare_value(&above, CompareOp::Equal, "9007199254740992"));

        let at = Value::from(9_007_199_254_740_992_i64);
        assert!(!compare_value(&at, CompareOp::Equal, "9007199254740993"));
        assert!(compare_value(&at, CompareOp::LessEq, "9007199254740993"));

        assert!(compare_value(&Value::from(u64::MAX), CompareOp::Equal, &u64::MAX.to_string()));
        assert!(compare_value(&Value::from(-7_i64), CompareOp::LessEq, "-7"));
    }

    #[test]
    fn test_non_integer_operands_fall_back_to_f64() {
        assert!(compare_value(&Value::from(2.5), CompareOp::GreaterEq, "2"));
        assert!(compare_value(&Value::from(3), CompareOp::Equal, "3.0"));
        assert!(!compare_value(&Value::from(3), CompareOp::Equal, "not a number"));
    }

    #[test]
    fn test_array_any_element_matches() {
        let value = serde_json::json!(["alpha", "beta"]);
        assert!(compare_value(&value, CompareOp::Equal, "beta"));
        assert!(!compare_value(&value, CompareOp::Equal, "gamma"));
    }
}
