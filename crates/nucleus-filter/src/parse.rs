//! Recursive-descent parser for LDAP-style filter strings.

use crate::error::FilterError;
use crate::expr::{CompareOp, Node};

/// Longest fragment of remaining input echoed back in errors.
const FRAGMENT_LEN: usize = 24;

pub(crate) struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Parse a complete filter expression, requiring the whole input to be
    /// consumed.
    pub(crate) fn parse(mut self) -> Result<Node, FilterError> {
        self.skip_ws();
        if self.rest().is_empty() {
            return Err(FilterError::new("", "empty filter expression"));
        }
        let node = self.parse_filter()?;
        self.skip_ws();
        if !self.rest().is_empty() {
            return Err(self.error("trailing characters after filter"));
        }
        Ok(node)
    }

    fn rest(&self) -> &'a str {
        self.src.get(self.pos..).unwrap_or("")
    }

    fn error(&self, reason: impl Into<String>) -> FilterError {
        let rest = self.rest();
        let fragment = rest
            .char_indices()
            .nth(FRAGMENT_LEN)
            .map_or(rest, |(idx, _)| rest.get(..idx).unwrap_or(rest));
        FilterError::new(fragment, reason)
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos = self.pos.saturating_add(ch.len_utf8());
        Some(ch)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), FilterError> {
        if self.peek() == Some(ch) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected `{ch}`")))
        }
    }

    fn parse_filter(&mut self) -> Result<Node, FilterError> {
        self.skip_ws();
        self.expect('(')?;
        self.skip_ws();
        let node = match self.peek() {
            Some('&') => {
                self.bump();
                Node::And(self.parse_filter_list()?)
            }
            Some('|') => {
                self.bump();
                Node::Or(self.parse_filter_list()?)
            }
            Some('!') => {
                self.bump();
                let inner = self.parse_filter()?;
                self.skip_ws();
                Node::Not(Box::new(inner))
            }
            Some(')') => return Err(self.error("empty filter expression")),
            Some(_) => self.parse_comparison()?,
            None => return Err(self.error("unbalanced parentheses")),
        };
        self.expect(')')
            .map_err(|_| self.error("unbalanced parentheses"))?;
        Ok(node)
    }

    /// One or more sub-filters, as the body of `&` or `|`.
    fn parse_filter_list(&mut self) -> Result<Vec<Node>, FilterError> {
        let mut children = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('(') => children.push(self.parse_filter()?),
                Some(')') if !children.is_empty() => return Ok(children),
                Some(')') | None => {
                    return Err(self.error("boolean operator requires at least one sub-filter"));
                }
                Some(_) => return Err(self.error("expected `(` to open a sub-filter")),
            }
        }
    }

    fn parse_comparison(&mut self) -> Result<Node, FilterError> {
        let attr = self.parse_attribute()?;
        let op = self.parse_operator()?;
        let (value, wildcards) = self.parse_value()?;

        if op == CompareOp::Equal {
            match classify_equal(value, wildcards) {
                Classified::Present => return Ok(Node::Present { attr }),
                Classified::Literal(operand) => {
                    return Ok(Node::Compare {
                        attr,
                        op,
                        operand,
                    });
                }
                Classified::Pattern(parts) => return Ok(Node::Substring { attr, parts }),
            }
        }

        // Ordering comparisons treat `*` literally.
        let operand = value.join("*");
        Ok(Node::Compare { attr, op, operand })
    }

    fn parse_attribute(&mut self) -> Result<String, FilterError> {
        let mut attr = String::new();
        while let Some(ch) = self.peek() {
            if matches!(ch, '=' | '<' | '>' | '~' | '(' | ')') {
                break;
            }
            attr.push(ch);
            self.bump();
        }
        let attr = attr.trim().to_string();
        if attr.is_empty() {
            return Err(self.error("missing attribute name"));
        }
        Ok(attr)
    }

    fn parse_operator(&mut self) -> Result<CompareOp, FilterError> {
        match self.peek() {
            Some('=') => {
                self.bump();
                Ok(CompareOp::Equal)
            }
            Some('>') => {
                self.bump();
                self.expect('=')
                    .map_err(|_| self.error("unknown operator `>` (did you mean `>=`?)"))?;
                Ok(CompareOp::GreaterEq)
            }
            Some('<') => {
                self.bump();
                self.expect('=')
                    .map_err(|_| self.error("unknown operator `<` (did you mean `<=`?)"))?;
                Ok(CompareOp::LessEq)
            }
            Some('~') => Err(self.error("unknown operator `~`")),
            _ => Err(self.error("expected comparison operator")),
        }
    }

    /// Parse a value up to the closing `)`.
    ///
    /// Returns the literal segments split on unescaped `*`, plus whether
    /// any unescaped `*` occurred. `\` escapes the next character.
    fn parse_value(&mut self) -> Result<(Vec<String>, bool), FilterError> {
        let mut segments = vec![String::new()];
        let mut wildcards = false;
        loop {
            match self.peek() {
                Some(')') | None => break,
                Some('(') => return Err(self.error("unescaped `(` in filter value")),
                Some('*') => {
                    self.bump();
                    wildcards = true;
                    segments.push(String::new());
                }
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some(escaped) => {
                            if let Some(last) = segments.last_mut() {
                                last.push(escaped);
                            }
                        }
                        None => return Err(self.error("dangling escape at end of filter")),
                    }
                }
                Some(ch) => {
                    self.bump();
                    if let Some(last) = segments.last_mut() {
                        last.push(ch);
                    }
                }
            }
        }
        Ok((segments, wildcards))
    }
}

enum Classified {
    Present,
    Literal(String),
    Pattern(Vec<String>),
}

fn classify_equal(segments: Vec<String>, wildcards: bool) -> Classified {
    if !wildcards {
        return Classified::Literal(segments.join(""));
    }
    if segments.len() == 2 && segments.iter().all(String::is_empty) {
        return Classified::Present;
    }
    Classified::Pattern(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<Node, FilterError> {
        Parser::new(src).parse()
    }

    #[test]
    fn test_simple_equality() {
        let node = parse("(vendor=acme)").unwrap();
        assert_eq!(
            node,
            Node::Compare {
                attr: "vendor".to_string(),
                op: CompareOp::Equal,
                operand: "acme".to_string(),
            }
        );
    }

    #[test]
    fn test_presence() {
        assert_eq!(
            parse("(vendor=*)").unwrap(),
            Node::Present {
                attr: "vendor".to_string()
            }
        );
    }

    #[test]
    fn test_substring() {
        assert_eq!(
            parse("(name=foo*bar)").unwrap(),
            Node::Substring {
                attr: "name".to_string(),
                parts: vec!["foo".to_string(), "bar".to_string()],
            }
        );
    }

    #[test]
    fn test_escaped_star_is_literal() {
        assert_eq!(
            parse(r"(name=a\*b)").unwrap(),
            Node::Compare {
                attr: "name".to_string(),
                op: CompareOp::Equal,
                operand: "a*b".to_string(),
            }
        );
    }

    #[test]
    fn test_boolean_combinators() {
        let node = parse("(&(a=1)(|(b=2)(c=3))(!(d=4)))").unwrap();
        match node {
            Node::And(children) => {
                assert_eq!(children.len(), 3);
                assert!(matches!(children[1], Node::Or(_)));
                assert!(matches!(children[2], Node::Not(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_ordering_operators() {
        assert!(matches!(
            parse("(service.ranking>=5)").unwrap(),
            Node::Compare {
                op: CompareOp::GreaterEq,
                ..
            }
        ));
        assert!(matches!(
            parse("(size<=10)").unwrap(),
            Node::Compare {
                op: CompareOp::LessEq,
                ..
            }
        ));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
        assert!(parse("(a=1").is_err());
        assert!(parse("(a=1))").is_err());
        assert!(parse("()").is_err());
        assert!(parse("(&)").is_err());
        assert!(parse("(a~=1)").is_err());
        assert!(parse("(a>1)").is_err());
        assert!(parse("(=value)").is_err());
        assert!(parse(r"(a=dangling\").is_err());
    }

    #[test]
    fn test_error_reports_fragment() {
        let err = parse("(a=1)(b=2)").unwrap_err();
        assert_eq!(err.fragment, "(b=2)");
    }
}
