//! AST types for SUTRA programs

use std::fmt;
use sutra_core::{Args, Keyword, Value};

// ============================================================================
// VALUES
// ============================================================================

/// A literal value as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    /// Entries in source order; a repeated key resolves to its last value
    Map(Vec<(String, ValueNode)>),
    List(Vec<ValueNode>),
}

impl ValueNode {
    /// Resolve into a runtime value.
    pub fn resolve(&self) -> Value {
        match self {
            ValueNode::String(s) => Value::String(s.clone()),
            ValueNode::Number(n) => Value::Number(*n),
            ValueNode::Bool(b) => Value::Bool(*b),
            ValueNode::Null => Value::Null,
            ValueNode::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.resolve()))
                    .collect(),
            ),
            ValueNode::List(items) => Value::List(items.iter().map(ValueNode::resolve).collect()),
        }
    }
}

// ============================================================================
// PREDICATES AND STATEMENTS
// ============================================================================

/// A named argument `name=value`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArg {
    pub name: String,
    pub value: ValueNode,
}

/// `name(arg=value, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub name: String,
    pub args: Vec<NamedArg>,
}

impl Predicate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: ValueNode) -> Self {
        self.args.push(NamedArg {
            name: name.into(),
            value,
        });
        self
    }

    /// Arguments as a runtime mapping (last occurrence of a name wins).
    pub fn resolve_args(&self) -> Args {
        self.args
            .iter()
            .map(|a| (a.name.clone(), a.value.resolve()))
            .collect()
    }
}

/// A `key: value` entry in an OFFER body.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferField {
    pub key: String,
    pub value: ValueNode,
}

/// One statement. The set is closed; every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Intent(Predicate),
    Fact(Predicate),
    Query {
        predicate: Predicate,
        from_agent: String,
    },
    Offer {
        offer_id: String,
        to_agent: String,
        fields: Vec<OfferField>,
    },
    Accept {
        offer_id: String,
    },
    Reject {
        offer_id: String,
        reason: Option<String>,
    },
    Commit {
        predicate: Predicate,
        deadline: Option<String>,
    },
    Act(Predicate),
}

impl Statement {
    /// The keyword that introduces this statement.
    pub fn keyword(&self) -> Keyword {
        match self {
            Statement::Intent(_) => Keyword::Intent,
            Statement::Fact(_) => Keyword::Fact,
            Statement::Query { .. } => Keyword::Query,
            Statement::Offer { .. } => Keyword::Offer,
            Statement::Accept { .. } => Keyword::Accept,
            Statement::Reject { .. } => Keyword::Reject,
            Statement::Commit { .. } => Keyword::Commit,
            Statement::Act(_) => Keyword::Act,
        }
    }
}

/// `# key "value"`
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub key: String,
    pub value: String,
}

/// A parsed program.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub headers: Vec<Header>,
    pub statements: Vec<Statement>,
}

impl Program {
    /// Value of header `key`; the last occurrence wins.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.key == key)
            .map(|h| h.value.as_str())
    }
}

// ============================================================================
// PARSE ERROR
// ============================================================================

/// Grammar violation at a specific token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// Index of the offending token in the newline-filtered stream
    pub position: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_nested_value() {
        let node = ValueNode::Map(vec![
            ("give".to_string(), ValueNode::Map(vec![("money".to_string(), ValueNode::Number(10.0))])),
            (
                "tags".to_string(),
                ValueNode::List(vec![ValueNode::Bool(true), ValueNode::Null]),
            ),
        ]);
        let value = node.resolve();
        let map = value.as_map().unwrap();
        assert_eq!(
            map["give"].as_map().and_then(|m| m["money"].as_f64()),
            Some(10.0)
        );
        assert_eq!(map["tags"], Value::List(vec![Value::Bool(true), Value::Null]));
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let node = ValueNode::Map(vec![
            ("k".to_string(), ValueNode::Number(1.0)),
            ("k".to_string(), ValueNode::Number(2.0)),
        ]);
        assert_eq!(node.resolve().as_map().map(|m| m["k"].clone()), Some(Value::Number(2.0)));

        let pred = Predicate::new("p")
            .with_arg("a", ValueNode::String("x".into()))
            .with_arg("a", ValueNode::String("y".into()));
        assert_eq!(pred.resolve_args()["a"], Value::from("y"));
    }

    #[test]
    fn test_program_header_last_wins() {
        let program = Program {
            headers: vec![
                Header { key: "from".into(), value: "a".into() },
                Header { key: "to".into(), value: "b".into() },
                Header { key: "from".into(), value: "c".into() },
            ],
            statements: vec![],
        };
        assert_eq!(program.header("from"), Some("c"));
        assert_eq!(program.header("missing"), None);
    }

    #[test]
    fn test_statement_keyword() {
        let s = Statement::Reject { offer_id: "o".into(), reason: None };
        assert_eq!(s.keyword(), Keyword::Reject);
        assert_eq!(Statement::Act(Predicate::new("go")).keyword(), Keyword::Act);
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError {
            message: "Expected ';' after FACT".to_string(),
            position: 7,
            line: 2,
            column: 14,
        };
        assert_eq!(
            err.to_string(),
            "Parse error at line 2, column 14: Expected ';' after FACT"
        );
    }
}
