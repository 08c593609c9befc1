//! Statement keywords
//!
//! The eight primary keywords double as capability names: a sandbox allow-set
//! or deny-set is a set of `Keyword`s.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A primary statement keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Keyword {
    Intent,
    Fact,
    Query,
    Offer,
    Accept,
    Reject,
    Commit,
    Act,
}

impl Keyword {
    /// Every statement keyword, in grammar order.
    pub const ALL: [Keyword; 8] = [
        Keyword::Intent,
        Keyword::Fact,
        Keyword::Query,
        Keyword::Offer,
        Keyword::Accept,
        Keyword::Reject,
        Keyword::Commit,
        Keyword::Act,
    ];

    /// The keyword as written in source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Intent => "INTENT",
            Keyword::Fact => "FACT",
            Keyword::Query => "QUERY",
            Keyword::Offer => "OFFER",
            Keyword::Accept => "ACCEPT",
            Keyword::Reject => "REJECT",
            Keyword::Commit => "COMMIT",
            Keyword::Act => "ACT",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Keyword {
    type Err = KeywordParseError;

    /// Capability names are matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INTENT" => Ok(Keyword::Intent),
            "FACT" => Ok(Keyword::Fact),
            "QUERY" => Ok(Keyword::Query),
            "OFFER" => Ok(Keyword::Offer),
            "ACCEPT" => Ok(Keyword::Accept),
            "REJECT" => Ok(Keyword::Reject),
            "COMMIT" => Ok(Keyword::Commit),
            "ACT" => Ok(Keyword::Act),
            _ => Err(KeywordParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Keyword {
    type Error = KeywordParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Keyword> for String {
    fn from(k: Keyword) -> Self {
        k.as_str().to_string()
    }
}

/// Error when parsing an unknown keyword name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordParseError(pub String);

impl fmt::Display for KeywordParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown statement keyword: {}", self.0)
    }
}

impl std::error::Error for KeywordParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("fact".parse::<Keyword>(), Ok(Keyword::Fact));
        assert_eq!("Commit".parse::<Keyword>(), Ok(Keyword::Commit));
        assert_eq!("ACT".parse::<Keyword>(), Ok(Keyword::Act));
    }

    #[test]
    fn test_parse_unknown() {
        let err = "DELETE".parse::<Keyword>().unwrap_err();
        assert!(err.to_string().contains("DELETE"));
    }

    #[test]
    fn test_display_round_trips() {
        for kw in Keyword::ALL {
            assert_eq!(kw.to_string().parse::<Keyword>(), Ok(kw));
        }
    }

    #[test]
    fn test_serde_uses_uppercase_names() {
        let json = serde_json::to_string(&vec![Keyword::Fact, Keyword::Query]).unwrap();
        assert_eq!(json, r#"["FACT","QUERY"]"#);
        let back: Vec<Keyword> = serde_json::from_str(r#"["fact","query"]"#).unwrap();
        assert_eq!(back, vec![Keyword::Fact, Keyword::Query]);
    }
}
