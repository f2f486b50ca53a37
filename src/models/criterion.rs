//! Search criterion tree accepted by the GLPI `search` endpoint.
//!
//! A criterion is either a leaf (`field` / `searchtype` / `value`) or a group
//! holding an ordered list of nested criteria. Groups may nest to any depth.

use std::fmt;

/// Logical operator joining a criterion to its predecessor.
///
/// Ignored by GLPI on the first element of a list; defaults to `AND` when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `AND NOT`
    AndNot,
    /// `AND NOT NOT`
    AndNotNot,
    /// `OR NOT`
    OrNot,
    /// Any other operator, forwarded verbatim for GLPI to judge.
    Other(String),
}

impl Link {
    /// Parses an operator, matching known spellings case-insensitively.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "AND" => Link::And,
            "OR" => Link::Or,
            "AND NOT" => Link::AndNot,
            "AND NOT NOT" => Link::AndNotNot,
            "OR NOT" => Link::OrNot,
            _ => Link::Other(raw.to_string()),
        }
    }

    /// Returns the wire spelling.
    pub fn as_str(&self) -> &str {
        match self {
            Link::And => "AND",
            Link::Or => "OR",
            Link::AndNot => "AND NOT",
            Link::AndNotNot => "AND NOT NOT",
            Link::OrNot => "OR NOT",
            Link::Other(raw) => raw,
        }
    }
}

/// Comparison applied by a leaf criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchType {
    /// `contains`
    Contains,
    /// `equals`
    Equals,
    /// `notequals`
    NotEquals,
    /// `lessthan`
    LessThan,
    /// `morethan`
    MoreThan,
    /// `under` (tree-structured dropdowns)
    Under,
    /// `notunder`
    NotUnder,
    /// Any other search type, forwarded verbatim.
    Other(String),
}

impl SearchType {
    /// Parses a search type, matching known spellings case-insensitively.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contains" => SearchType::Contains,
            "equals" => SearchType::Equals,
            "notequals" => SearchType::NotEquals,
            "lessthan" => SearchType::LessThan,
            "morethan" => SearchType::MoreThan,
            "under" => SearchType::Under,
            "notunder" => SearchType::NotUnder,
            _ => SearchType::Other(raw.to_string()),
        }
    }

    /// Returns the wire spelling.
    pub fn as_str(&self) -> &str {
        match self {
            SearchType::Contains => "contains",
            SearchType::Equals => "equals",
            SearchType::NotEquals => "notequals",
            SearchType::LessThan => "lessthan",
            SearchType::MoreThan => "morethan",
            SearchType::Under => "under",
            SearchType::NotUnder => "notunder",
            SearchType::Other(raw) => raw,
        }
    }
}

/// A scalar query value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Integer value (search option ids are integers).
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Boolean value.
    Bool(bool),
}

impl Scalar {
    /// Converts a JSON value, returning `None` for arrays, objects and null.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Scalar::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Scalar::Integer)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// One search criterion: a leaf comparison or a nested group.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// A single `field` / `searchtype` / `value` comparison.
    Leaf {
        /// Operator joining this criterion to the previous one.
        link: Option<Link>,
        /// Search option id (see `listSearchOptions`).
        field: Scalar,
        /// Comparison to apply.
        searchtype: SearchType,
        /// Value to compare against.
        value: Scalar,
        /// Additional scalar keys passed through as-is (e.g. `meta`, `itemtype`).
        extra: Vec<(String, Scalar)>,
    },
    /// An ordered sub-list of criteria evaluated together.
    Group {
        /// Operator joining this group to the previous criterion.
        link: Option<Link>,
        /// The nested criteria.
        criteria: Vec<Criterion>,
    },
}

impl Criterion {
    /// Creates a leaf criterion with no link.
    pub fn leaf(field: impl Into<Scalar>, searchtype: SearchType, value: impl Into<Scalar>) -> Self {
        Criterion::Leaf {
            link: None,
            field: field.into(),
            searchtype,
            value: value.into(),
            extra: Vec::new(),
        }
    }

    /// Creates a group criterion with no link.
    pub fn group(criteria: Vec<Criterion>) -> Self {
        Criterion::Group {
            link: None,
            criteria,
        }
    }

    /// Sets the link operator.
    pub fn with_link(mut self, new_link: Link) -> Self {
        match &mut self {
            Criterion::Leaf { link, .. } | Criterion::Group { link, .. } => {
                *link = Some(new_link);
            }
        }
        self
    }

    /// Returns the link operator, if any.
    pub fn link(&self) -> Option<&Link> {
        match self {
            Criterion::Leaf { link, .. } | Criterion::Group { link, .. } => link.as_ref(),
        }
    }
}
