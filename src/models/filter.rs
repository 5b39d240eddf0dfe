use regex::Regex;
use std::fmt;

/// Packet fields a filter can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SrcIp,
    DstIp,
    Protocol,
}

impl Field {
    /// Resolve a field name as written in filter text, including the
    /// `src`, `dst` and `proto` abbreviations.
    pub fn resolve(name: &str) -> Option<Field> {
        match name {
            "src_ip" | "src" => Some(Field::SrcIp),
            "dst_ip" | "dst" => Some(Field::DstIp),
            "protocol" | "proto" => Some(Field::Protocol),
            _ => None,
        }
    }

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            Field::SrcIp => "src_ip",
            Field::DstIp => "dst_ip",
            Field::Protocol => "protocol",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Regular expression that must match at the start of a value.
///
/// Equality is by source text; two patterns built from the same text behave identically.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    /// True if the pattern matches a prefix of `value`.
    ///
    /// The leftmost match starts at 0 exactly when some match starts at 0.
    pub fn matches_prefix(&self, value: &str) -> bool {
        self.regex.find(value).map_or(false, |m| m.start() == 0)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

/// Filter abstract syntax tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    /// `field = literal`
    Comparison { field: Field, literal: String },

    /// `field =~ pattern`
    Match { field: Field, pattern: Pattern },

    And {
        left: Box<FilterExpr>,
        right: Box<FilterExpr>,
    },

    Or {
        left: Box<FilterExpr>,
        right: Box<FilterExpr>,
    },

    Not { inner: Box<FilterExpr> },
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Comparison { field, literal } => write!(f, "{} = {:?}", field, literal),
            FilterExpr::Match { field, pattern } => {
                write!(f, "{} =~ {:?}", field, pattern.as_str())
            }
            FilterExpr::And { left, right } => write!(f, "({} and {})", left, right),
            FilterExpr::Or { left, right } => write!(f, "({} or {})", left, right),
            FilterExpr::Not { inner } => write!(f, "not {}", inner),
        }
    }
}

/// A successfully compiled filter. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    /// Text the filter was compiled from
    source: String,

    /// None means accept all
    expr: Option<FilterExpr>,
}

impl CompiledFilter {
    pub fn new(source: &str, expr: FilterExpr) -> Self {
        Self {
            source: source.to_string(),
            expr: Some(expr),
        }
    }

    /// The trivial filter that accepts every packet
    pub fn accept_all() -> Self {
        Self {
            source: String::new(),
            expr: None,
        }
    }

    pub fn expr(&self) -> Option<&FilterExpr> {
        self.expr.as_ref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_accept_all(&self) -> bool {
        self.expr.is_none()
    }
}

impl Default for CompiledFilter {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl fmt::Display for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr {
            Some(expr) => write!(f, "{}", expr),
            None => f.write_str("<accept all>"),
        }
    }
}
