//! Core PRM types: classes, attributes, dependencies and slot-chains.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Entity / Relationship classes
// =============================================================================

/// Whether a class models entities or a relationship between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    #[default]
    Entity,
    Relationship,
}

/// An entity or relationship class, backed by one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErClass {
    /// Table name.
    pub name: String,
    /// Primary key columns, in key order.
    pub pk: Vec<String>,
    pub kind: ClassKind,
}

impl ErClass {
    pub fn entity(name: impl Into<String>, pk: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            pk: pk.into_iter().map(String::from).collect(),
            kind: ClassKind::Entity,
        }
    }

    pub fn relationship(name: impl Into<String>, pk: Vec<&str>) -> Self {
        Self {
            kind: ClassKind::Relationship,
            ..Self::entity(name, pk)
        }
    }

    /// Primary key columns joined with commas, e.g. `prof_id,student_id`.
    pub fn pk_string(&self) -> String {
        self.pk.join(",")
    }
}

// =============================================================================
// Attributes
// =============================================================================

/// A modelled column with a discrete domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Owning class (table).
    pub class: String,
    /// Column name.
    pub name: String,
    /// Values the attribute can take, in CPD column order.
    pub domain: Vec<i64>,
}

impl Attribute {
    pub fn new(class: impl Into<String>, name: impl Into<String>, domain: Vec<i64>) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            domain,
        }
    }

    /// `Class.column`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.class, self.name)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

// =============================================================================
// Slot-chains
// =============================================================================

/// A reference to a column of a specific table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// One equality step of a slot-chain: `left.table.left.column = right...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPredicate {
    pub left: ColumnRef,
    pub right: ColumnRef,
}

impl JoinPredicate {
    pub fn new(left: ColumnRef, right: ColumnRef) -> Self {
        Self { left, right }
    }

    /// Whether this predicate links tables `a` and `b` (in either order).
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.left.table == a && self.right.table == b)
            || (self.left.table == b && self.right.table == a)
    }
}

impl fmt::Display for JoinPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.left, self.right)
    }
}

// =============================================================================
// Aggregators
// =============================================================================

/// Collapses the many parent values a one-to-many slot-chain reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregator {
    Avg,
    Sum,
    Count,
    Min,
    Max,
}

/// Error for an aggregator name we cannot translate to SQL.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown aggregator: {0}")]
pub struct UnknownAggregator(pub String);

impl FromStr for Aggregator {
    type Err = UnknownAggregator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AVG" | "AVERAGE" => Ok(Aggregator::Avg),
            "SUM" => Ok(Aggregator::Sum),
            "COUNT" => Ok(Aggregator::Count),
            "MIN" => Ok(Aggregator::Min),
            "MAX" => Ok(Aggregator::Max),
            _ => Err(UnknownAggregator(s.to_string())),
        }
    }
}

// =============================================================================
// Dependencies
// =============================================================================

/// A directed edge `parent -> child` between attributes.
///
/// The slot-chain lists the classes walked from the child's table to the
/// parent's table; `joins` are the equality predicates linking them. A
/// dependency within one class has a single-element slot-chain and no
/// joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Qualified name of the dependent attribute.
    pub child: String,
    /// Qualified name of the parent attribute.
    pub parent: String,
    pub slotchain: Vec<String>,
    pub joins: Vec<JoinPredicate>,
    /// Aggregator name as declared; resolved when queries are planned.
    pub aggregator: Option<String>,
    /// Domain of the (aggregated) parent value seen by the child's CPD.
    /// Defaults to the parent attribute's domain.
    pub parent_domain: Option<Vec<i64>>,
}

impl Dependency {
    pub fn new(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
            slotchain: Vec::new(),
            joins: Vec::new(),
            aggregator: None,
            parent_domain: None,
        }
    }

    pub fn slotchain(mut self, classes: Vec<&str>) -> Self {
        self.slotchain = classes.into_iter().map(String::from).collect();
        self
    }

    pub fn join(mut self, left: ColumnRef, right: ColumnRef) -> Self {
        self.joins.push(JoinPredicate::new(left, right));
        self
    }

    pub fn aggregator(mut self, name: impl Into<String>) -> Self {
        self.aggregator = Some(name.into());
        self
    }

    pub fn parent_domain(mut self, domain: Vec<i64>) -> Self {
        self.parent_domain = Some(domain);
        self
    }

    /// `parent -> child`, for messages.
    pub fn name(&self) -> String {
        format!("{} -> {}", self.parent, self.child)
    }
}
