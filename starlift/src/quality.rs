//! Data-quality assertions and the gate that evaluates them.
//!
//! Checks run strictly in list order and the gate stops at the first
//! violation. An empty check list is a configuration error, not a vacuous
//! pass.

use crate::errors::QualityError;
use crate::warehouse::{Scalar, Warehouse};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

/// The six recognized comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Comparator {
    /// `==`
    #[default]
    #[serde(rename = "==")]
    Eq,
    /// `!=`
    #[serde(rename = "!=")]
    Ne,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
}

impl Comparator {
    /// The operator's symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    /// Parses a comparison symbol.
    #[must_use]
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    /// Applies the comparison to (actual, expected) using the natural
    /// ordering of the actual value's type. Incomparable values are never
    /// equal and never ordered.
    #[must_use]
    pub fn holds(self, actual: &Scalar, expected: &Scalar) -> bool {
        let ord = actual.compare(expected);
        match self {
            Self::Eq => ord == Some(Ordering::Equal),
            Self::Ne => ord != Some(Ordering::Equal),
            Self::Gt => ord == Some(Ordering::Greater),
            Self::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            Self::Lt => ord == Some(Ordering::Less),
            Self::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::str::FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid comparison '{s}'"))
    }
}

fn default_comparison() -> String {
    Comparator::Eq.symbol().to_owned()
}

/// A single quality check: a query producing exactly one scalar, compared
/// against an expected value.
///
/// The comparison is kept as the raw symbol supplied in the check's
/// definition and validated when the gate evaluates it, so hand-assembled
/// check lists fail with the indexed error the gate contract promises.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssertion {
    /// The check query. Must produce at least one row with a non-null first
    /// column.
    pub query: String,
    /// The expected value.
    pub expected: Scalar,
    /// Comparison symbol; defaults to `==` when unspecified.
    #[serde(default = "default_comparison")]
    pub comparison: String,
}

impl QualityAssertion {
    /// Creates an equality check.
    #[must_use]
    pub fn new(query: impl Into<String>, expected: impl Into<Scalar>) -> Self {
        Self {
            query: query.into(),
            expected: expected.into(),
            comparison: default_comparison(),
        }
    }

    /// Sets the comparison operator.
    #[must_use]
    pub fn with_comparator(mut self, comparator: Comparator) -> Self {
        self.comparison = comparator.symbol().to_owned();
        self
    }
}

/// Evaluates an ordered list of assertions against the warehouse,
/// failing fast on the first violation.
pub struct QualityGate<'w> {
    warehouse: &'w dyn Warehouse,
}

impl<'w> QualityGate<'w> {
    /// Creates a gate over a warehouse.
    #[must_use]
    pub fn new(warehouse: &'w dyn Warehouse) -> Self {
        Self { warehouse }
    }

    /// Runs every assertion in order, returning the count evaluated.
    ///
    /// # Errors
    ///
    /// Fails with [`QualityError::NoAssertions`] on an empty list before
    /// touching the warehouse, and otherwise with the first assertion's
    /// validation or comparison failure; later assertions are not evaluated.
    pub async fn run_checks(
        &self,
        assertions: &[QualityAssertion],
    ) -> Result<usize, QualityError> {
        if assertions.is_empty() {
            return Err(QualityError::NoAssertions);
        }

        for (index, assertion) in assertions.iter().enumerate() {
            let index = index + 1;

            if assertion.query.trim().is_empty() {
                return Err(QualityError::MissingQuery { index });
            }

            let rows = self
                .warehouse
                .query(&assertion.query)
                .await
                .map_err(|e| QualityError::QueryFailed {
                    index,
                    reason: e.to_string(),
                })?;

            let actual = rows
                .first()
                .and_then(|row| row.first())
                .cloned()
                .unwrap_or(Scalar::Null);
            if actual.is_null() {
                return Err(QualityError::EmptyResult {
                    index,
                    query: assertion.query.clone(),
                });
            }

            let comparator = Comparator::parse(&assertion.comparison).ok_or_else(|| {
                QualityError::InvalidComparator {
                    index,
                    symbol: assertion.comparison.clone(),
                }
            })?;

            if !comparator.holds(&actual, &assertion.expected) {
                return Err(QualityError::AssertionFailed {
                    index,
                    query: assertion.query.clone(),
                    actual,
                    comparator: comparator.symbol().to_owned(),
                    expected: assertion.expected.clone(),
                });
            }

            info!(
                check = index,
                actual = %actual,
                comparison = %comparator,
                expected = %assertion.expected,
                "quality check passed"
            );
        }

        info!(count = assertions.len(), "all quality checks passed");
        Ok(assertions.len())
    }
}
