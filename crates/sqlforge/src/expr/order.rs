//! ORDER BY and GROUP BY clause collections.

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Explicit null placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrdering {
    NullsFirst,
    NullsLast,
}

impl NullOrdering {
    pub fn as_sql(self) -> &'static str {
        match self {
            NullOrdering::NullsFirst => "NULLS FIRST",
            NullOrdering::NullsLast => "NULLS LAST",
        }
    }
}

/// One ORDER BY entry. Insertion order across entries is preserved and
/// semantically significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBySpec {
    /// Qualified column expression (`alias.property`) or raw SQL.
    pub expression: String,
    pub direction: OrderDirection,
    pub nulls: Option<NullOrdering>,
}

impl OrderBySpec {
    pub fn new(expression: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            expression: expression.into(),
            direction,
            nulls: None,
        }
    }

    pub fn with_nulls(mut self, nulls: NullOrdering) -> Self {
        self.nulls = Some(nulls);
        self
    }
}
