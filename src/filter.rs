use polars::prelude::*;

use crate::error::EdaError;
use crate::schema::{filter, respondent};

/// A dropdown value: either the "All" sentinel or one concrete label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Only(label) => Some(label),
        }
    }
}

impl From<&str> for Selection {
    fn from(value: &str) -> Self {
        if value == filter::ALL {
            Self::All
        } else {
            Self::Only(value.to_string())
        }
    }
}

/// Inclusive age bounds. `min > max` selects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: i64,
    pub max: i64,
}

impl AgeRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn contains(&self, age: i64) -> bool {
        self.min <= age && age <= self.max
    }
}

/// The filter controls of one chart.
///
/// Each predicate is independent; an unset one leaves the table untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub field_of_study: Selection,
    pub ethnic_group: Selection,
    pub age: Option<AgeRange>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_of_study(mut self, value: impl Into<Selection>) -> Self {
        self.field_of_study = value.into();
        self
    }

    pub fn with_ethnic_group(mut self, value: impl Into<Selection>) -> Self {
        self.ethnic_group = value.into();
        self
    }

    pub fn with_age(mut self, range: AgeRange) -> Self {
        self.age = Some(range);
        self
    }

    pub fn is_identity(&self) -> bool {
        self.predicate().is_none()
    }

    fn predicate(&self) -> Option<Expr> {
        let mut predicates: Vec<Expr> = Vec::new();

        if let Some(study) = self.field_of_study.label() {
            predicates.push(col(respondent::FIELD_OF_STUDY).eq(lit(study)));
        }
        if let Some(ethnic) = self.ethnic_group.label() {
            predicates.push(col(respondent::ETHNIC_GROUP).eq(lit(ethnic)));
        }
        if let Some(range) = self.age {
            predicates.push(
                col(respondent::AGE)
                    .gt_eq(lit(range.min))
                    .and(col(respondent::AGE).lt_eq(lit(range.max))),
            );
        }

        predicates.into_iter().reduce(|acc, p| acc.and(p))
    }

    /// Rows of `df` matching every active predicate.
    ///
    /// Returns a new frame; `df` itself is never modified.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame, EdaError> {
        let Some(predicate) = self.predicate() else {
            return Ok(df.clone());
        };

        let filtered = df.clone().lazy().filter(predicate).collect()?;
        tracing::debug!(
            filters = ?self,
            rows_in = df.height(),
            rows_out = filtered.height(),
            "filters applied"
        );
        Ok(filtered)
    }

    /// Chart title for these filters, e.g. `Satisfaction (Business, Asian)`
    /// or `Overall satisfaction`.
    pub fn caption(&self, subject: &str) -> String {
        match (self.field_of_study.label(), self.ethnic_group.label()) {
            (Some(study), Some(ethnic)) => format!("{subject} ({study}, {ethnic})"),
            (Some(study), None) => format!("{subject} ({study})"),
            (None, Some(ethnic)) => format!("{subject} ({ethnic})"),
            (None, None) => {
                let mut chars = subject.chars();
                match chars.next() {
                    Some(first) => format!("Overall {}{}", first.to_lowercase(), chars.as_str()),
                    None => "Overall".to_string(),
                }
            }
        }
    }
}
