//! Ordered categorical vocabularies.
//!
//! An [`OrderedCategory`] pins a display order onto a categorical column so
//! charts read "Very satisfied" before "Satisfied" instead of alphabetically.
//! The three opinion columns carry fixed vocabularies; `field_of_study` gets
//! one computed from the data at load time.
use std::cmp::Ordering;
use std::collections::BTreeSet;

use polars::prelude::*;

use crate::aggregation::{string_column, value_counts};
use crate::error::EdaError;
use crate::schema::respondent;

pub const SATISFACTION: [&str; 6] = [
    "Very satisfied",
    "Satisfied",
    "Neutral",
    "Not satisfied",
    "Not satisfied at all",
    "Unknown",
];

pub const DATE_DURATION: [&str; 4] = ["Just right", "Too much", "Too little", "Unknown"];

pub const DATE_COUNT: [&str; 4] = ["Just right", "Too few", "Too many", "Unknown"];

/// A categorical column together with the ordered list of labels it may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedCategory {
    column: String,
    labels: Vec<String>,
}

impl OrderedCategory {
    pub fn new<I, S>(column: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            column: column.into(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn satisfaction() -> Self {
        Self::new(respondent::SATISFACTION, SATISFACTION)
    }

    pub fn date_duration() -> Self {
        Self::new(respondent::DATE_DURATION, DATE_DURATION)
    }

    pub fn date_count() -> Self {
        Self::new(respondent::DATE_COUNT, DATE_COUNT)
    }

    /// The fixed vocabulary declared for `column`, if it has one.
    pub fn for_column(column: &str) -> Option<Self> {
        match column {
            respondent::SATISFACTION => Some(Self::satisfaction()),
            respondent::DATE_DURATION => Some(Self::date_duration()),
            respondent::DATE_COUNT => Some(Self::date_count()),
            _ => None,
        }
    }

    /// Distinct values of `column` ordered by descending frequency.
    ///
    /// Values with equal counts keep the order in which they first appear in
    /// the table, so the result is stable for a given file.
    pub fn by_frequency(df: &DataFrame, column: &str) -> Result<Self, EdaError> {
        let mut counts = value_counts(df, column)?;
        // stable: ties stay in first-seen order
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(Self::new(column, counts.into_iter().map(|(label, _)| label)))
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Sort rank of `label`: its position in the vocabulary, or one past the
    /// last position for anything the vocabulary does not declare.
    pub fn rank(&self, label: &str) -> usize {
        self.position(label).unwrap_or(self.labels.len())
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }

    /// Rows of `df` ordered by this vocabulary on its column.
    ///
    /// Undeclared labels sort after every declared one and nulls come last;
    /// rows of equal rank keep their table order.
    pub fn sort(&self, df: &DataFrame) -> Result<DataFrame, EdaError> {
        let column = string_column(df, &self.column)?;
        let labels: Vec<Option<&str>> = column.str()?.into_iter().collect();

        let mut order: Vec<IdxSize> = (0..df.height() as IdxSize).collect();
        order.sort_by(|&a, &b| match (labels[a as usize], labels[b as usize]) {
            (Some(a), Some(b)) => self.compare(a, b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        let order = IdxCa::from_vec("order".into(), order);
        Ok(df.take(&order)?)
    }

    /// Distinct values of the column that fall outside the vocabulary.
    ///
    /// Each one is logged as a warning. Rows holding them are kept and sort
    /// after every declared label.
    pub fn undeclared_values(&self, df: &DataFrame) -> Result<Vec<EdaError>, EdaError> {
        let labels = string_column(df, &self.column)?;
        let unknown: BTreeSet<&str> = labels
            .str()?
            .into_iter()
            .flatten()
            .filter(|value| self.position(value).is_none())
            .collect();

        Ok(unknown
            .into_iter()
            .map(|value| {
                tracing::warn!(column = %self.column, value, "value outside vocabulary");
                EdaError::ValueOutsideVocabulary {
                    column: self.column.clone(),
                    value: value.to_string(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn repeat(label: &str, n: usize) -> Vec<&str> {
        vec![label; n]
    }

    #[test]
    fn frequency_order_breaks_ties_by_first_appearance() {
        let mut fields = repeat("Arts", 5);
        fields.extend(repeat("Law", 5));
        fields.extend(repeat("Business", 10));
        let df = df! { "field_of_study" => fields }.unwrap();

        let order = OrderedCategory::by_frequency(&df, "field_of_study").unwrap();
        assert_eq!(order.labels(), &["Business", "Arts", "Law"]);

        let mut fields = repeat("Law", 5);
        fields.extend(repeat("Business", 10));
        fields.extend(repeat("Arts", 5));
        let df = df! { "field_of_study" => fields }.unwrap();

        let order = OrderedCategory::by_frequency(&df, "field_of_study").unwrap();
        assert_eq!(order.labels(), &["Business", "Law", "Arts"]);
    }

    #[test]
    fn rank_falls_back_past_the_last_label() {
        let satisfaction = OrderedCategory::satisfaction();
        assert_eq!(satisfaction.rank("Very satisfied"), 0);
        assert_eq!(satisfaction.rank("Unknown"), 5);
        assert_eq!(satisfaction.rank("Ecstatic"), 6);

        let duration = OrderedCategory::date_duration();
        assert_eq!(duration.rank("Too much"), 1);
        assert_eq!(duration.rank("too much"), 4);
        assert_eq!(
            duration.compare("Too little", "Just right"),
            Ordering::Greater
        );
    }

    #[test]
    fn sort_follows_vocabulary_not_alphabet() {
        let df = df! {
            "id" => [1i64, 2, 3, 4, 5, 6],
            "length" => [
                Some("Unknown"),
                Some("Too little"),
                None,
                Some("Sometimes"),
                Some("Just right"),
                Some("Too much"),
            ],
        }
        .unwrap();

        let sorted = OrderedCategory::date_duration().sort(&df).unwrap();
        let labels: Vec<Option<&str>> = sorted
            .column("length")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            labels,
            vec![
                Some("Just right"),
                Some("Too much"),
                Some("Too little"),
                Some("Unknown"),
                Some("Sometimes"),
                None,
            ]
        );
        assert_eq!(sorted.width(), 2);
    }

    #[test]
    fn fixed_vocabularies_are_looked_up_by_column() {
        assert_eq!(
            OrderedCategory::for_column("speed_date_nb"),
            Some(OrderedCategory::date_count())
        );
        assert_eq!(OrderedCategory::for_column("gender"), None);
    }

    #[test]
    fn undeclared_values_are_reported_once_each() {
        let df = df! {
            "satis_2" => ["Satisfied", "Ecstatic", "Ecstatic", "Unknown", "Meh"],
        }
        .unwrap();

        let found = OrderedCategory::satisfaction()
            .undeclared_values(&df)
            .unwrap();
        let values: Vec<String> = found
            .into_iter()
            .map(|err| match err {
                EdaError::ValueOutsideVocabulary { value, .. } => value,
                other => panic!("unexpected error: {other}"),
            })
            .collect();
        assert_eq!(values, vec!["Ecstatic".to_string(), "Meh".to_string()]);
    }

    #[test]
    fn missing_column_is_reported() {
        let df = df! { "gender" => ["male"] }.unwrap();
        let err = OrderedCategory::by_frequency(&df, "field_of_study").unwrap_err();
        assert!(matches!(err, EdaError::MissingColumn(ref c) if c == "field_of_study"));
    }
}
