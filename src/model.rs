use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::aggregation::{
    group_pair, group_pair_ranked, proportion, string_column, value_counts, AggregateRow,
    Proportion,
};
use crate::error::EdaError;
use crate::filter::{AgeRange, Filters};
use crate::schema::*;
use crate::vocabulary::OrderedCategory;

// ── Config ──────────────────────────────────────────────────────────────────

/// Where the tables live and how the dashboard controls are bounded.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub base_path: PathBuf,
    /// Full survey table, exposed read-only.
    pub survey_file: String,
    /// Cleaned per-respondent table every chart is computed from.
    pub respondents_file: String,
    /// Breakdown charts hide groups with this many respondents or fewer.
    pub min_group_count: u64,
    /// Upper end of the age sliders.
    pub age_cap: i64,
    /// Participant years the sliders can range over.
    pub age_domain: RangeInclusive<i64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            survey_file: files::SURVEY.to_string(),
            respondents_file: files::RESPONDENTS.to_string(),
            min_group_count: 5,
            age_cap: 39,
            age_domain: 18..=55,
        }
    }
}

impl DatasetConfig {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Default::default()
        }
    }
}

/// Slider limits plus the ages inside the domain that no respondent has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeBounds {
    pub min: i64,
    pub max: i64,
    pub disabled: Vec<i64>,
}

// ── Dataset ─────────────────────────────────────────────────────────────────

/// The speed-dating tables, loaded once and read-only afterwards.
///
/// Every view is a pure function of the tables plus the control values
/// passed in, so one instance can serve any number of sessions.
#[derive(Debug)]
pub struct SpeedDating {
    config: DatasetConfig,
    survey: DataFrame,
    respondents: DataFrame,
    /// satis_2, length, speed_date_nb, then field_of_study
    vocabularies: [OrderedCategory; 4],
    undeclared: Vec<EdaError>,
}

impl SpeedDating {
    /// Read both tables from `config.base_path`.
    pub fn load(config: DatasetConfig) -> Result<Self, EdaError> {
        let survey = read_table(&config.base_path.join(&config.survey_file))?;
        let respondents = read_table(&config.base_path.join(&config.respondents_file))?;
        tracing::info!(
            survey = %config.survey_file,
            survey_rows = survey.height(),
            respondents = %config.respondents_file,
            respondent_rows = respondents.height(),
            "speed dating tables loaded"
        );
        Self::from_frames(survey, respondents, config)
    }

    /// Build from already-loaded frames.
    ///
    /// The respondents frame must carry every respondent column; `age` is
    /// parsed to Int64 and must hold integers only.
    pub fn from_frames(
        survey: DataFrame,
        respondents: DataFrame,
        config: DatasetConfig,
    ) -> Result<Self, EdaError> {
        require_columns(&respondents, &respondent::ALL)?;
        let respondents = parse_age(respondents)?;

        let vocabularies = [
            OrderedCategory::satisfaction(),
            OrderedCategory::date_duration(),
            OrderedCategory::date_count(),
            OrderedCategory::by_frequency(&respondents, respondent::FIELD_OF_STUDY)?,
        ];

        let mut undeclared = Vec::new();
        for vocabulary in &vocabularies[..3] {
            undeclared.extend(vocabulary.undeclared_values(&respondents)?);
        }

        Ok(Self {
            config,
            survey,
            respondents,
            vocabularies,
            undeclared,
        })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn survey(&self) -> &DataFrame {
        &self.survey
    }

    pub fn respondents(&self) -> &DataFrame {
        &self.respondents
    }

    /// Fields of study, most frequent first.
    pub fn field_of_study_order(&self) -> &OrderedCategory {
        &self.vocabularies[3]
    }

    /// The declared order of `column`, if it is one of the ordered columns.
    pub fn vocabulary(&self, column: &str) -> Option<&OrderedCategory> {
        self.vocabularies.iter().find(|v| v.column() == column)
    }

    /// `ValueOutsideVocabulary` for every undeclared opinion label found at
    /// load time. Those rows are kept and rank last.
    pub fn undeclared_values(&self) -> &[EdaError] {
        &self.undeclared
    }

    pub fn filtered(&self, filters: &Filters) -> Result<DataFrame, EdaError> {
        filters.apply(&self.respondents)
    }

    /// Rows of `df` sorted by the declared order of `column`.
    ///
    /// Columns without a declared order are rejected with `InvalidData`.
    pub fn sort_by_vocabulary(
        &self,
        df: &DataFrame,
        column: &str,
    ) -> Result<DataFrame, EdaError> {
        let vocabulary = self.vocabulary(column).ok_or_else(|| {
            EdaError::InvalidData(format!("column '{column}' has no declared order"))
        })?;
        vocabulary.sort(df)
    }

    // ── Controls ────────────────────────────────────────────────────────────

    /// Dropdown entries for `column`: the "All" sentinel, then every distinct
    /// value sorted.
    pub fn filter_options(&self, column: &str) -> Result<Vec<String>, EdaError> {
        let labels = string_column(&self.respondents, column)?;
        let distinct: BTreeSet<&str> = labels.str()?.into_iter().flatten().collect();

        let mut options = Vec::with_capacity(distinct.len() + 1);
        options.push(filter::ALL.to_string());
        options.extend(distinct.into_iter().map(str::to_string));
        Ok(options)
    }

    pub fn age_bounds(&self) -> Result<AgeBounds, EdaError> {
        let ages: BTreeSet<i64> = self
            .respondents
            .column(respondent::AGE)?
            .i64()?
            .into_iter()
            .flatten()
            .collect();
        let cap = self.config.age_cap;

        let min = ages.first().copied().unwrap_or(*self.config.age_domain.start());
        let disabled = self
            .config
            .age_domain
            .clone()
            .filter(|age| !ages.contains(age) || *age > cap)
            .collect();

        Ok(AgeBounds {
            min,
            max: cap,
            disabled,
        })
    }

    // ── Views ───────────────────────────────────────────────────────────────

    /// Respondents per (age, gender), youngest first.
    pub fn age_distribution(&self, filters: &Filters) -> Result<Vec<AggregateRow>, EdaError> {
        let data = self.filtered(filters)?;
        let mut rows = group_pair(&data, respondent::AGE, respondent::GENDER)?;
        rows.sort_by_key(|row| row.group_key.parse::<i64>().unwrap_or(i64::MAX));
        Ok(rows)
    }

    pub fn gender_split(&self, filters: &Filters) -> Result<Vec<Proportion>, EdaError> {
        proportion(&self.filtered(filters)?, respondent::GENDER)
    }

    /// Gender mix per field of study, most represented field first.
    pub fn field_of_study_by_gender(
        &self,
        age: AgeRange,
    ) -> Result<Vec<AggregateRow>, EdaError> {
        let data = self.filtered(&Filters::new().with_age(age))?;
        let mut rows = group_pair(&data, respondent::FIELD_OF_STUDY, respondent::GENDER)?;
        rows.sort_by_key(|row| self.field_of_study_order().rank(&row.group_key));
        Ok(rows)
    }

    /// Gender mix per ethnic group, largest cells first.
    pub fn ethnic_group_by_gender(&self, age: AgeRange) -> Result<Vec<AggregateRow>, EdaError> {
        let data = self.filtered(&Filters::new().with_age(age))?;
        let mut rows = group_pair(&data, respondent::ETHNIC_GROUP, respondent::GENDER)?;
        rows.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(rows)
    }

    pub fn satisfaction_by_gender(&self, filters: &Filters) -> Result<Vec<AggregateRow>, EdaError> {
        self.ranked_by_gender(filters, &OrderedCategory::satisfaction())
    }

    pub fn date_duration_by_gender(
        &self,
        filters: &Filters,
    ) -> Result<Vec<AggregateRow>, EdaError> {
        self.ranked_by_gender(filters, &OrderedCategory::date_duration())
    }

    pub fn date_count_by_gender(&self, filters: &Filters) -> Result<Vec<AggregateRow>, EdaError> {
        self.ranked_by_gender(filters, &OrderedCategory::date_count())
    }

    /// Distribution of an ordinal column inside each value of `group_key`,
    /// over the whole table.
    ///
    /// Groups with `min_group_count` respondents or fewer are left out.
    pub fn breakdown_by(
        &self,
        group_key: &str,
        ordinal: &OrderedCategory,
    ) -> Result<Vec<AggregateRow>, EdaError> {
        let kept: Vec<String> = value_counts(&self.respondents, group_key)?
            .into_iter()
            .filter(|(_, count)| *count > self.config.min_group_count)
            .map(|(label, _)| label)
            .collect();
        tracing::debug!(group_key, kept = kept.len(), "groups above threshold");

        let kept = Series::new(group_key.into(), kept);
        let data = self
            .respondents
            .clone()
            .lazy()
            .filter(
                col(group_key)
                    .cast(DataType::String)
                    .is_in(lit(kept), false),
            )
            .collect()?;

        group_pair_ranked(&data, group_key, ordinal.column(), ordinal)
    }

    fn ranked_by_gender(
        &self,
        filters: &Filters,
        ordinal: &OrderedCategory,
    ) -> Result<Vec<AggregateRow>, EdaError> {
        let data = self.filtered(filters)?;
        group_pair_ranked(&data, respondent::GENDER, ordinal.column(), ordinal)
    }
}

// ── Private helpers ─────────────────────────────────────────────────────────

/// Read a CSV (all columns as String) or a Parquet file.
/// Trims whitespace from column names.
fn read_table(path: &Path) -> Result<DataFrame, EdaError> {
    let mut df = if path.extension().is_some_and(|ext| ext == "parquet") {
        let file = std::fs::File::open(path)?;
        ParquetReader::new(file).finish()?
    } else {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0)) // all columns as String
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?
    };

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), EdaError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(EdaError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Parse `age` to Int64, rejecting anything that is not a whole number.
fn parse_age(df: DataFrame) -> Result<DataFrame, EdaError> {
    let age = df.column(respondent::AGE)?;
    let parsed = if age.dtype().is_integer() {
        age.cast(&DataType::Int64)?
    } else {
        age.cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|value| value.map(|v| v.trim().parse::<i64>()).transpose())
            .collect::<Result<Int64Chunked, _>>()
            .map_err(|e| EdaError::InvalidData(format!("column '{}': {e}", respondent::AGE)))?
            .with_name(respondent::AGE.into())
            .into_column()
    };

    let mut df = df;
    df.with_column(parsed)?;
    Ok(df)
}
