use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;

use crate::aggregation::{self, pair_frame, proportion_frame};
use crate::filter::{AgeRange, Filters};
use crate::model::{DatasetConfig, SpeedDating};
use crate::schema::*;
use crate::vocabulary::OrderedCategory;

/// Read-only speed-dating dataset for a Dash app.
///
/// Every method recomputes from the loaded tables and the control values it
/// is given; nothing is cached between calls.
#[pyclass(name = "SpeedDating", frozen)]
pub struct PySpeedDating {
    inner: SpeedDating,
}

fn filters(study: &str, ethnic: &str, age: Option<[i64; 2]>) -> Filters {
    let filters = Filters::new()
        .with_field_of_study(study)
        .with_ethnic_group(ethnic);
    match age {
        Some([min, max]) => filters.with_age(AgeRange::new(min, max)),
        None => filters,
    }
}

#[pymethods]
impl PySpeedDating {
    #[new]
    #[pyo3(signature = (
        base_path,
        survey_file = None,
        respondents_file = None,
        min_group_count = 5,
        age_cap = 39,
    ))]
    fn new(
        base_path: String,
        survey_file: Option<String>,
        respondents_file: Option<String>,
        min_group_count: u64,
        age_cap: i64,
    ) -> PyResult<Self> {
        let defaults = DatasetConfig::new(base_path);
        let config = DatasetConfig {
            survey_file: survey_file.unwrap_or(defaults.survey_file.clone()),
            respondents_file: respondents_file.unwrap_or(defaults.respondents_file.clone()),
            min_group_count,
            age_cap,
            ..defaults
        };
        Ok(Self {
            inner: SpeedDating::load(config)?,
        })
    }

    // ── Tables ──────────────────────────────────────────────────────────────

    #[getter]
    fn survey_df(&self) -> PyDataFrame {
        PyDataFrame(self.inner.survey().clone())
    }

    #[getter]
    fn respondents_df(&self) -> PyDataFrame {
        PyDataFrame(self.inner.respondents().clone())
    }

    /// Filtered respondents, optionally sorted by the declared order of
    /// `order_by` (satis_2, length, speed_date_nb or field_of_study).
    #[pyo3(signature = (study="All", ethnic="All", age=None, order_by=None))]
    fn filtered(
        &self,
        study: &str,
        ethnic: &str,
        age: Option<[i64; 2]>,
        order_by: Option<&str>,
    ) -> PyResult<PyDataFrame> {
        let df = self.inner.filtered(&filters(study, ethnic, age))?;
        let df = match order_by {
            Some(column) => self.inner.sort_by_vocabulary(&df, column)?,
            None => df,
        };
        Ok(PyDataFrame(df))
    }

    /// Sort any frame holding an ordered column by that column's vocabulary.
    fn sort_by_vocabulary(&self, df: PyDataFrame, column: &str) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.sort_by_vocabulary(&df.0, column)?))
    }

    // ── Controls ────────────────────────────────────────────────────────────

    fn field_of_study_order(&self) -> Vec<String> {
        self.inner.field_of_study_order().labels().to_vec()
    }

    fn filter_options(&self, column: &str) -> PyResult<Vec<String>> {
        Ok(self.inner.filter_options(column)?)
    }

    /// Returns `(min, max, disabled_ages)` for the age sliders.
    fn age_bounds(&self) -> PyResult<(i64, i64, Vec<i64>)> {
        let bounds = self.inner.age_bounds()?;
        Ok((bounds.min, bounds.max, bounds.disabled))
    }

    #[staticmethod]
    #[pyo3(signature = (subject, study="All", ethnic="All"))]
    fn caption(subject: &str, study: &str, ethnic: &str) -> String {
        filters(study, ethnic, None).caption(subject)
    }

    // ── Charts ──────────────────────────────────────────────────────────────

    #[pyo3(signature = (study="All", ethnic="All"))]
    fn age_distribution(&self, study: &str, ethnic: &str) -> PyResult<PyDataFrame> {
        let rows = self.inner.age_distribution(&filters(study, ethnic, None))?;
        Ok(PyDataFrame(pair_frame(
            respondent::AGE,
            respondent::GENDER,
            &rows,
            false,
        )?))
    }

    #[pyo3(signature = (study="All", ethnic="All"))]
    fn gender_split(&self, study: &str, ethnic: &str) -> PyResult<PyDataFrame> {
        let rows = self.inner.gender_split(&filters(study, ethnic, None))?;
        Ok(PyDataFrame(proportion_frame(respondent::GENDER, &rows)?))
    }

    fn field_of_study_by_gender(&self, age: [i64; 2]) -> PyResult<PyDataFrame> {
        let rows = self
            .inner
            .field_of_study_by_gender(AgeRange::new(age[0], age[1]))?;
        Ok(PyDataFrame(pair_frame(
            respondent::FIELD_OF_STUDY,
            respondent::GENDER,
            &rows,
            false,
        )?))
    }

    fn ethnic_group_by_gender(&self, age: [i64; 2]) -> PyResult<PyDataFrame> {
        let rows = self
            .inner
            .ethnic_group_by_gender(AgeRange::new(age[0], age[1]))?;
        Ok(PyDataFrame(pair_frame(
            respondent::ETHNIC_GROUP,
            respondent::GENDER,
            &rows,
            false,
        )?))
    }

    #[pyo3(signature = (age, ethnic="All", study="All"))]
    fn satisfaction_by_gender(
        &self,
        age: [i64; 2],
        ethnic: &str,
        study: &str,
    ) -> PyResult<PyDataFrame> {
        let rows = self
            .inner
            .satisfaction_by_gender(&filters(study, ethnic, Some(age)))?;
        Ok(PyDataFrame(pair_frame(
            respondent::GENDER,
            respondent::SATISFACTION,
            &rows,
            true,
        )?))
    }

    #[pyo3(signature = (age, ethnic="All", study="All"))]
    fn date_duration_by_gender(
        &self,
        age: [i64; 2],
        ethnic: &str,
        study: &str,
    ) -> PyResult<PyDataFrame> {
        let rows = self
            .inner
            .date_duration_by_gender(&filters(study, ethnic, Some(age)))?;
        Ok(PyDataFrame(pair_frame(
            respondent::GENDER,
            respondent::DATE_DURATION,
            &rows,
            true,
        )?))
    }

    #[pyo3(signature = (age, ethnic="All", study="All"))]
    fn date_count_by_gender(
        &self,
        age: [i64; 2],
        ethnic: &str,
        study: &str,
    ) -> PyResult<PyDataFrame> {
        let rows = self
            .inner
            .date_count_by_gender(&filters(study, ethnic, Some(age)))?;
        Ok(PyDataFrame(pair_frame(
            respondent::GENDER,
            respondent::DATE_COUNT,
            &rows,
            true,
        )?))
    }

    /// Ordinal breakdown per `group_key` value, hiding small groups.
    ///
    /// `breakdown_key` must be one of the opinion columns.
    fn breakdown_by(&self, group_key: &str, breakdown_key: &str) -> PyResult<PyDataFrame> {
        let ordinal = OrderedCategory::for_column(breakdown_key).ok_or_else(|| {
            PyValueError::new_err(format!(
                "'{breakdown_key}' has no ordinal vocabulary; expected one of {}, {}, {}",
                respondent::SATISFACTION,
                respondent::DATE_DURATION,
                respondent::DATE_COUNT
            ))
        })?;
        let rows = self.inner.breakdown_by(group_key, &ordinal)?;
        Ok(PyDataFrame(pair_frame(group_key, breakdown_key, &rows, true)?))
    }

    // ── Generic aggregations ────────────────────────────────────────────────

    #[staticmethod]
    fn proportion(df: PyDataFrame, column: &str) -> PyResult<PyDataFrame> {
        let rows = aggregation::proportion(&df.0, column)?;
        Ok(PyDataFrame(proportion_frame(column, &rows)?))
    }

    #[staticmethod]
    fn group_pair(df: PyDataFrame, group_key: &str, breakdown_key: &str) -> PyResult<PyDataFrame> {
        let rows = aggregation::group_pair(&df.0, group_key, breakdown_key)?;
        Ok(PyDataFrame(pair_frame(group_key, breakdown_key, &rows, false)?))
    }

    /// Ranked pair grouping. `vocabulary` defaults to the fixed one declared
    /// for `breakdown_key`.
    #[staticmethod]
    #[pyo3(signature = (df, group_key, breakdown_key, vocabulary=None))]
    fn group_pair_ranked(
        df: PyDataFrame,
        group_key: &str,
        breakdown_key: &str,
        vocabulary: Option<Vec<String>>,
    ) -> PyResult<PyDataFrame> {
        let ordinal = match vocabulary {
            Some(labels) => OrderedCategory::new(breakdown_key, labels),
            None => OrderedCategory::for_column(breakdown_key).ok_or_else(|| {
                PyValueError::new_err(format!(
                    "No vocabulary given and '{breakdown_key}' has no fixed one"
                ))
            })?,
        };
        let rows = aggregation::group_pair_ranked(&df.0, group_key, breakdown_key, &ordinal)?;
        Ok(PyDataFrame(pair_frame(group_key, breakdown_key, &rows, true)?))
    }
}

/// Export schema constants and vocabularies as Python submodules
pub(crate) fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Respondent
    let columns = PyModule::new(m.py(), "respondent")?;
    columns.add("AGE", respondent::AGE)?;
    columns.add("GENDER", respondent::GENDER)?;
    columns.add("FIELD_OF_STUDY", respondent::FIELD_OF_STUDY)?;
    columns.add("ETHNIC_GROUP", respondent::ETHNIC_GROUP)?;
    columns.add("SATISFACTION", respondent::SATISFACTION)?;
    columns.add("DATE_DURATION", respondent::DATE_DURATION)?;
    columns.add("DATE_COUNT", respondent::DATE_COUNT)?;
    m.add_submodule(&columns)?;

    // Aggregate
    let agg = PyModule::new(m.py(), "aggregate")?;
    agg.add("COUNT", aggregate::COUNT)?;
    agg.add("PERCENTAGE", aggregate::PERCENTAGE)?;
    agg.add("RANK", aggregate::RANK)?;
    m.add_submodule(&agg)?;

    // Vocabularies
    let vocab = PyModule::new(m.py(), "vocabulary")?;
    vocab.add("SATISFACTION", crate::vocabulary::SATISFACTION.to_vec())?;
    vocab.add("DATE_DURATION", crate::vocabulary::DATE_DURATION.to_vec())?;
    vocab.add("DATE_COUNT", crate::vocabulary::DATE_COUNT.to_vec())?;
    m.add_submodule(&vocab)?;

    m.add("ALL", filter::ALL)?;
    Ok(())
}
