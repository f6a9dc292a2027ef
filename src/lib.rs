//! Aggregation core of the speed-dating EDA dashboard.
//!
//! Loads the respondent table once, then answers every chart request with a
//! fresh filter -> group -> percentage pass. Build with `--features python`
//! to get the `_core` extension module the Dash app imports.

pub mod aggregation;
pub mod error;
pub mod filter;
pub mod model;
pub mod schema;
pub mod vocabulary;

#[cfg(feature = "python")]
mod python;

pub use aggregation::{AggregateRow, Proportion};
pub use error::EdaError;
pub use filter::{AgeRange, Filters, Selection};
pub use model::{AgeBounds, DatasetConfig, SpeedDating};
pub use vocabulary::OrderedCategory;

#[cfg(feature = "python")]
#[pyo3::pymodule]
fn _core(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    use pyo3::prelude::*;

    // RUST_LOG controls verbosity; a host that already set a subscriber wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    m.add_class::<python::PySpeedDating>()?;
    python::add_schema_exports(m)?;
    Ok(())
}
