use std::collections::HashMap;

use polars::prelude::*;

use crate::error::EdaError;
use crate::schema::aggregate;
use crate::vocabulary::OrderedCategory;

/// Share of one distinct value in a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct Proportion {
    pub value: String,
    pub count: u64,
    pub percentage: f64,
}

/// One `(group key, breakdown value)` cell of a two-level aggregation.
///
/// `count` is the raw number of rows holding the pair; `percentage` is the
/// pair's share of its group. `rank` is only meaningful after
/// [`group_pair_ranked`] and is 0 otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub group_key: String,
    pub breakdown_value: String,
    pub count: u64,
    pub percentage: f64,
    pub rank: usize,
}

/// Round to 2 decimals, halves away from zero (1/32 -> 3.13).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `count` as a percentage of `total`, rounded with [`round2`].
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(100.0 * count as f64 / total as f64)
}

/// Count and percentage of each distinct value of `column`, ascending by
/// percentage. Equal percentages keep first-seen order.
pub fn proportion(df: &DataFrame, column: &str) -> Result<Vec<Proportion>, EdaError> {
    let counts = value_counts(df, column)?;
    let total: u64 = counts.iter().map(|(_, n)| n).sum();

    let mut rows: Vec<Proportion> = counts
        .into_iter()
        .map(|(value, count)| Proportion {
            value,
            count,
            percentage: percentage(count, total),
        })
        .collect();
    rows.sort_by(|a, b| a.percentage.total_cmp(&b.percentage));

    tracing::debug!(column, distinct = rows.len(), total, "proportion computed");
    Ok(rows)
}

/// Partition by `group_key`, then measure the distribution of `breakdown_key`
/// inside each partition.
///
/// Groups come out in first-seen order, breakdown values in first-seen order
/// within their group. Only pairs present in the table are emitted.
pub fn group_pair(
    df: &DataFrame,
    group_key: &str,
    breakdown_key: &str,
) -> Result<Vec<AggregateRow>, EdaError> {
    let groups = string_column(df, group_key)?;
    let breakdowns = string_column(df, breakdown_key)?;

    // group -> (total, [(breakdown, count)])
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut partitions: Vec<(&str, u64, Vec<(&str, u64)>)> = Vec::new();

    for (group, breakdown) in groups.str()?.into_iter().zip(breakdowns.str()?) {
        let (Some(group), Some(breakdown)) = (group, breakdown) else {
            continue;
        };
        let slot = *index.entry(group).or_insert_with(|| {
            partitions.push((group, 0, Vec::new()));
            partitions.len() - 1
        });
        let (_, total, cells) = &mut partitions[slot];
        *total += 1;
        match cells.iter_mut().find(|(value, _)| *value == breakdown) {
            Some((_, count)) => *count += 1,
            None => cells.push((breakdown, 1)),
        }
    }

    let rows: Vec<AggregateRow> = partitions
        .into_iter()
        .flat_map(|(group, total, cells)| {
            cells.into_iter().map(move |(value, count)| AggregateRow {
                group_key: group.to_string(),
                breakdown_value: value.to_string(),
                count,
                percentage: percentage(count, total),
                rank: 0,
            })
        })
        .collect();

    tracing::debug!(group_key, breakdown_key, rows = rows.len(), "pair grouped");
    Ok(rows)
}

/// [`group_pair`] with every row ranked by `vocabulary` and sorted by rank.
///
/// Breakdown values the vocabulary does not declare rank last and are
/// logged; rows of equal rank keep their grouping order.
pub fn group_pair_ranked(
    df: &DataFrame,
    group_key: &str,
    breakdown_key: &str,
    vocabulary: &OrderedCategory,
) -> Result<Vec<AggregateRow>, EdaError> {
    let mut rows = group_pair(df, group_key, breakdown_key)?;

    for row in rows.iter_mut() {
        row.rank = vocabulary.rank(&row.breakdown_value);
        if row.rank == vocabulary.len() {
            tracing::warn!(
                column = breakdown_key,
                value = %row.breakdown_value,
                "value outside vocabulary, ranked last"
            );
        }
    }
    rows.sort_by_key(|row| row.rank);

    Ok(rows)
}

// ── DataFrame output ────────────────────────────────────────────────────────

/// Proportion rows as `<column>, count, percentage`.
pub fn proportion_frame(column: &str, rows: &[Proportion]) -> Result<DataFrame, EdaError> {
    let values: Vec<&str> = rows.iter().map(|r| r.value.as_str()).collect();
    let counts: Vec<u64> = rows.iter().map(|r| r.count).collect();
    let percentages: Vec<f64> = rows.iter().map(|r| r.percentage).collect();

    let columns: Vec<Column> = vec![
        Series::new(column.into(), values).into(),
        Series::new(aggregate::COUNT.into(), counts).into(),
        Series::new(aggregate::PERCENTAGE.into(), percentages).into(),
    ];
    Ok(DataFrame::new(columns)?)
}

/// Pair rows as `<group_key>, <breakdown_key>, count, percentage`, plus
/// `rank` when `with_rank` is set.
pub fn pair_frame(
    group_key: &str,
    breakdown_key: &str,
    rows: &[AggregateRow],
    with_rank: bool,
) -> Result<DataFrame, EdaError> {
    let groups: Vec<&str> = rows.iter().map(|r| r.group_key.as_str()).collect();
    let values: Vec<&str> = rows.iter().map(|r| r.breakdown_value.as_str()).collect();
    let counts: Vec<u64> = rows.iter().map(|r| r.count).collect();
    let percentages: Vec<f64> = rows.iter().map(|r| r.percentage).collect();

    let mut columns: Vec<Column> = vec![
        Series::new(group_key.into(), groups).into(),
        Series::new(breakdown_key.into(), values).into(),
        Series::new(aggregate::COUNT.into(), counts).into(),
        Series::new(aggregate::PERCENTAGE.into(), percentages).into(),
    ];
    if with_rank {
        let ranks: Vec<u32> = rows.iter().map(|r| r.rank as u32).collect();
        columns.push(Series::new(aggregate::RANK.into(), ranks).into());
    }
    Ok(DataFrame::new(columns)?)
}

// ── Column helpers ──────────────────────────────────────────────────────────

/// `name` cast to String dtype, or `MissingColumn` if the table lacks it.
pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Column, EdaError> {
    let column = df
        .column(name)
        .map_err(|_| EdaError::MissingColumn(name.to_string()))?;
    Ok(column.cast(&DataType::String)?)
}

/// Occurrences of each non-null value of `column`, in first-seen order.
pub(crate) fn value_counts(df: &DataFrame, column: &str) -> Result<Vec<(String, u64)>, EdaError> {
    let labels = string_column(df, column)?;

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, u64)> = Vec::new();
    for value in labels.str()?.into_iter().flatten() {
        let slot = *index.entry(value).or_insert_with(|| {
            counts.push((value, 0));
            counts.len() - 1
        });
        counts[slot].1 += 1;
    }

    Ok(counts
        .into_iter()
        .map(|(value, n)| (value.to_string(), n))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn row(group: &str, value: &str, count: u64, percentage: f64) -> AggregateRow {
        AggregateRow {
            group_key: group.into(),
            breakdown_value: value.into(),
            count,
            percentage,
            rank: 0,
        }
    }

    #[test]
    fn rounds_halves_away_from_zero() {
        assert_eq!(percentage(1, 32), 3.13);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn proportion_sorts_ascending_and_keeps_tie_order() {
        let df = df! {
            "gender" => ["male", "female", "male", "other", "male", "female"],
        }
        .unwrap();

        let rows = proportion(&df, "gender").unwrap();
        let summary: Vec<(&str, u64, f64)> = rows
            .iter()
            .map(|r| (r.value.as_str(), r.count, r.percentage))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("other", 1, 16.67),
                ("female", 2, 33.33),
                ("male", 3, 50.0),
            ]
        );

        let df = df! { "gender" => ["female", "male"] }.unwrap();
        let order: Vec<String> = proportion(&df, "gender")
            .unwrap()
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(order, vec!["female".to_string(), "male".to_string()]);
    }

    #[test]
    fn proportion_of_empty_table_is_empty() {
        let df = df! { "gender" => Vec::<&str>::new() }.unwrap();
        assert!(proportion(&df, "gender").unwrap().is_empty());
    }

    #[test]
    fn rounding_drift_scales_with_group_cardinality() {
        let df = df! {
            "gender" => ["male"; 7],
            "satis_2" => ["a", "b", "c", "d", "e", "f", "g"],
        }
        .unwrap();

        let rows = group_pair(&df, "gender", "satis_2").unwrap();
        assert!(rows.iter().all(|r| r.percentage == 14.29));
        let sum: f64 = rows.iter().map(|r| r.percentage).sum();
        assert!(sum - 100.0 > 0.02);
        assert!((sum - 100.0).abs() <= 0.01 * rows.len() as f64);
    }

    #[test]
    fn pair_percentages_are_per_group() {
        let df = df! {
            "field_of_study" => ["Business", "Business", "Business", "Business", "Law"],
            "gender" => ["male", "male", "female", "male", "female"],
        }
        .unwrap();

        let rows = group_pair(&df, "field_of_study", "gender").unwrap();
        assert_eq!(
            rows,
            vec![
                row("Business", "male", 3, 75.0),
                row("Business", "female", 1, 25.0),
                row("Law", "female", 1, 100.0),
            ]
        );
    }

    #[test]
    fn pair_skips_null_keys() {
        let df = df! {
            "ethnic_group" => [Some("Asian"), None, Some("Asian")],
            "gender" => [Some("male"), Some("female"), None],
        }
        .unwrap();

        let rows = group_pair(&df, "ethnic_group", "gender").unwrap();
        assert_eq!(rows, vec![row("Asian", "male", 1, 100.0)]);
    }

    #[test]
    fn pair_groups_on_integer_columns() {
        let df = df! {
            "age" => [22i64, 22, 30],
            "gender" => ["male", "female", "female"],
        }
        .unwrap();

        let rows = group_pair(&df, "age", "gender").unwrap();
        assert_eq!(rows[0], row("22", "male", 1, 50.0));
        assert_eq!(rows[2], row("30", "female", 1, 100.0));
    }

    #[test]
    fn ranked_rows_follow_vocabulary_order() {
        let df = df! {
            "gender" => ["male", "male", "male"],
            "satis_2" => ["Neutral", "Very satisfied", "Satisfied"],
        }
        .unwrap();

        let rows =
            group_pair_ranked(&df, "gender", "satis_2", &OrderedCategory::satisfaction()).unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.breakdown_value.as_str()).collect();
        assert_eq!(order, vec!["Very satisfied", "Satisfied", "Neutral"]);
        let ranks: Vec<usize> = rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
    }

    #[test]
    fn ranked_rows_put_undeclared_values_last() {
        let df = df! {
            "gender" => ["female", "female", "female"],
            "length" => ["Whatever", "Unknown", "Just right"],
        }
        .unwrap();

        let rows =
            group_pair_ranked(&df, "gender", "length", &OrderedCategory::date_duration()).unwrap();
        let order: Vec<(&str, usize)> = rows
            .iter()
            .map(|r| (r.breakdown_value.as_str(), r.rank))
            .collect();
        assert_eq!(
            order,
            vec![("Just right", 0), ("Unknown", 3), ("Whatever", 4)]
        );
    }

    #[test]
    fn frames_use_pandas_column_names() {
        let df = df! {
            "gender" => ["male", "female"],
            "speed_date_nb" => ["Too few", "Just right"],
        }
        .unwrap();
        let rows =
            group_pair_ranked(&df, "gender", "speed_date_nb", &OrderedCategory::date_count())
                .unwrap();

        let frame = pair_frame("gender", "speed_date_nb", &rows, true).unwrap();
        let names: Vec<&str> = frame.get_column_names_str();
        assert_eq!(
            names,
            vec!["gender", "speed_date_nb", "count", "percentage", "rank"]
        );
        assert_eq!(frame.height(), 2);

        let frame = proportion_frame("gender", &proportion(&df, "gender").unwrap()).unwrap();
        assert_eq!(
            frame.get_column_names_str(),
            vec!["gender", "count", "percentage"]
        );
    }

    fn table(groups: &[u8], values: &[u8]) -> DataFrame {
        let groups: Vec<String> = groups.iter().map(|g| format!("g{g}")).collect();
        let values: Vec<String> = values.iter().map(|v| format!("v{v}")).collect();
        df! { "group" => groups, "value" => values }.unwrap()
    }

    proptest! {
        #[test]
        fn proportion_percentages_sum_to_100(
            values in prop::collection::vec(0u8..6, 1..200)
        ) {
            let df = table(&vec![0; values.len()], &values);
            let rows = proportion(&df, "value").unwrap();
            let sum: f64 = rows.iter().map(|r| r.percentage).sum();
            prop_assert!((sum - 100.0).abs() <= 0.01 * rows.len() as f64 + 1e-9);
            prop_assert!(rows.windows(2).all(|w| w[0].percentage <= w[1].percentage));
        }

        #[test]
        fn pair_percentages_sum_to_100_per_group(
            cells in prop::collection::vec((0u8..5, 0u8..10), 1..200)
        ) {
            let (groups, values): (Vec<u8>, Vec<u8>) = cells.into_iter().unzip();
            let df = table(&groups, &values);
            let rows = group_pair(&df, "group", "value").unwrap();

            // group -> (percentage sum, distinct breakdown values)
            let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
            for r in &rows {
                let (sum, cardinality) = sums.entry(r.group_key.as_str()).or_default();
                *sum += r.percentage;
                *cardinality += 1;
            }
            for (_, (sum, cardinality)) in sums {
                prop_assert!((sum - 100.0).abs() <= 0.01 * cardinality as f64 + 1e-9);
            }
            let total: u64 = rows.iter().map(|r| r.count).sum();
            prop_assert_eq!(total as usize, groups.len());
        }
    }
}
