//! Time alignment of index series and the gold series.
//!
//! Index series are outer-joined on the union of their dates; a series with no
//! observation on a date gets a missing cell. Gold is then left-joined onto the
//! index dates and forward-filled. Gold is never zero-filled or interpolated:
//! a leading gap that nothing can fill aborts the merge.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{IndexColumn, IndexTable, MergedRow, Series};
use crate::error::PipelineError;
use crate::metrics::per_unit;

/// Outer-join series on the union of their dates, in input column order.
pub fn union_align(series: &[Series]) -> IndexTable {
    let dates: Vec<NaiveDate> = series
        .iter()
        .flat_map(|s| s.points().iter().map(|p| p.date))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let columns = series
        .iter()
        .map(|s| {
            let by_date: HashMap<NaiveDate, Option<f64>> =
                s.points().iter().map(|p| (p.date, p.value)).collect();
            IndexColumn {
                symbol: s.name().to_string(),
                values: dates
                    .iter()
                    .map(|d| by_date.get(d).copied().flatten())
                    .collect(),
            }
        })
        .collect();

    IndexTable { dates, columns }
}

/// Left-join `fill` onto `base_dates` and carry the last seen value forward.
///
/// `base_dates` must be sorted ascending. A base date takes the fill value
/// observed on that exact date when present, otherwise the most recent earlier
/// value. Fill observations dated before the first base date do not seed the
/// carry: only values that land on a base row propagate. Any base row still
/// missing afterwards is an `UnresolvableGap`.
pub fn left_join_ffill(base_dates: &[NaiveDate], fill: &Series) -> Result<Vec<f64>, PipelineError> {
    let mut carried: Option<f64> = None;
    let mut out = Vec::with_capacity(base_dates.len());
    let mut missing_rows = 0;

    for date in base_dates {
        if let Some(v) = fill.get(*date) {
            carried = Some(v);
        }
        match carried {
            Some(v) => out.push(v),
            None => missing_rows += 1,
        }
    }

    if missing_rows > 0 {
        return Err(PipelineError::UnresolvableGap {
            column: fill.name().to_string(),
            missing_rows,
        });
    }
    Ok(out)
}

/// Join gold onto the index table and derive one ratio per index column.
pub fn merge_index_gold(
    table: &IndexTable,
    gold: &Series,
) -> Result<Vec<MergedRow>, PipelineError> {
    let gold_close = left_join_ffill(&table.dates, gold)?;
    debug!(rows = table.len(), columns = table.columns.len(), "merging");

    let rows = table
        .dates
        .iter()
        .zip(gold_close)
        .enumerate()
        .map(|(i, (date, gold_close))| {
            let index_levels: Vec<Option<f64>> =
                table.columns.iter().map(|c| c.values[i]).collect();
            let ratios = index_levels
                .iter()
                .map(|level| per_unit(*level, gold_close))
                .collect();
            MergedRow {
                date: *date,
                index_levels,
                gold_close,
                ratios,
            }
        })
        .collect();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimePoint;
    use proptest::prelude::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn series(name: &str, pts: &[(&str, f64)]) -> Series {
        Series::new(
            name,
            pts.iter().map(|(day, v)| TimePoint::new(d(day), *v)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn union_align_fills_missing_with_none() {
        let dji = series(
            "^DJI",
            &[("2024-01-05", 37_000.0), ("2024-01-08", 37_300.0), ("2024-01-12", 37_500.0)],
        );
        let ixic = series("^IXIC", &[("2024-01-05", 14_500.0), ("2024-01-12", 14_900.0)]);

        let table = union_align(&[dji, ixic]);

        assert_eq!(table.dates.len(), 3);
        assert_eq!(table.symbols(), vec!["^DJI", "^IXIC"]);
        assert_eq!(table.columns[0].values[1], Some(37_300.0));
        assert_eq!(table.columns[1].values[1], None);
    }

    #[test]
    fn union_align_of_nothing_is_empty() {
        let table = union_align(&[]);
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }

    #[test]
    fn monday_value_carries_to_friday() {
        let base = [d("2024-01-08"), d("2024-01-12")];
        let gold = series("Gold_Close", &[("2024-01-08", 2030.0), ("2024-01-10", 2040.0)]);
        let filled = left_join_ffill(&base, &gold).unwrap();
        assert_eq!(filled, vec![2030.0, 2030.0]);
    }

    #[test]
    fn exact_match_wins_over_carry() {
        let base = [d("2024-01-08"), d("2024-01-12")];
        let gold = series("Gold_Close", &[("2024-01-08", 2030.0), ("2024-01-12", 2055.0)]);
        assert_eq!(left_join_ffill(&base, &gold).unwrap(), vec![2030.0, 2055.0]);
    }

    #[test]
    fn missing_gold_cell_is_carried_over() {
        let base = [d("2024-01-08"), d("2024-01-12")];
        let gold = Series::new(
            "Gold_Close",
            vec![
                TimePoint::new(d("2024-01-08"), 2030.0),
                TimePoint::missing(d("2024-01-12")),
            ],
        )
        .unwrap();
        assert_eq!(left_join_ffill(&base, &gold).unwrap(), vec![2030.0, 2030.0]);
    }

    #[test]
    fn leading_gap_is_unresolvable() {
        let base = [d("2024-01-05"), d("2024-01-08")];
        let gold = series("Gold_Close", &[("2024-01-08", 2030.0)]);
        match left_join_ffill(&base, &gold).unwrap_err() {
            PipelineError::UnresolvableGap {
                column,
                missing_rows,
            } => {
                assert_eq!(column, "Gold_Close");
                assert_eq!(missing_rows, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn gold_before_first_base_date_does_not_seed() {
        let base = [d("2024-01-05")];
        let gold = series("Gold_Close", &[("2024-01-04", 2030.0)]);
        assert!(matches!(
            left_join_ffill(&base, &gold),
            Err(PipelineError::UnresolvableGap { missing_rows: 1, .. })
        ));
    }

    #[test]
    fn merge_derives_ratios() {
        let table = union_align(&[
            series("^DJI", &[("2024-01-08", 40_000.0), ("2024-01-12", 41_000.0)]),
            series("^IXIC", &[("2024-01-12", 15_000.0)]),
        ]);
        let gold = series("Gold_Close", &[("2024-01-08", 2000.0)]);
        let rows = merge_index_gold(&table, &gold).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].gold_close, 2000.0);
        assert_eq!(rows[0].ratios, vec![Some(20.0), None]);
        assert_eq!(rows[1].gold_close, 2000.0);
        assert_eq!(rows[1].ratios, vec![Some(20.5), Some(7.5)]);
    }

    #[test]
    fn zero_gold_gives_non_finite_ratio() {
        let table = union_align(&[series("^DJI", &[("2024-01-08", 40_000.0)])]);
        let gold = series("Gold_Close", &[("2024-01-08", 0.0)]);
        let rows = merge_index_gold(&table, &gold).unwrap();
        let r = rows[0].ratios[0].unwrap();
        assert!(!r.is_finite());
    }

    proptest! {
        #[test]
        fn ffill_leaves_no_gap_once_seeded(
            offsets in proptest::collection::btree_set(1u64..400, 1..80),
            keep in proptest::collection::vec(any::<bool>(), 400),
        ) {
            let start = d("2024-01-01");
            let base: Vec<NaiveDate> = std::iter::once(start)
                .chain(offsets.iter().map(|&o| start + chrono::Days::new(o)))
                .collect();
            // Seed the first row, then keep an arbitrary subset.
            let points = base
                .iter()
                .enumerate()
                .filter(|(i, _)| *i == 0 || keep[*i])
                .map(|(i, day)| TimePoint::new(*day, i as f64 + 1.0))
                .collect();
            let gold = Series::new("Gold_Close", points).unwrap();

            let filled = left_join_ffill(&base, &gold).unwrap();
            prop_assert_eq!(filled.len(), base.len());
            prop_assert!(filled.iter().all(|v| v.is_finite() && *v > 0.0));
            prop_assert!(filled.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
