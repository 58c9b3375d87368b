//! Row ordering for sorted result handles.

use crate::handle::SortColumn;
use core::cmp::Ordering;
use grantview_core::schema::Table;
use grantview_core::{Result, Row};

/// Resolved sort keys: `(column index, ascending)` in priority order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SortOrder {
    keys: Vec<(usize, bool)>,
}

impl SortOrder {
    /// Resolves `columns` against `schema`.
    pub(crate) fn resolve(columns: &[SortColumn], schema: &Table) -> Result<Self> {
        let keys = columns
            .iter()
            .map(|key| {
                schema
                    .require_column(&key.column)
                    .map(|column| (column.index(), key.ascending))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keys })
    }

    /// Returns an order that sorts by `self` first and breaks ties with
    /// `previous`.
    pub(crate) fn then(mut self, previous: &SortOrder) -> Self {
        self.keys.extend(previous.keys.iter().copied());
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Stable sort: rows equal on every key keep their relative order.
    pub(crate) fn sort(&self, rows: &mut [&Row]) {
        if !self.is_empty() {
            rows.sort_by(|a, b| self.compare_rows(a, b));
        }
    }

    fn compare_rows(&self, a: &Row, b: &Row) -> Ordering {
        for (column, ascending) in &self.keys {
            let cmp = match (a.get(*column), b.get(*column)) {
                (Some(av), Some(bv)) => av.cmp(bv),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if cmp != Ordering::Equal {
                return if *ascending { cmp } else { cmp.reverse() };
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantview_core::schema::TableBuilder;
    use grantview_core::{DataType, EngineError, Value};

    fn schema() -> Table {
        TableBuilder::new("t")
            .unwrap()
            .add_column("name", DataType::String)
            .unwrap()
            .add_column("rank", DataType::Int64)
            .unwrap()
            .build()
    }

    fn row(id: u64, name: &str, rank: i64) -> Row {
        Row::new(id, vec![Value::from(name), Value::Int64(rank)])
    }

    fn sorted_ids(order: &SortOrder, rows: &[Row]) -> Vec<u64> {
        let mut refs: Vec<&Row> = rows.iter().collect();
        order.sort(&mut refs);
        refs.iter().map(|r| r.id()).collect()
    }

    #[test]
    fn test_sort_ascending_and_descending() {
        let rows = vec![row(1, "b", 2), row(2, "a", 3), row(3, "c", 1)];
        let asc = SortOrder::resolve(&[SortColumn::new("name", true)], &schema()).unwrap();
        assert_eq!(sorted_ids(&asc, &rows), vec![2, 1, 3]);

        let desc = SortOrder::resolve(&[SortColumn::new("rank", false)], &schema()).unwrap();
        assert_eq!(sorted_ids(&desc, &rows), vec![2, 1, 3]);
    }

    #[test]
    fn test_sort_is_stable() {
        let rows = vec![row(1, "x", 1), row(2, "x", 0), row(3, "x", 1)];
        let order = SortOrder::resolve(&[SortColumn::new("name", true)], &schema()).unwrap();
        assert_eq!(sorted_ids(&order, &rows), vec![1, 2, 3]);
    }

    #[test]
    fn test_then_breaks_ties() {
        let rows = vec![row(1, "x", 2), row(2, "y", 0), row(3, "x", 1)];
        let by_rank = SortOrder::resolve(&[SortColumn::new("rank", true)], &schema()).unwrap();
        let by_name = SortOrder::resolve(&[SortColumn::new("name", true)], &schema()).unwrap();
        assert_eq!(sorted_ids(&by_name.then(&by_rank), &rows), vec![3, 1, 2]);
    }

    #[test]
    fn test_unknown_column() {
        let err = SortOrder::resolve(&[SortColumn::new("missing", true)], &schema()).unwrap_err();
        assert_eq!(err, EngineError::column_not_found("t", "missing"));
    }
}
