//! Pivot tables: group records by row and column fields and aggregate the
//! selected value fields within each group.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use rayon::prelude::*;
use tracing::debug;

use crate::processor::{
    AggregateOp, AggregateResult, ProcessorError, Value, columnar_processor::ColumnarProcessor,
};

/// Row label of the one-row table produced when no grouping field is selected.
pub const SUMMARY_LABEL: &str = "Aggregate";

/// Separator used when a multi-level key is shown as a single label.
pub const LABEL_SEPARATOR: &str = " / ";

/// Which grouping fields produced a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotLayout {
    /// No row and no column fields: one summary row.
    Summary,
    RowsOnly,
    ColumnsOnly,
    RowsAndColumns,
}

/// Aggregated table keyed by the selected grouping fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    /// Names of the row-axis levels (the selected row fields).
    pub row_fields: Vec<String>,
    /// Names of the selected column fields.
    pub column_fields: Vec<String>,
    /// Unique, ordered row keys.
    pub rows: Vec<Vec<Value>>,
    /// Unique, ordered column keys. With column fields selected the first
    /// level is the value field name.
    pub columns: Vec<Vec<Value>>,
    /// `cells[row][column]`; `None` where a group has nothing to aggregate.
    pub cells: Vec<Vec<Option<AggregateResult>>>,
    pub aggfunc: AggregateOp,
}

impl PivotTable {
    pub fn layout(&self) -> PivotLayout {
        match (self.row_fields.is_empty(), self.column_fields.is_empty()) {
            (true, true) => PivotLayout::Summary,
            (false, true) => PivotLayout::RowsOnly,
            (true, false) => PivotLayout::ColumnsOnly,
            (false, false) => PivotLayout::RowsAndColumns,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<AggregateResult> {
        self.cells.get(row)?.get(column).copied().flatten()
    }

    pub fn row_labels(&self) -> Vec<String> {
        self.rows.iter().map(|key| join_key(key)).collect()
    }

    pub fn column_labels(&self) -> Vec<String> {
        self.columns.iter().map(|key| join_key(key)).collect()
    }

    /// The cells of one column as floats, `None` for empty cells.
    pub fn column_values(&self, column: usize) -> Vec<Option<f64>> {
        self.cells
            .iter()
            .map(|row| row.get(column).copied().flatten().map(AggregateResult::as_f64))
            .collect()
    }

    /// The cells of one row as floats, `None` for empty cells.
    pub fn row_values(&self, row: usize) -> Vec<Option<f64>> {
        self.cells.get(row).map_or_else(Vec::new, |cells| {
            cells
                .iter()
                .map(|cell| cell.map(AggregateResult::as_f64))
                .collect()
        })
    }

    /// Drops columns whose cells are all empty, then rows likewise.
    fn drop_empty(&mut self) {
        let keep_cols: Vec<bool> = (0..self.columns.len())
            .map(|c| self.cells.iter().any(|row| row[c].is_some()))
            .collect();
        if keep_cols.iter().any(|keep| !keep) {
            let mut idx = 0;
            self.columns.retain(|_| {
                idx += 1;
                keep_cols[idx - 1]
            });
            for row in &mut self.cells {
                let mut idx = 0;
                row.retain(|_| {
                    idx += 1;
                    keep_cols[idx - 1]
                });
            }
        }

        let keep_rows: Vec<bool> = self
            .cells
            .iter()
            .map(|row| row.iter().any(Option::is_some))
            .collect();
        let mut idx = 0;
        self.rows.retain(|_| {
            idx += 1;
            keep_rows[idx - 1]
        });
        let mut idx = 0;
        self.cells.retain(|_| {
            idx += 1;
            keep_rows[idx - 1]
        });
    }
}

pub(crate) fn join_key(key: &[Value]) -> String {
    key.iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(LABEL_SEPARATOR)
}

impl fmt::Display for PivotTable {
    /// Plain-text rendering with right-aligned cells.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_label = if self.row_fields.is_empty() {
            String::new()
        } else {
            self.row_fields.join(LABEL_SEPARATOR)
        };

        let mut grid: Vec<Vec<String>> = Vec::with_capacity(self.rows.len() + 1);
        let mut header = vec![header_label];
        header.extend(self.column_labels());
        grid.push(header);

        for (row_key, cells) in self.rows.iter().zip(&self.cells) {
            let mut line = vec![join_key(row_key)];
            line.extend(
                cells
                    .iter()
                    .map(|cell| cell.map_or_else(|| "NaN".to_string(), |v| v.to_string())),
            );
            grid.push(line);
        }

        let widths: Vec<usize> = (0..grid[0].len())
            .map(|c| {
                grid.iter()
                    .map(|line| line[c].chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        for line in &grid {
            let mut text = String::new();
            for (c, cell) in line.iter().enumerate() {
                if c == 0 {
                    text.push_str(&format!("{:<width$}", cell, width = widths[c]));
                } else {
                    text.push_str(&format!("  {:>width$}", cell, width = widths[c]));
                }
            }
            writeln!(f, "{}", text.trim_end())?;
        }
        Ok(())
    }
}

/// Resolved field selection for one pivot computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PivotSpec {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<String>,
    pub aggfunc: AggregateOp,
}

type GroupKey = Vec<u64>;

/// Computes a pivot table for `spec`.
///
/// With no row and no column fields each value column is aggregated as a
/// whole into a single [`SUMMARY_LABEL`] row.
pub fn pivot(
    processor: &ColumnarProcessor,
    spec: &PivotSpec,
) -> Result<PivotTable, ProcessorError> {
    if spec.values.is_empty() {
        return Err(ProcessorError::Parse(
            "at least one value field is required".into(),
        ));
    }

    let row_idx = resolve(processor, &spec.rows)?;
    let col_idx = resolve(processor, &spec.columns)?;
    let value_idx = resolve(processor, &spec.values)?;

    if spec.aggfunc.requires_numeric() {
        for (name, &idx) in spec.values.iter().zip(&value_idx) {
            let numeric = processor
                .column(idx)
                .is_some_and(|c| c.column_type().is_numeric());
            if !numeric {
                return Err(ProcessorError::NonNumericColumn {
                    column: name.clone(),
                    op: spec.aggfunc,
                });
            }
        }
    }

    let mut table = if row_idx.is_empty() && col_idx.is_empty() {
        summarize(processor, spec)?
    } else {
        group(processor, spec, &row_idx, &col_idx)?
    };
    table.drop_empty();

    debug!(
        rows = table.len(),
        columns = table.width(),
        aggfunc = %spec.aggfunc,
        "computed pivot table"
    );
    Ok(table)
}

fn resolve(processor: &ColumnarProcessor, names: &[String]) -> Result<Vec<usize>, ProcessorError> {
    names
        .iter()
        .map(|name| processor.column_index(name))
        .collect()
}

fn summarize(processor: &ColumnarProcessor, spec: &PivotSpec) -> Result<PivotTable, ProcessorError> {
    let cells = spec
        .values
        .iter()
        .map(|name| processor.aggregate(name, spec.aggfunc))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PivotTable {
        row_fields: Vec::new(),
        column_fields: Vec::new(),
        rows: vec![vec![Value::Str(SUMMARY_LABEL.to_string())]],
        columns: spec.values.iter().map(|v| vec![Value::Str(v.clone())]).collect(),
        cells: vec![cells],
        aggfunc: spec.aggfunc,
    })
}

fn group(
    processor: &ColumnarProcessor,
    spec: &PivotSpec,
    row_idx: &[usize],
    col_idx: &[usize],
) -> Result<PivotTable, ProcessorError> {
    let key_of = |fields: &[usize], record: usize| -> Option<GroupKey> {
        fields
            .iter()
            .map(|&f| processor.column(f).and_then(|c| c.key_code(record)))
            .collect()
    };
    let decode = |fields: &[usize], key: &GroupKey| -> Vec<Value> {
        fields
            .iter()
            .zip(key)
            .map(|(&f, &code)| {
                processor
                    .column(f)
                    .map_or(Value::Null, |c| c.value_for_code(code))
            })
            .collect()
    };

    // Records per (row key, column key); records with a null key are dropped
    let mut groups: HashMap<(GroupKey, GroupKey), Vec<usize>> = HashMap::new();
    for record in 0..processor.row_count() {
        let (Some(rk), Some(ck)) = (key_of(row_idx, record), key_of(col_idx, record)) else {
            continue;
        };
        groups.entry((rk, ck)).or_default().push(record);
    }

    let mut row_codes: BTreeSet<&GroupKey> = BTreeSet::new();
    let mut col_codes: BTreeSet<&GroupKey> = BTreeSet::new();
    for (rk, ck) in groups.keys() {
        row_codes.insert(rk);
        col_codes.insert(ck);
    }

    // codes only identify groups, the displayed order follows the decoded values
    let mut row_keys: Vec<(Vec<Value>, GroupKey)> = row_codes
        .into_iter()
        .map(|code| (decode(row_idx, code), code.clone()))
        .collect();
    row_keys.sort_by(|a, b| a.0.cmp(&b.0));
    let mut col_keys: Vec<(Vec<Value>, GroupKey)> = col_codes
        .into_iter()
        .map(|code| (decode(col_idx, code), code.clone()))
        .collect();
    col_keys.sort_by(|a, b| a.0.cmp(&b.0));

    let (rows, columns, cells) = match (row_idx.is_empty(), col_idx.is_empty()) {
        // rows only: one column per value field
        (false, true) => {
            let no_col = GroupKey::new();
            let cells = row_keys
                .par_iter()
                .map(|(_, rk)| {
                    spec.values
                        .iter()
                        .map(|v| processor.aggregate_rows(v, spec.aggfunc, records(&groups, rk, &no_col)))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            let columns = spec.values.iter().map(|v| vec![Value::Str(v.clone())]).collect();
            (row_keys.into_iter().map(|(k, _)| k).collect(), columns, cells)
        }

        // columns only: the value fields become the rows
        (true, false) => {
            let no_row = GroupKey::new();
            let cells = spec
                .values
                .par_iter()
                .map(|v| {
                    col_keys
                        .iter()
                        .map(|(_, ck)| processor.aggregate_rows(v, spec.aggfunc, records(&groups, &no_row, ck)))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            let rows = spec.values.iter().map(|v| vec![Value::Str(v.clone())]).collect();
            (rows, col_keys.into_iter().map(|(k, _)| k).collect(), cells)
        }

        // both: columns are (value field, column key...)
        _ => {
            let cells = row_keys
                .par_iter()
                .map(|(_, rk)| -> Result<Vec<Option<AggregateResult>>, ProcessorError> {
                    let mut line = Vec::with_capacity(spec.values.len() * col_keys.len());
                    for v in &spec.values {
                        for (_, ck) in &col_keys {
                            let recs = records(&groups, rk, ck);
                            line.push(if recs.is_empty() {
                                None
                            } else {
                                processor.aggregate_rows(v, spec.aggfunc, recs)?
                            });
                        }
                    }
                    Ok(line)
                })
                .collect::<Result<Vec<_>, _>>()?;
            let columns = spec
                .values
                .iter()
                .flat_map(|v| {
                    col_keys.iter().map(move |(key, _)| {
                        let mut column = Vec::with_capacity(key.len() + 1);
                        column.push(Value::Str(v.clone()));
                        column.extend(key.iter().cloned());
                        column
                    })
                })
                .collect();
            (row_keys.into_iter().map(|(k, _)| k).collect(), columns, cells)
        }
    };

    Ok(PivotTable {
        row_fields: spec.rows.clone(),
        column_fields: spec.columns.clone(),
        rows,
        columns,
        cells,
        aggfunc: spec.aggfunc,
    })
}

fn records<'g>(
    groups: &'g HashMap<(GroupKey, GroupKey), Vec<usize>>,
    rk: &GroupKey,
    ck: &GroupKey,
) -> &'g [usize] {
    groups
        .get(&(rk.clone(), ck.clone()))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALES: &str = "region,category,sales,units\n\
        East,Food,100,1\n\
        West,Toys,50,2\n\
        East,Toys,30,3\n\
        East,Food,20,\n\
        ,Food,999,9\n";

    fn processor() -> ColumnarProcessor {
        let mut processor = ColumnarProcessor::new();
        processor.load_bytes(SALES.as_bytes()).unwrap();
        processor
    }

    fn spec(rows: &[&str], columns: &[&str], values: &[&str], aggfunc: AggregateOp) -> PivotSpec {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        PivotSpec {
            rows: owned(rows),
            columns: owned(columns),
            values: owned(values),
            aggfunc,
        }
    }

    fn labels(keys: &[Vec<Value>]) -> Vec<String> {
        keys.iter().map(|k| join_key(k)).collect()
    }

    #[test]
    fn test_summary_without_grouping() {
        let table = pivot(&processor(), &spec(&[], &[], &["sales", "units"], AggregateOp::Sum)).unwrap();
        assert_eq!(table.layout(), PivotLayout::Summary);
        assert_eq!(table.row_labels(), vec![SUMMARY_LABEL]);
        assert_eq!(table.column_labels(), vec!["sales", "units"]);
        assert_eq!(table.cell(0, 0), Some(AggregateResult::Int(1199)));
        assert_eq!(table.cell(0, 1), Some(AggregateResult::Int(15)));
    }

    #[test]
    fn test_rows_only() {
        let table = pivot(&processor(), &spec(&["region"], &[], &["sales"], AggregateOp::Sum)).unwrap();
        assert_eq!(table.layout(), PivotLayout::RowsOnly);
        // the record with an empty region is not grouped
        assert_eq!(labels(&table.rows), vec!["East", "West"]);
        assert_eq!(table.column_labels(), vec!["sales"]);
        assert_eq!(table.cell(0, 0), Some(AggregateResult::Int(150)));
        assert_eq!(table.cell(1, 0), Some(AggregateResult::Int(50)));
    }

    #[test]
    fn test_columns_only_puts_values_on_rows() {
        let table = pivot(
            &processor(),
            &spec(&[], &["category"], &["sales", "units"], AggregateOp::Max),
        )
        .unwrap();
        assert_eq!(table.layout(), PivotLayout::ColumnsOnly);
        assert_eq!(table.row_labels(), vec!["sales", "units"]);
        assert_eq!(table.column_labels(), vec!["Food", "Toys"]);
        assert_eq!(table.cell(0, 0), Some(AggregateResult::Int(999)));
        assert_eq!(table.cell(1, 1), Some(AggregateResult::Int(3)));
    }

    #[test]
    fn test_rows_and_columns() {
        let table = pivot(
            &processor(),
            &spec(&["region"], &["category"], &["sales"], AggregateOp::Mean),
        )
        .unwrap();
        assert_eq!(table.layout(), PivotLayout::RowsAndColumns);
        assert_eq!(table.row_labels(), vec!["East", "West"]);
        assert_eq!(
            table.column_labels(),
            vec!["sales / Food", "sales / Toys"]
        );
        assert_eq!(table.cell(0, 0), Some(AggregateResult::Float(60.0)));
        assert_eq!(table.cell(0, 1), Some(AggregateResult::Float(30.0)));
        // no West/Food records
        assert_eq!(table.cell(1, 0), None);
        assert_eq!(table.cell(1, 1), Some(AggregateResult::Float(50.0)));
    }

    #[test]
    fn test_multi_level_rows_are_unique_and_sorted() {
        let table = pivot(
            &processor(),
            &spec(&["region", "category"], &[], &["sales"], AggregateOp::Count),
        )
        .unwrap();
        assert_eq!(
            table.row_labels(),
            vec!["East / Food", "East / Toys", "West / Toys"]
        );
        assert_eq!(table.cell(0, 0), Some(AggregateResult::Int(2)));
    }

    #[test]
    fn test_numeric_keys_sort_numerically() {
        let mut processor = ColumnarProcessor::new();
        processor
            .load_bytes(b"month,sales\n10,1\n2,1\n1,1\n2,5\n")
            .unwrap();
        let table = pivot(&processor, &spec(&["month"], &[], &["sales"], AggregateOp::Sum)).unwrap();
        assert_eq!(table.rows, vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(10)]]);
        assert_eq!(table.cell(1, 0), Some(AggregateResult::Int(6)));
    }

    #[test]
    fn test_na_markers_are_skipped_in_values_and_keys() {
        let mut processor = ColumnarProcessor::new();
        processor
            .load_bytes(b"region,sales\nEast,10\nEast,NA\nWest,5\n")
            .unwrap();
        let table = pivot(&processor, &spec(&["region"], &[], &["sales"], AggregateOp::Sum)).unwrap();
        assert_eq!(table.row_labels(), vec!["East", "West"]);
        assert_eq!(table.cell(0, 0), Some(AggregateResult::Int(10)));
        assert_eq!(table.cell(1, 0), Some(AggregateResult::Int(5)));

        let mut processor = ColumnarProcessor::new();
        processor
            .load_bytes(b"region,price\nEast,10.5\nEast,NaN\nWest,5\n")
            .unwrap();
        let table = pivot(&processor, &spec(&["region"], &[], &["price"], AggregateOp::Mean)).unwrap();
        assert_eq!(table.cell(0, 0), Some(AggregateResult::Float(10.5)));
        assert_eq!(table.cell(1, 0), Some(AggregateResult::Float(5.0)));

        // the NaN record has no key and is not grouped
        let table = pivot(&processor, &spec(&["price"], &[], &["region"], AggregateOp::Count)).unwrap();
        assert_eq!(table.row_labels(), vec!["5.0", "10.5"]);
    }

    #[test]
    fn test_signed_zero_keys_form_one_group() {
        let mut processor = ColumnarProcessor::new();
        processor.load_bytes(b"x,v\n-0.0,1\n0.0,2\n1.5,4\n").unwrap();
        let table = pivot(&processor, &spec(&["x"], &[], &["v"], AggregateOp::Sum)).unwrap();
        assert_eq!(table.row_labels(), vec!["0.0", "1.5"]);
        assert_eq!(table.cell(0, 0), Some(AggregateResult::Int(3)));
    }

    #[test]
    fn test_all_empty_columns_and_rows_are_dropped() {
        let mut processor = ColumnarProcessor::new();
        processor
            .load_bytes(b"region,sales,bonus\nEast,1,\nWest,,\n")
            .unwrap();
        let table = pivot(
            &processor,
            &spec(&["region"], &[], &["sales", "bonus"], AggregateOp::Sum),
        )
        .unwrap();
        assert_eq!(table.column_labels(), vec!["sales"]);
        assert_eq!(table.row_labels(), vec!["East"]);
    }

    #[test]
    fn test_errors() {
        let p = processor();
        assert!(matches!(
            pivot(&p, &spec(&["nope"], &[], &["sales"], AggregateOp::Sum)),
            Err(ProcessorError::MissingColumn(_))
        ));
        assert!(matches!(
            pivot(&p, &spec(&["region"], &[], &["category"], AggregateOp::Mean)),
            Err(ProcessorError::NonNumericColumn { .. })
        ));
        assert!(pivot(&p, &spec(&["region"], &[], &[], AggregateOp::Sum)).is_err());
        // count works on text columns
        assert!(pivot(&p, &spec(&["region"], &[], &["category"], AggregateOp::Count)).is_ok());
    }

    #[test]
    fn test_display() {
        let table = pivot(&processor(), &spec(&["region"], &[], &["sales"], AggregateOp::Sum)).unwrap();
        let text = table.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["region  sales", "East      150", "West       50"]);
    }
}
