//! Chart dispatch: turns a [`PivotTable`] and a [`ChartKind`] into a [`Figure`].
//!
//! | grouping            | bar / line / scatter                          | heatmap             |
//! |---------------------|-----------------------------------------------|---------------------|
//! | none                | x = value fields, one trace per table row     | table as is         |
//! | column fields       | x = row labels, one trace per table column    | cells vs labels     |
//! | row fields only     | x = first row field, one trace per value      | cells vs labels     |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod figure;

pub use figure::{Axis, Figure, Layout, ScatterMode, Title, Trace};

use crate::processor::pivot::{PivotLayout, PivotTable};
use crate::processor::{ProcessorError, Value};

/// Title of charts drawn from a table with no grouping fields.
pub const SUMMARY_TITLE: &str = "Aggregate result";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Scatter,
    Heatmap,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Scatter,
        ChartKind::Heatmap,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Heatmap => "heatmap",
        }
    }

    fn series(self, x: Vec<Value>, y: Vec<Option<f64>>, name: String, line_mode: ScatterMode) -> Trace {
        match self {
            ChartKind::Bar => Trace::Bar { x, y, name },
            ChartKind::Line => Trace::Scatter {
                x,
                y,
                name,
                mode: line_mode,
            },
            ChartKind::Scatter | ChartKind::Heatmap => Trace::Scatter {
                x,
                y,
                name,
                mode: ScatterMode::Markers,
            },
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChartKind {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "scatter" => Ok(ChartKind::Scatter),
            "heatmap" => Ok(ChartKind::Heatmap),
            other => Err(ProcessorError::Parse(format!("unknown chart type '{other}'"))),
        }
    }
}

/// Builds the figure for `table`, picking the construction from the table's
/// grouping layout and the requested chart kind.
pub fn build_figure(table: &PivotTable, kind: ChartKind) -> Result<Figure, ProcessorError> {
    if table.is_empty() || table.width() == 0 {
        return Err(ProcessorError::Chart("the pivot table has no data to plot".into()));
    }

    let layout = table.layout();
    debug!(?layout, %kind, "building figure");

    let figure = match (layout, kind) {
        (_, ChartKind::Heatmap) => heatmap(table, layout),
        (PivotLayout::Summary, _) => summary_series(table, kind),
        (PivotLayout::ColumnsOnly | PivotLayout::RowsAndColumns, _) => per_column_series(table, kind),
        (PivotLayout::RowsOnly, _) => per_value_series(table, kind),
    };
    Ok(figure)
}

/// No grouping: the table is transposed so each value field is one x position.
fn summary_series(table: &PivotTable, kind: ChartKind) -> Figure {
    let x: Vec<Value> = table
        .column_labels()
        .into_iter()
        .map(Value::Str)
        .collect();

    let data = table
        .row_labels()
        .into_iter()
        .enumerate()
        .map(|(row, name)| kind.series(x.clone(), table.row_values(row), name, ScatterMode::Lines))
        .collect();

    Figure {
        data,
        layout: Layout {
            title: Some(Title::new(SUMMARY_TITLE)),
            ..Layout::default()
        },
    }
}

/// Column fields selected: one trace per table column against the row labels.
fn per_column_series(table: &PivotTable, kind: ChartKind) -> Figure {
    let x: Vec<Value> = table.row_labels().into_iter().map(Value::Str).collect();

    let data = table
        .column_labels()
        .into_iter()
        .enumerate()
        .map(|(column, name)| {
            kind.series(
                x.clone(),
                table.column_values(column),
                name,
                ScatterMode::LinesMarkers,
            )
        })
        .collect();

    Figure {
        data,
        layout: Layout::default(),
    }
}

/// Row fields only: x is the first row field, one trace per value field.
fn per_value_series(table: &PivotTable, kind: ChartKind) -> Figure {
    let x: Vec<Value> = table
        .rows
        .iter()
        .map(|key| key.first().cloned().unwrap_or(Value::Null))
        .collect();

    let data = table
        .column_labels()
        .into_iter()
        .enumerate()
        .map(|(column, name)| kind.series(x.clone(), table.column_values(column), name, ScatterMode::Lines))
        .collect();

    Figure {
        data,
        layout: Layout {
            xaxis: table.row_fields.first().map(Axis::titled),
            yaxis: Some(Axis::titled("value")),
            ..Layout::default()
        },
    }
}

fn heatmap(table: &PivotTable, layout: PivotLayout) -> Figure {
    let z = (0..table.len()).map(|row| table.row_values(row)).collect();

    Figure {
        data: vec![Trace::Heatmap {
            z,
            x: table.column_labels(),
            y: table.row_labels(),
        }],
        layout: Layout {
            title: (layout == PivotLayout::Summary).then(|| Title::new(SUMMARY_TITLE)),
            ..Layout::default()
        },
    }
}
