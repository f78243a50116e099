//! One dashboard interaction: load (cached), pivot, chart, and the view that
//! gets rendered.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub mod cache;
pub mod config;
pub mod html;
pub mod session;

pub use cache::DatasetCache;
pub use config::DashboardConfig;
pub use html::render_html;
pub use session::SessionCommand;

use crate::chart::{ChartKind, Figure, build_figure};
use crate::processor::columnar_processor::ColumnarProcessor;
use crate::processor::pivot::PivotTable;
use crate::processor::query_builder::QueryCache;
use crate::processor::{AggregateOp, ProcessorError, Value};

/// Shown instead of a table while no value field is selected.
pub const PROMPT: &str = "Select at least one field to aggregate.";

/// The user's current choice of fields, aggregation and chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<String>,
    pub aggfunc: AggregateOp,
    pub chart: ChartKind,
}

impl Selection {
    /// A pivot can only be computed once something is being aggregated.
    pub fn is_ready(&self) -> bool {
        !self.values.is_empty()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rows:    {}", self.rows.join(", "))?;
        writeln!(f, "columns: {}", self.columns.join(", "))?;
        writeln!(f, "values:  {}", self.values.join(", "))?;
        writeln!(f, "agg:     {}", self.aggfunc)?;
        write!(f, "chart:   {}", self.chart)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rendered { table: PivotTable, figure: Figure },
    Prompt,
    Failed { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataInfo {
    pub total_records: usize,
    /// Rows of the pivot result, present only when a table was rendered.
    pub pivot_rows: Option<usize>,
}

/// The first rows of the raw dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Preview {
    fn of(processor: &ColumnarProcessor, n: usize) -> Self {
        Self {
            headers: processor.headers().to_vec(),
            rows: processor.head(n),
        }
    }
}

/// Everything one interaction produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub title: String,
    pub selection: Selection,
    pub outcome: Outcome,
    pub info: DataInfo,
    pub preview: Preview,
}

impl DashboardView {
    pub fn table(&self) -> Option<&PivotTable> {
        match &self.outcome {
            Outcome::Rendered { table, .. } => Some(table),
            _ => None,
        }
    }

    pub fn figure(&self) -> Option<&Figure> {
        match &self.outcome {
            Outcome::Rendered { figure, .. } => Some(figure),
            _ => None,
        }
    }
}

/// Plain-text rendering: the pivot table, the prompt, or the error message.
impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Rendered { table, .. } => write!(f, "{table}"),
            Outcome::Prompt => f.write_str(PROMPT),
            Outcome::Failed { message } => write!(f, "Error: {message}"),
        }
    }
}

pub struct Dashboard {
    config: DashboardConfig,
    datasets: DatasetCache,
    queries: Rc<QueryCache>,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        let queries = Rc::new(QueryCache::with_capacity(config.cache_capacity));
        Self {
            config,
            datasets: DatasetCache::new(),
            queries,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn datasets(&self) -> &DatasetCache {
        &self.datasets
    }

    pub fn query_cache(&self) -> &QueryCache {
        &self.queries
    }

    /// The current dataset, loaded on first use and whenever the file changed.
    pub fn dataset(&mut self) -> Result<Rc<ColumnarProcessor>, ProcessorError> {
        let (processor, reloaded) = self.datasets.get_or_load(&self.config.data_path)?;
        if reloaded {
            self.queries.clear();
        }
        Ok(processor)
    }

    /// Runs one interaction.
    ///
    /// Only a failure to load the dataset is returned as an error. Anything
    /// that goes wrong while aggregating or charting ends up in
    /// [`Outcome::Failed`], next to the preview.
    pub fn interact(&mut self, selection: &Selection) -> Result<DashboardView, ProcessorError> {
        let processor = self.dataset()?;

        let outcome = if selection.is_ready() {
            match self.render(&processor, selection) {
                Ok((table, figure)) => Outcome::Rendered { table, figure },
                Err(e) => {
                    warn!(error = %e, "interaction failed");
                    Outcome::Failed {
                        message: e.to_string(),
                    }
                }
            }
        } else {
            Outcome::Prompt
        };

        let info = DataInfo {
            total_records: processor.row_count(),
            pivot_rows: match &outcome {
                Outcome::Rendered { table, .. } => Some(table.len()),
                _ => None,
            },
        };
        info!(
            rows = ?selection.rows,
            columns = ?selection.columns,
            values = ?selection.values,
            aggfunc = %selection.aggfunc,
            chart = %selection.chart,
            pivot_rows = ?info.pivot_rows,
            "interaction"
        );

        Ok(DashboardView {
            title: self.config.title.clone(),
            selection: selection.clone(),
            outcome,
            info,
            preview: Preview::of(&processor, self.config.preview_rows),
        })
    }

    fn render(
        &self,
        processor: &Rc<ColumnarProcessor>,
        selection: &Selection,
    ) -> Result<(PivotTable, Figure), ProcessorError> {
        let table = processor
            .query_with_cache(&self.queries)
            .rows(selection.rows.iter().cloned())
            .columns(selection.columns.iter().cloned())
            .values(selection.values.iter().cloned())
            .aggfunc(selection.aggfunc)
            .execute()?;
        let figure = build_figure(&table, selection.chart)?;
        Ok((table, figure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::AggregateResult;
    use crate::processor::pivot::PivotLayout;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn dashboard(csv: &str) -> (Dashboard, NamedTempFile) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(csv.as_bytes()).unwrap();
        file.flush().unwrap();
        let config = DashboardConfig {
            data_path: file.path().to_path_buf(),
            preview_rows: 2,
            ..DashboardConfig::default()
        };
        (Dashboard::new(config), file)
    }

    const SALES: &str = "region,category,sales\nEast,Food,10\nWest,Toys,20\nEast,Toys,5\n";

    fn selection(rows: &[&str], columns: &[&str], values: &[&str]) -> Selection {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Selection {
            rows: owned(rows),
            columns: owned(columns),
            values: owned(values),
            aggfunc: AggregateOp::Sum,
            chart: ChartKind::Bar,
        }
    }

    #[test]
    fn test_prompt_without_values() {
        let (mut dash, _file) = dashboard(SALES);
        let view = dash.interact(&selection(&["region"], &[], &[])).unwrap();
        assert_eq!(view.outcome, Outcome::Prompt);
        assert_eq!(view.info.total_records, 3);
        assert_eq!(view.info.pivot_rows, None);
        assert_eq!(view.preview.rows.len(), 2);
        assert_eq!(view.to_string(), PROMPT);
    }

    #[test]
    fn test_rendered_view() {
        let (mut dash, _file) = dashboard(SALES);
        let view = dash.interact(&selection(&["region"], &[], &["sales"])).unwrap();
        let table = view.table().unwrap();
        assert_eq!(table.layout(), PivotLayout::RowsOnly);
        assert_eq!(table.cell(0, 0), Some(AggregateResult::Int(15)));
        assert_eq!(view.info.pivot_rows, Some(2));
        assert_eq!(view.figure().unwrap().data.len(), 1);
        assert_eq!(view.preview.headers, vec!["region", "category", "sales"]);
    }

    #[test]
    fn test_errors_are_captured_in_the_view() {
        let (mut dash, _file) = dashboard(SALES);
        let view = dash.interact(&selection(&["nope"], &[], &["sales"])).unwrap();
        match &view.outcome {
            Outcome::Failed { message } => assert!(message.contains("nope")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(view.info.total_records, 3);
        assert_eq!(view.preview.rows.len(), 2);

        let view = dash
            .interact(&selection(&["sales"], &[], &["category"]))
            .unwrap();
        assert!(matches!(view.outcome, Outcome::Failed { .. }));
    }

    #[test]
    fn test_dataset_loaded_once_and_tables_cached() {
        let (mut dash, _file) = dashboard(SALES);
        let sel = selection(&["region"], &["category"], &["sales"]);
        dash.interact(&sel).unwrap();
        dash.interact(&sel).unwrap();
        dash.interact(&selection(&[], &[], &["sales"])).unwrap();
        assert_eq!(dash.datasets().loads(), 1);
        assert_eq!(dash.query_cache().len(), 2);
    }

    #[test]
    fn test_reload_clears_query_cache() {
        let (mut dash, mut file) = dashboard(SALES);
        let sel = selection(&[], &[], &["sales"]);
        dash.interact(&sel).unwrap();
        assert_eq!(dash.query_cache().len(), 1);

        file.write_all(b"West,Food,100\n").unwrap();
        file.flush().unwrap();

        let view = dash.interact(&sel).unwrap();
        assert_eq!(dash.datasets().loads(), 2);
        assert_eq!(view.info.total_records, 4);
        assert_eq!(view.table().unwrap().cell(0, 0), Some(AggregateResult::Int(135)));
    }

    #[test]
    fn test_missing_data_file_is_an_error() {
        let mut dash = Dashboard::new(DashboardConfig {
            data_path: "/nonexistent/sales.csv".into(),
            ..DashboardConfig::default()
        });
        assert!(dash.interact(&Selection::default()).is_err());
    }
}
