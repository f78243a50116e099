//! # pivot-dashboard
//!
//! A CSV pivot dashboard: load a CSV file once, pick row, column and value
//! fields, aggregate them into a pivot table and draw the result as a Plotly
//! chart on a self-contained HTML page.
//!
//! - Memory-mapped CSV loading with parallel chunk parsing (Rayon)
//! - Schema inference over all rows (int, float, string) with nulls
//! - Pivot tables over any number of row and column fields
//! - LRU-cached pivot queries between interactions
//! - Bar, line, scatter and heatmap figures serialized as Plotly JSON
//!
//! # Example
//!
//! ```rust,no_run
//! use pivot_dashboard::{AggregateOp, ChartKind, ColumnarProcessor, build_figure};
//! use std::path::Path;
//! use std::rc::Rc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut processor = ColumnarProcessor::new();
//!     processor.load_csv(Path::new("sales.csv"))?;
//!
//!     // Whole-column aggregate
//!     let total = processor.aggregate("sales", AggregateOp::Sum)?;
//!     println!("Total sales: {:?}", total);
//!
//!     // Sales per region and category
//!     let processor = Rc::new(processor);
//!     let table = processor
//!         .query()
//!         .rows(["region"])
//!         .columns(["category"])
//!         .values(["sales"])
//!         .aggfunc(AggregateOp::Sum)
//!         .execute()?;
//!     println!("{table}");
//!
//!     let figure = build_figure(&table, ChartKind::Bar)?;
//!     println!("{}", figure.to_json()?);
//!     Ok(())
//! }
//! ```

pub mod chart;
pub mod dashboard;
mod helpers;
pub mod processor;

pub use chart::{ChartKind, Figure, build_figure};
pub use dashboard::{Dashboard, DashboardConfig, DashboardView, Outcome, Selection, render_html};
pub use processor::columnar_processor::ColumnarProcessor;
pub use processor::pivot::{PivotLayout, PivotSpec, PivotTable, pivot};
pub use processor::query_builder::{PivotQueryBuilder, QueryCache};
pub use processor::{AggregateOp, AggregateResult, ParseSummary, ProcessorError, Value};
