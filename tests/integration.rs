use std::io::Write;
use std::rc::Rc;

use pivot_dashboard::chart::Trace;
use pivot_dashboard::{
    AggregateOp, AggregateResult, ChartKind, ColumnarProcessor, Dashboard, DashboardConfig,
    Outcome, PivotLayout, QueryCache, Selection, Value, build_figure, render_html,
};
use tempfile::NamedTempFile;

const SALES: &str = "\
order_id,date,region,category,product,quantity,unit_price,sales
1,2024-01-03,East,Furniture,Desk,2,350.00,700.00
2,2024-01-05,West,Electronics,Laptop,1,1200.00,1200.00
3,2024-02-11,East,Electronics,Headphones,4,150.00,600.00
4,2024-02-20,North,Furniture,Chair,3,,
5,2024-03-01,West,Furniture,Chair,5,120.00,600.00
6,2024-03-02,,Electronics,Pen,10,1.20,12.00
";

fn sales_file() -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    write!(tmp, "{}", SALES).unwrap();
    tmp.flush().unwrap();
    tmp
}

fn selection(rows: &[&str], columns: &[&str], values: &[&str], op: AggregateOp) -> Selection {
    let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
    Selection {
        rows: owned(rows),
        columns: owned(columns),
        values: owned(values),
        aggfunc: op,
        chart: ChartKind::Bar,
    }
}

#[test]
fn test_group_by_mean() {
    let tmp = sales_file();
    let mut processor = ColumnarProcessor::new();
    let summary = processor.load_csv(tmp.path()).unwrap();
    assert_eq!(summary.rows_processed, 6);
    assert!(summary.errors.is_empty());

    let table = Rc::new(processor)
        .query()
        .rows(["region"])
        .values(["sales"])
        .aggfunc(AggregateOp::Mean)
        .execute()
        .unwrap();

    // North has no sales and the null region is not a group
    assert_eq!(
        table.rows,
        vec![vec![Value::Str("East".into())], vec![Value::Str("West".into())]]
    );
    assert_eq!(table.cell(0, 0), Some(AggregateResult::Float(650.0)));
    assert_eq!(table.cell(1, 0), Some(AggregateResult::Float(900.0)));
}

#[test]
fn test_cached_pivot() {
    let tmp = sales_file();
    let mut processor = ColumnarProcessor::new();
    processor.load_csv(tmp.path()).unwrap();
    let processor_rc = Rc::new(processor);
    let cache_rc = Rc::new(QueryCache::new());

    let first = processor_rc
        .query_with_cache(&cache_rc)
        .rows(["category"])
        .values(["quantity"])
        .aggfunc(AggregateOp::Sum)
        .execute()
        .unwrap();
    let second = processor_rc
        .query_with_cache(&cache_rc)
        .rows(["category"])
        .values(["quantity"])
        .aggfunc(AggregateOp::Sum)
        .execute()
        .unwrap(); // from cache
    assert_eq!(first, second);
    assert_eq!(cache_rc.len(), 1);
    assert_eq!(first.cell(0, 0), Some(AggregateResult::Int(15)));
}

#[test]
fn test_every_layout_and_chart() {
    let tmp = sales_file();
    let mut processor = ColumnarProcessor::new();
    processor.load_csv(tmp.path()).unwrap();
    let processor = Rc::new(processor);

    let cases: [(&[&str], &[&str], PivotLayout); 4] = [
        (&[], &[], PivotLayout::Summary),
        (&["region"], &[], PivotLayout::RowsOnly),
        (&[], &["category"], PivotLayout::ColumnsOnly),
        (&["region"], &["category"], PivotLayout::RowsAndColumns),
    ];

    for (rows, columns, layout) in cases {
        for op in AggregateOp::ALL {
            let table = processor
                .query()
                .rows(rows.iter().copied())
                .columns(columns.iter().copied())
                .values(["quantity", "sales"])
                .aggfunc(op)
                .execute()
                .unwrap();
            assert_eq!(table.layout(), layout);

            for kind in ChartKind::ALL {
                let figure = build_figure(&table, kind).unwrap();
                assert!(!figure.data.is_empty());
                let heatmaps = figure
                    .data
                    .iter()
                    .filter(|t| matches!(t, Trace::Heatmap { .. }))
                    .count();
                assert_eq!(heatmaps, usize::from(kind == ChartKind::Heatmap));
                serde_json::from_str::<serde_json::Value>(&figure.to_json().unwrap()).unwrap();
            }
        }
    }
}

#[test]
fn test_dashboard_session() {
    let tmp = sales_file();
    let mut dashboard = Dashboard::new(DashboardConfig {
        data_path: tmp.path().to_path_buf(),
        ..DashboardConfig::default()
    });

    let mut sel = selection(&["region"], &[], &[], AggregateOp::Sum);
    let view = dashboard.interact(&sel).unwrap();
    assert_eq!(view.outcome, Outcome::Prompt);
    assert_eq!(view.preview.rows.len(), 5);

    sel.values = vec!["sales".into()];
    sel.columns = vec!["category".into()];
    sel.chart = ChartKind::Heatmap;
    let view = dashboard.interact(&sel).unwrap();
    let table = view.table().unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(
        table.column_labels(),
        vec!["sales / Electronics", "sales / Furniture"]
    );
    assert_eq!(view.info.total_records, 6);
    assert_eq!(view.info.pivot_rows, Some(2));

    let html = render_html(&view, &dashboard.config().plotly_src).unwrap();
    assert!(html.contains(r#""type":"heatmap""#));
    assert!(html.contains("sales / Electronics"));

    sel.values = vec!["product".into()];
    let view = dashboard.interact(&sel).unwrap();
    assert!(matches!(view.outcome, Outcome::Failed { .. }));
    assert_eq!(dashboard.datasets().loads(), 1);
}
