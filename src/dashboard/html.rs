//! Self-contained HTML page for a [`DashboardView`].
//!
//! Styles are inlined; the chart is drawn by Plotly.js loaded from the
//! configured URL, with the figure embedded as JSON.

use crate::dashboard::{DashboardView, Outcome, PROMPT};
use crate::processor::ProcessorError;
use crate::processor::pivot::{LABEL_SEPARATOR, PivotTable};

pub fn render_html(view: &DashboardView, plotly_src: &str) -> Result<String, ProcessorError> {
    let (result, chart) = match &view.outcome {
        Outcome::Rendered { table, figure } => {
            let json = figure
                .to_json()
                .map_err(|e| ProcessorError::Chart(e.to_string()))?;
            (render_pivot_table(table), render_chart(&json))
        }
        Outcome::Prompt => (
            format!(r#"<p class="notice">{}</p>"#, html_escape(PROMPT)),
            String::new(),
        ),
        Outcome::Failed { message } => (
            format!(r#"<p class="error">Error: {}</p>"#, html_escape(message)),
            String::new(),
        ),
    };

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{css}</style>
    <script src="{plotly_src}"></script>
</head>
<body>
    <div class="container">
        <h1>{title}</h1>
        {selection}
        <h2>Pivot table</h2>
        {result}
        {chart}
        {info}
        {preview}
    </div>
</body>
</html>"#,
        title = html_escape(&view.title),
        css = inline_css(),
        plotly_src = html_escape(plotly_src),
        selection = render_selection(view),
        result = result,
        chart = chart,
        info = render_info(view),
        preview = render_preview(view),
    ))
}

fn render_selection(view: &DashboardView) -> String {
    let sel = &view.selection;
    let fields = |names: &[String]| {
        if names.is_empty() {
            "<em>none</em>".to_string()
        } else {
            html_escape(&names.join(", "))
        }
    };
    format!(
        r#"<dl class="selection">
            <dt>Rows</dt><dd>{rows}</dd>
            <dt>Columns</dt><dd>{columns}</dd>
            <dt>Values</dt><dd>{values}</dd>
            <dt>Aggregation</dt><dd>{agg}</dd>
            <dt>Chart</dt><dd>{chart}</dd>
        </dl>"#,
        rows = fields(&sel.rows),
        columns = fields(&sel.columns),
        values = fields(&sel.values),
        agg = sel.aggfunc,
        chart = sel.chart,
    )
}

fn render_pivot_table(table: &PivotTable) -> String {
    let mut html = String::from("<table class=\"pivot\">\n<thead><tr>");
    html.push_str(&format!(
        "<th>{}</th>",
        html_escape(&table.row_fields.join(LABEL_SEPARATOR))
    ));
    for label in table.column_labels() {
        html.push_str(&format!("<th>{}</th>", html_escape(&label)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for (label, cells) in table.row_labels().iter().zip(&table.cells) {
        html.push_str(&format!("<tr><th>{}</th>", html_escape(label)));
        for cell in cells {
            match cell {
                Some(v) => html.push_str(&format!("<td>{v}</td>")),
                None => html.push_str("<td class=\"empty\"></td>"),
            }
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>");
    html
}

fn render_chart(figure_json: &str) -> String {
    // "</" cannot appear inside a <script> element
    let json = figure_json.replace("</", "<\\/");
    format!(
        r#"<h2>Chart</h2>
        <div id="chart"></div>
        <script>
            const figure = {json};
            Plotly.newPlot("chart", figure.data, figure.layout, {{responsive: true}});
        </script>"#
    )
}

fn render_info(view: &DashboardView) -> String {
    let mut items = format!(
        "<li>Total records: {}</li>",
        view.info.total_records
    );
    if let Some(rows) = view.info.pivot_rows {
        items.push_str(&format!("<li>Pivot result rows: {rows}</li>"));
    }
    format!(r#"<h2>Data info</h2><ul class="info">{items}</ul>"#)
}

fn render_preview(view: &DashboardView) -> String {
    let mut html = String::from("<h2>Data preview</h2>\n<table class=\"preview\">\n<thead><tr>");
    for header in &view.preview.headers {
        html.push_str(&format!("<th>{}</th>", html_escape(header)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for row in &view.preview.rows {
        html.push_str("<tr>");
        for value in row {
            html.push_str(&format!("<td>{}</td>", html_escape(&value.to_string())));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>");
    html
}

fn inline_css() -> &'static str {
    r#"
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; margin: 0; background: #f5f6f8; color: #222; }
.container { max-width: 1200px; margin: 0 auto; padding: 24px; }
h1 { margin-top: 0; }
h2 { margin-top: 32px; font-size: 1.2em; }
table { border-collapse: collapse; background: #fff; }
th, td { border: 1px solid #dde1e6; padding: 4px 10px; }
td { text-align: right; font-variant-numeric: tabular-nums; }
td.empty { background: #fafafa; }
thead th { background: #eef1f5; }
.selection { display: grid; grid-template-columns: max-content auto; gap: 2px 16px; }
.selection dt { font-weight: 600; }
.selection dd { margin: 0; }
.notice { padding: 12px; background: #e8f1fd; border-left: 4px solid #3b82f6; }
.error { padding: 12px; background: #fdecea; border-left: 4px solid #dc2626; }
#chart { width: 100%; height: 480px; }
"#
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
