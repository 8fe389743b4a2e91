//! Data and HTML rendering for the e-commerce dashboard.
use serde::Serialize;
use serde_json::Value;

use crate::clickhouse::{queries, value_as_f64, QueryEngine, Rows};
use crate::mongo::format::format_number;

/// Everything shown on the summary page. Each part is fetched independently so that one
/// failing query only blanks its own section.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_products: Result<Value, String>,
    pub avg_price: Result<Value, String>,
    pub top_categories: Result<Rows, String>,
    pub top_brands: Result<Rows, String>,
}

impl Summary {
    /// runs the four summary queries
    pub fn fetch<E: QueryEngine>(engine: &E) -> Self {
        let scalar = |sql: &str| match engine.scalar(sql) {
            Ok(v) => Ok(v.unwrap_or(Value::Null)),
            Err(e) => Err(format!("Error: {}", e)),
        };
        let rows = |sql: &str| engine.query(sql).map_err(|e| format!("Error: {}", e));
        Self {
            total_products: scalar(queries::TOTAL_PRODUCTS),
            avg_price: scalar(queries::AVG_PRICE),
            top_categories: rows(queries::TOP_CATEGORIES),
            top_brands: rows(queries::TOP_BRANDS),
        }
    }
}

/// escapes text for use inside HTML element content and attribute values
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// renders a cell value the way a person would read it: strings unquoted, NULL as empty
fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// formats a number with thousands separators, keeping two decimals for fractional values
pub fn grouped(v: &Value) -> String {
    match value_as_f64(v) {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format_number(f as i64),
        Some(f) => {
            let rounded = (f * 100.0).round() / 100.0;
            let whole = rounded.trunc() as i64;
            let cents = ((rounded - whole as f64).abs() * 100.0).round() as i64;
            let sign = if rounded < 0.0 && whole == 0 { "-" } else { "" };
            format!("{}{}.{:02}", sign, format_number(whole), cents)
        }
        None => plain(v),
    }
}

const INDEX_STYLE: &str = "body { font-family: Arial, sans-serif; margin: 20px; }
        .metric { background: #f5f5f5; padding: 15px; margin: 10px; border-radius: 5px; }
        table { border-collapse: collapse; width: 100%; }
        th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
        th { background-color: #f2f2f2; }";

const SUMMARY_STYLE: &str = "body { font-family: Arial, sans-serif; margin: 20px; }
        .metric { background: #007bff; color: white; padding: 20px; margin: 10px; border-radius: 5px; }
        table { border-collapse: collapse; width: 100%; margin: 20px 0; }
        th, td { border: 1px solid #ddd; padding: 12px; text-align: left; }
        th { background-color: #f2f2f2; }
        h2 { color: #333; }";

/// the landing page: links to the JSON API and an iframe showing the summary
pub fn render_index() -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>E-commerce Dashboard</title>
    <style>
        {style}
    </style>
</head>
<body>
    <h1>E-commerce ClickHouse Dashboard</h1>

    <div class="metric">
        <h3>Quick Stats API Endpoints:</h3>
        <ul>
            <li><a href="/api/total-products">Total Products</a></li>
            <li><a href="/api/top-categories">Top Categories</a></li>
            <li><a href="/api/top-brands">Top Brands</a></li>
            <li><a href="/api/performance">Performance Metrics</a></li>
        </ul>
    </div>

    <iframe src="/api/summary" width="100%" height="600" frameborder="0"></iframe>
</body>
</html>
"#,
        style = INDEX_STYLE
    )
}

fn render_scalar(v: &Result<Value, String>) -> String {
    match v {
        Ok(v) => escape_html(&grouped(v)),
        Err(e) => escape_html(e),
    }
}

fn render_table(first_header: &str, rows: &Result<Rows, String>) -> String {
    let mut html = format!(
        "    <table>\n        <tr><th>{}</th><th>Products Count</th><th>Avg Price</th></tr>\n",
        first_header
    );
    match rows {
        Ok(rows) => {
            for row in rows {
                let cell = |i: usize| row.get(i).cloned().unwrap_or(Value::Null);
                html.push_str(&format!(
                    "        <tr><td>{}</td><td>{}</td><td>₽{}</td></tr>\n",
                    escape_html(&plain(&cell(0))),
                    escape_html(&grouped(&cell(1))),
                    escape_html(&grouped(&cell(2))),
                ));
            }
        }
        Err(e) => html.push_str(&format!(
            "        <tr><td colspan=\"3\">{}</td></tr>\n",
            escape_html(e)
        )),
    }
    html.push_str("    </table>\n");
    html
}

/// the detailed results page shown inside the landing page iframe
pub fn render_summary(summary: &Summary) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Detailed Results</title>
    <style>
        {style}
    </style>
</head>
<body>
    <h1>E-commerce Analytics Results</h1>

    <h2>Total Products: {total}</h2>

    <h2>Average Price: ₽{avg}</h2>

    <h2>Top 10 Categories</h2>
{categories}
    <h2>Top 10 Brands</h2>
{brands}</body>
</html>
"#,
        style = SUMMARY_STYLE,
        total = render_scalar(&summary.total_products),
        avg = render_scalar(&summary.avg_price),
        categories = render_table("Category ID", &summary.top_categories),
        brands = render_table("Brand", &summary.top_brands),
    )
}
