//! Chart rendering for the sentiment breakdown.
//!
//! Each [`ChartKind`] maps to a render function in a [`ChartRegistry`]. A
//! render function turns a [`ChartInput`] (the filtered rows plus the
//! aggregated table) into a Plotly-compatible [`Figure`]: a list of traces
//! and a layout, serialised as JSON. Adding a chart means registering one
//! more function; aggregation is untouched.
//!
//! | Kind | Plotly trace | Built from |
//! |------|--------------|------------|
//! | `bar` | `bar` | table |
//! | `pie` | `pie` | table |
//! | `scatter` | `scatter` (markers) | rows |
//! | `line` | `scatter` (lines) | table |
//! | `histogram` | `histogram` | rows |
//! | `box` | `box` | rows |
//! | `treemap` | `treemap` | table |
//! | `sunburst` | `sunburst` | table |
//! | `funnel` | `funnel` | table |
//! | `area` | `scatter` (filled) | table |
//! | `sine` | `scatter` (lines) | generated |

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{json, Value};

use sentiment_dash_core::aggregate::CategoryCount;
use sentiment_dash_core::models::Row;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Chart types offered by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChartKind {
    Bar,
    Pie,
    Scatter,
    Line,
    Histogram,
    Box,
    Treemap,
    Sunburst,
    Funnel,
    Area,
    SineDemo,
}

impl ChartKind {
    pub const ALL: [ChartKind; 11] = [
        ChartKind::Bar,
        ChartKind::Pie,
        ChartKind::Scatter,
        ChartKind::Line,
        ChartKind::Histogram,
        ChartKind::Box,
        ChartKind::SineDemo,
        ChartKind::Treemap,
        ChartKind::Sunburst,
        ChartKind::Funnel,
        ChartKind::Area,
    ];

    /// Command-line name.
    pub fn slug(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Scatter => "scatter",
            ChartKind::Line => "line",
            ChartKind::Histogram => "histogram",
            ChartKind::Box => "box",
            ChartKind::Treemap => "treemap",
            ChartKind::Sunburst => "sunburst",
            ChartKind::Funnel => "funnel",
            ChartKind::Area => "area",
            ChartKind::SineDemo => "sine",
        }
    }

    /// Name shown in the chart picker.
    pub fn title(&self) -> &'static str {
        match self {
            ChartKind::Bar => "Bar Chart",
            ChartKind::Pie => "Pie Chart",
            ChartKind::Scatter => "Scatter Plot",
            ChartKind::Line => "Line Chart",
            ChartKind::Histogram => "Histogram",
            ChartKind::Box => "Box Plot",
            ChartKind::Treemap => "Treemap",
            ChartKind::Sunburst => "Sunburst",
            ChartKind::Funnel => "Funnel Chart",
            ChartKind::Area => "Area Chart",
            ChartKind::SineDemo => "Sine Wave",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ChartKind {
    type Err = String;

    /// Accepts the slug or the picker title, case-insensitively
    /// (`pie`, `Pie Chart`, `pie-chart`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        ChartKind::ALL
            .iter()
            .copied()
            .find(|k| k.slug() == wanted || k.title().to_ascii_lowercase() == wanted)
            .or(match wanted.as_str() {
                "sine demo" | "sinedemo" => Some(ChartKind::SineDemo),
                _ => None,
            })
            .ok_or_else(|| {
                let names: Vec<&str> = ChartKind::ALL.iter().map(|k| k.slug()).collect();
                format!("unknown chart '{}'. Available: {}", s.trim(), names.join(", "))
            })
    }
}

/// Data handed to a render function.
#[derive(Debug, Clone, Copy)]
pub struct ChartInput<'a> {
    /// Rows after the sentiment filter, in source order.
    pub rows: &'a [&'a Row],
    /// Aggregated breakdown of `rows`.
    pub table: &'a [CategoryCount],
}

/// A Plotly figure: traces plus layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
}

impl Figure {
    fn new(trace: Value, title: &str) -> Self {
        Self {
            data: vec![trace],
            layout: json!({ "title": { "text": title } }),
        }
    }

    fn with_axes(mut self, x_title: &str, y_title: &str) -> Self {
        if let Some(layout) = self.layout.as_object_mut() {
            layout.insert("xaxis".to_string(), json!({ "title": { "text": x_title } }));
            layout.insert("yaxis".to_string(), json!({ "title": { "text": y_title } }));
        }
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.layout.pointer("/title/text").and_then(Value::as_str)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Standalone HTML page that draws the figure with plotly.js.
    pub fn to_html(&self) -> Result<String> {
        // "</" inside the JSON would end the script element early.
        let payload = serde_json::to_string(self)?.replace("</", "<\\/");
        let title = self.title().unwrap_or("Sentiment Dashboard");
        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{cdn}"></script>
</head>
<body>
<div id="chart" style="width:100%;height:90vh;"></div>
<script>
const figure = {payload};
Plotly.newPlot("chart", figure.data, figure.layout, {{responsive: true}});
</script>
</body>
</html>
"#,
            title = html_escape(title),
            cdn = PLOTLY_CDN,
            payload = payload,
        ))
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Signature shared by every chart renderer.
pub type RenderFn = fn(&ChartInput<'_>) -> Figure;

/// Lookup table from chart kind to renderer.
pub struct ChartRegistry {
    renderers: HashMap<ChartKind, RenderFn>,
}

impl ChartRegistry {
    /// Registry with no renderers.
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    /// Registry with a renderer for every [`ChartKind`].
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(ChartKind::Bar, render_bar);
        registry.register(ChartKind::Pie, render_pie);
        registry.register(ChartKind::Scatter, render_scatter);
        registry.register(ChartKind::Line, render_line);
        registry.register(ChartKind::Histogram, render_histogram);
        registry.register(ChartKind::Box, render_box);
        registry.register(ChartKind::Treemap, render_treemap);
        registry.register(ChartKind::Sunburst, render_sunburst);
        registry.register(ChartKind::Funnel, render_funnel);
        registry.register(ChartKind::Area, render_area);
        registry.register(ChartKind::SineDemo, render_sine);
        registry
    }

    /// Install `render` for `kind`, returning the renderer it replaced.
    pub fn register(&mut self, kind: ChartKind, render: RenderFn) -> Option<RenderFn> {
        self.renderers.insert(kind, render)
    }

    pub fn contains(&self, kind: ChartKind) -> bool {
        self.renderers.contains_key(&kind)
    }

    /// Registered kinds, in picker order.
    pub fn kinds(&self) -> Vec<ChartKind> {
        ChartKind::ALL
            .iter()
            .copied()
            .filter(|k| self.renderers.contains_key(k))
            .collect()
    }

    pub fn render(&self, kind: ChartKind, input: &ChartInput<'_>) -> Result<Figure> {
        let render = self
            .renderers
            .get(&kind)
            .ok_or_else(|| anyhow!("no renderer registered for chart '{}'", kind))?;
        Ok(render(input))
    }
}

impl Default for ChartRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn categories(table: &[CategoryCount]) -> Vec<&'static str> {
    table.iter().map(|c| c.category.as_str()).collect()
}

fn counts(table: &[CategoryCount]) -> Vec<usize> {
    table.iter().map(|c| c.count).collect()
}

fn percent_labels(table: &[CategoryCount]) -> Vec<String> {
    table.iter().map(|c| format!("{}%", c.percentage)).collect()
}

fn row_sentiments(rows: &[&Row]) -> Vec<&'static str> {
    rows.iter().map(|r| r.sentiment.as_str()).collect()
}

fn render_bar(input: &ChartInput<'_>) -> Figure {
    Figure::new(
        json!({
            "type": "bar",
            "x": categories(input.table),
            "y": counts(input.table),
            "text": percent_labels(input.table),
            "textposition": "outside",
        }),
        "Sentiment Distribution",
    )
    .with_axes("Sentiment", "Number of Records")
}

fn render_pie(input: &ChartInput<'_>) -> Figure {
    Figure::new(
        json!({
            "type": "pie",
            "labels": categories(input.table),
            "values": counts(input.table),
            "textinfo": "percent+label",
            "hovertemplate": "%{label}: %{value} (%{percent})<extra></extra>",
        }),
        "Sentiment Breakdown",
    )
}

fn render_scatter(input: &ChartInput<'_>) -> Figure {
    let ids: Vec<&str> = input.rows.iter().map(|r| r.id.as_str()).collect();
    Figure::new(
        json!({
            "type": "scatter",
            "mode": "markers",
            "x": ids,
            "y": row_sentiments(input.rows),
        }),
        "Sentiment by ID",
    )
    .with_axes("Record ID", "Sentiment")
}

fn render_line(input: &ChartInput<'_>) -> Figure {
    Figure::new(
        json!({
            "type": "scatter",
            "mode": "lines+markers+text",
            "x": categories(input.table),
            "y": counts(input.table),
            "text": percent_labels(input.table),
            "textposition": "top center",
        }),
        "Cumulative Sentiment Trends",
    )
}

fn render_histogram(input: &ChartInput<'_>) -> Figure {
    Figure::new(
        json!({
            "type": "histogram",
            "x": row_sentiments(input.rows),
        }),
        "Histogram of Sentiments",
    )
    .with_axes("Sentiment", "count")
}

fn render_box(input: &ChartInput<'_>) -> Figure {
    Figure::new(
        json!({
            "type": "box",
            "y": row_sentiments(input.rows),
        }),
        "Box Plot of Sentiments",
    )
}

fn hierarchy_trace(kind: &str, table: &[CategoryCount]) -> Value {
    let parents = vec![""; table.len()];
    let percentages: Vec<f64> = table.iter().map(|c| c.percentage).collect();
    json!({
        "type": kind,
        "labels": categories(table),
        "parents": parents,
        "values": counts(table),
        "customdata": percentages,
        "hovertemplate": "%{label}<br>Count: %{value}<br>Percentage: %{customdata}%<extra></extra>",
    })
}

fn render_treemap(input: &ChartInput<'_>) -> Figure {
    Figure::new(hierarchy_trace("treemap", input.table), "Treemap of Sentiments")
}

fn render_sunburst(input: &ChartInput<'_>) -> Figure {
    Figure::new(
        hierarchy_trace("sunburst", input.table),
        "Sunburst Chart of Sentiments",
    )
}

fn render_funnel(input: &ChartInput<'_>) -> Figure {
    Figure::new(
        json!({
            "type": "funnel",
            "x": counts(input.table),
            "y": categories(input.table),
            "text": percent_labels(input.table),
            "textposition": "inside",
        }),
        "Funnel Chart of Sentiments",
    )
}

fn render_area(input: &ChartInput<'_>) -> Figure {
    Figure::new(
        json!({
            "type": "scatter",
            "mode": "lines+text",
            "fill": "tozeroy",
            "x": categories(input.table),
            "y": counts(input.table),
            "text": percent_labels(input.table),
            "textposition": "top center",
        }),
        "Area Chart of Sentiments",
    )
    .with_axes("Sentiment", "Number of Records")
}

/// Number of samples in the sine demo.
pub const SINE_SAMPLES: usize = 100;

fn render_sine(_input: &ChartInput<'_>) -> Figure {
    let step = 10.0 / (SINE_SAMPLES - 1) as f64;
    let x: Vec<f64> = (0..SINE_SAMPLES).map(|i| i as f64 * step).collect();
    let y: Vec<f64> = x.iter().map(|v| v.sin()).collect();
    Figure::new(
        json!({
            "type": "scatter",
            "mode": "lines",
            "x": x,
            "y": y,
        }),
        "Sine Wave",
    )
    .with_axes("x", "y")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sentiment_dash_core::aggregate::aggregate;
    use sentiment_dash_core::models::Sentiment;

    fn sample_rows() -> Vec<Row> {
        [Sentiment::Positive, Sentiment::Positive, Sentiment::Negative]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                Row::new(
                    format!("a0{}", i),
                    *s,
                    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_builtin_covers_every_kind() {
        let registry = ChartRegistry::builtin();
        for kind in ChartKind::ALL {
            assert!(registry.contains(kind), "missing {}", kind);
        }
        assert_eq!(registry.kinds().len(), 11);
    }

    #[test]
    fn test_every_renderer_has_a_title() {
        let rows = sample_rows();
        let refs: Vec<&Row> = rows.iter().collect();
        let table = aggregate(refs.iter().copied());
        let input = ChartInput {
            rows: &refs,
            table: &table,
        };
        let registry = ChartRegistry::builtin();
        for kind in ChartKind::ALL {
            let figure = registry.render(kind, &input).unwrap();
            assert!(figure.title().is_some(), "{} has no title", kind);
            assert_eq!(figure.data.len(), 1);
        }
    }

    #[test]
    fn test_bar_uses_table_and_percent_labels() {
        let rows = sample_rows();
        let refs: Vec<&Row> = rows.iter().collect();
        let table = aggregate(refs.iter().copied());
        let figure = render_bar(&ChartInput {
            rows: &refs,
            table: &table,
        });
        let trace = &figure.data[0];
        assert_eq!(trace["type"], "bar");
        assert_eq!(trace["x"], json!(["Positive", "Negative"]));
        assert_eq!(trace["y"], json!([2, 1]));
        assert_eq!(trace["text"], json!(["66.67%", "33.33%"]));
        assert_eq!(figure.title(), Some("Sentiment Distribution"));
    }

    #[test]
    fn test_scatter_uses_rows() {
        let rows = sample_rows();
        let refs: Vec<&Row> = rows.iter().collect();
        let figure = render_scatter(&ChartInput {
            rows: &refs,
            table: &[],
        });
        assert_eq!(figure.data[0]["x"], json!(["a00", "a01", "a02"]));
        assert_eq!(
            figure.data[0]["y"],
            json!(["Positive", "Positive", "Negative"])
        );
    }

    #[test]
    fn test_sine_demo_samples() {
        let figure = render_sine(&ChartInput {
            rows: &[],
            table: &[],
        });
        let x = figure.data[0]["x"].as_array().unwrap();
        let y = figure.data[0]["y"].as_array().unwrap();
        assert_eq!(x.len(), SINE_SAMPLES);
        assert_eq!(y.len(), SINE_SAMPLES);
        assert!((x[SINE_SAMPLES - 1].as_f64().unwrap() - 10.0).abs() < 1e-9);
        assert!(y[0].as_f64().unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_register_replaces_renderer() {
        fn custom(_: &ChartInput<'_>) -> Figure {
            Figure::new(json!({ "type": "bar" }), "Custom")
        }
        let mut registry = ChartRegistry::empty();
        assert!(registry
            .render(ChartKind::Bar, &ChartInput { rows: &[], table: &[] })
            .is_err());
        assert!(registry.register(ChartKind::Bar, custom).is_none());
        assert!(registry.register(ChartKind::Bar, custom).is_some());
        let figure = registry
            .render(ChartKind::Bar, &ChartInput { rows: &[], table: &[] })
            .unwrap();
        assert_eq!(figure.title(), Some("Custom"));
        assert_eq!(registry.kinds(), vec![ChartKind::Bar]);
    }

    #[test]
    fn test_parse_chart_kind() {
        assert_eq!("pie".parse::<ChartKind>().unwrap(), ChartKind::Pie);
        assert_eq!("Funnel Chart".parse::<ChartKind>().unwrap(), ChartKind::Funnel);
        assert_eq!("box-plot".parse::<ChartKind>().unwrap(), ChartKind::Box);
        assert_eq!("Sine Wave".parse::<ChartKind>().unwrap(), ChartKind::SineDemo);
        assert_eq!("sine".parse::<ChartKind>().unwrap(), ChartKind::SineDemo);
        assert!("radar".parse::<ChartKind>().is_err());
    }

    #[test]
    fn test_html_embeds_figure() {
        let figure = Figure::new(json!({ "type": "bar", "name": "</script>" }), "A & B");
        let html = figure.to_html().unwrap();
        assert!(html.contains(PLOTLY_CDN));
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(!html.contains("\"</script>\""));
        assert!(html.contains("Plotly.newPlot"));
    }
}
