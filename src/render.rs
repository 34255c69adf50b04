// 🖼️ Report Renderer - standalone HTML page with inline SVG charts
//
// Four charts: price trends for every entity, risk and expected ROI of the
// plan against the top-growth peers (horizontal grouped bars), and future
// value per horizon. Everything is built as plain SVG strings.

use crate::error::Result;
use crate::loader::PriceTable;
use crate::projection::ProjectionResult;
use crate::report::{ComparisonBar, PeerComparison, PlanReport};
use chrono::NaiveDate;
use std::path::Path;

const WIDTH: f64 = 720.0;
const HEIGHT: f64 = 360.0;
const PADDING: f64 = 40.0;
const LABEL_WIDTH: f64 = 120.0;
const PLAN_COLOR: &str = "#1f4e9c";
const PEER_COLOR: &str = "#2e9b4f";
const GRID_COLOR: &str = "#dddddd";
const PALETTE: &[&str] = &[
    "#348dc1", "#ff9933", "#4fa487", "#af4b64", "#8c6bb1", "#e3b505", "#5d6d7e", "#d35400",
    "#16a085", "#c0392b",
];

/// Anything that can turn the pipeline's views into a document.
pub trait ReportRenderer {
    fn render(&self, table: &PriceTable, report: &PlanReport) -> Result<String>;

    /// Render and write to `path`.
    fn render_to_file(&self, table: &PriceTable, report: &PlanReport, path: &Path) -> Result<()> {
        let document = self.render(table, report)?;
        std::fs::write(path, document)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SvgReportRenderer {
    pub title: String,
    /// Unit shown on price and value axes, e.g. "INR".
    pub currency: String,
}

impl Default for SvgReportRenderer {
    fn default() -> Self {
        SvgReportRenderer {
            title: "Mutual Fund Plan".to_string(),
            currency: "INR".to_string(),
        }
    }
}

impl ReportRenderer for SvgReportRenderer {
    fn render(&self, table: &PriceTable, report: &PlanReport) -> Result<String> {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
        html.push_str(&format!("<title>{}</title>", escape(&self.title)));
        html.push_str(
            "<style>body{font-family:Arial,sans-serif;margin:24px;color:#333}\
             .plot{margin:24px 0}.plot-title{font-weight:bold;margin-bottom:6px}\
             table{border-collapse:collapse}td,th{padding:2px 10px;text-align:right}\
             th:first-child,td:first-child{text-align:left}</style></head><body>",
        );
        html.push_str(&format!("<h1>{}</h1>", escape(&self.title)));
        html.push_str(&format!("<p>{}</p>", escape(&report.summary())));

        if let Some((start, end)) = table.date_range() {
            html.push_str(&format!(
                "<p>{} - {}, {} entities</p>",
                start.format("%e %b, %Y").to_string().trim(),
                end.format("%e %b, %Y").to_string().trim(),
                table.entities().len()
            ));
        }

        html.push_str(&self.price_trends(table));
        html.push_str(&allocation_table(report));
        html.push_str(&self.risk_comparison(&report.comparison));
        html.push_str(&self.roi_comparison(&report.comparison));
        if let Some(projection) = &report.projection {
            html.push_str(&self.projection(projection));
        }

        html.push_str("</body></html>");
        Ok(html)
    }
}

impl SvgReportRenderer {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// One translucent line per entity over the full date range.
    pub fn price_trends(&self, table: &PriceTable) -> String {
        let title = format!("Closing Price Trends ({})", self.currency);
        let dates = table.dates();
        let observed: Vec<f64> = table
            .columns()
            .flat_map(|(_, series)| series.iter().flatten().copied())
            .collect();

        let Some((min_v, max_v)) = extent(&observed, false) else {
            return empty_plot(&title);
        };

        let xs = x_positions(dates.len(), PADDING, WIDTH - PADDING - LABEL_WIDTH);
        let mut svg = svg_header();
        draw_value_grid(&mut svg, min_v, max_v, PADDING, WIDTH - PADDING - LABEL_WIDTH);

        for (idx, (entity, series)) in table.columns().enumerate() {
            let color = PALETTE[idx % PALETTE.len()];

            // Leading gaps break the line; no point is drawn for them
            let points: Vec<(f64, f64)> = series
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|price| (xs[i], scale_y(price, min_v, max_v))))
                .collect();
            svg.push_str(&polyline(&points, color, 0.5));

            if idx < 20 {
                let y = PADDING + idx as f64 * 12.0;
                svg.push_str(&format!(
                    r##"<rect x="{x:.2}" y="{y:.2}" width="8" height="8" fill="{color}" /><text x="{tx:.2}" y="{ty:.2}">{label}</text>"##,
                    x = WIDTH - LABEL_WIDTH,
                    y = y,
                    tx = WIDTH - LABEL_WIDTH + 12.0,
                    ty = y + 8.0,
                    color = color,
                    label = escape(entity)
                ));
            }
        }

        add_date_axis(&mut svg, dates, &xs);
        svg.push_str(svg_footer());
        wrap_plot(&title, svg)
    }

    pub fn risk_comparison(&self, comparison: &PeerComparison) -> String {
        grouped_bar_chart(
            "Risk Comparison: Mutual Fund vs Growth Rate Companies",
            "Volatility (Standard Deviation)",
            &comparison.plan_risk,
            &comparison.peer_risk,
        )
    }

    pub fn roi_comparison(&self, comparison: &PeerComparison) -> String {
        grouped_bar_chart(
            "Expected ROI Comparison: Mutual Fund vs Growth Rate Companies",
            "Expected ROI (%)",
            &comparison.plan_roi,
            &comparison.peer_roi,
        )
    }

    /// Future value per horizon, markers on each point.
    pub fn projection(&self, projection: &ProjectionResult) -> String {
        let title = format!(
            "Expected Value of Investments of {} {:.0} Per Month",
            self.currency, projection.contribution
        );
        let points = projection.labelled();
        let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();

        let Some((min_v, max_v)) = extent(&values, true) else {
            return empty_plot(&title);
        };

        let xs = x_positions(points.len(), PADDING + LABEL_WIDTH / 2.0, WIDTH - PADDING);
        let mut svg = svg_header();
        draw_value_grid(&mut svg, min_v, max_v, PADDING + LABEL_WIDTH / 2.0, WIDTH - PADDING);

        let coords: Vec<(f64, f64)> = xs
            .iter()
            .zip(&values)
            .map(|(x, v)| (*x, scale_y(*v, min_v, max_v)))
            .collect();
        svg.push_str(&polyline(&coords, PLAN_COLOR, 1.0));

        for ((x, y), (label, value)) in coords.iter().zip(&points) {
            svg.push_str(&format!(
                r##"<circle cx="{x:.2}" cy="{y:.2}" r="4" fill="{color}"><title>{label}: {value:.2}</title></circle>"##,
                x = x,
                y = y,
                color = PLAN_COLOR,
                label = escape(label),
                value = value
            ));
            svg.push_str(&format!(
                r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{label}</text>"#,
                x = x,
                y = HEIGHT - PADDING + 16.0,
                label = escape(label)
            ));
        }

        svg.push_str(svg_footer());
        wrap_plot(&title, svg)
    }
}

// ============================================================================
// CHART BUILDING BLOCKS
// ============================================================================

/// Horizontal bars, two per row: plan on top, peers below.
///
/// Rows are the plan entities in order, then peers not already listed.
fn grouped_bar_chart(
    title: &str,
    axis_label: &str,
    plan: &[ComparisonBar],
    peers: &[ComparisonBar],
) -> String {
    let mut rows: Vec<&str> = plan.iter().map(|b| b.entity.as_str()).collect();
    for bar in peers {
        if !rows.contains(&bar.entity.as_str()) {
            rows.push(bar.entity.as_str());
        }
    }

    let values: Vec<f64> = plan.iter().chain(peers).map(|b| b.value).collect();
    let Some((min_v, max_v)) = extent(&values, true) else {
        return empty_plot(title);
    };

    let left = PADDING + LABEL_WIDTH;
    let right = WIDTH - PADDING;
    let top = PADDING;
    let bottom = HEIGHT - PADDING;
    let row_height = (bottom - top) / rows.len() as f64;
    let bar_height = row_height * 0.4;
    let scale_x = |v: f64| left + (v - min_v) / (max_v - min_v) * (right - left);
    let zero_x = scale_x(0.0);

    let mut svg = svg_header();

    for (i, entity) in rows.iter().enumerate() {
        let row_top = top + i as f64 * row_height;
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end">{label}</text>"#,
            x = left - 6.0,
            y = row_top + row_height / 2.0 + 3.0,
            label = escape(entity)
        ));

        let groups = [(plan, PLAN_COLOR, 1.0, 0.1), (peers, PEER_COLOR, 0.7, 0.5)];
        for (bars, color, opacity, offset) in groups {
            if let Some(bar) = bars.iter().find(|b| b.entity == *entity) {
                let x_end = scale_x(bar.value);
                let (x, w) = if x_end >= zero_x {
                    (zero_x, x_end - zero_x)
                } else {
                    (x_end, zero_x - x_end)
                };
                svg.push_str(&format!(
                    r##"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="{color}" fill-opacity="{opacity}"><title>{label}: {value:.2}</title></rect>"##,
                    x = x,
                    y = row_top + row_height * offset,
                    w = w,
                    h = bar_height,
                    color = color,
                    opacity = opacity,
                    label = escape(entity),
                    value = bar.value
                ));
            }
        }
    }

    // Zero line and value axis
    svg.push_str(&format!(
        r##"<line x1="{x:.2}" y1="{y1:.2}" x2="{x:.2}" y2="{y2:.2}" stroke="#000" stroke-width="1" />"##,
        x = zero_x,
        y1 = top,
        y2 = bottom
    ));
    for tick in ticks(min_v, max_v, 5) {
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{label}</text>"#,
            x = scale_x(tick),
            y = bottom + 14.0,
            label = format_number(tick)
        ));
    }
    svg.push_str(&format!(
        r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{label}</text>"#,
        x = (left + right) / 2.0,
        y = bottom + 30.0,
        label = escape(axis_label)
    ));

    draw_legend(&mut svg, &[("Mutual Fund Companies", PLAN_COLOR), ("Growth Rate Companies", PEER_COLOR)]);

    svg.push_str(svg_footer());
    wrap_plot(title, svg)
}

fn allocation_table(report: &PlanReport) -> String {
    let Some(plan) = report.plan() else {
        return "<p><em>No entity passed both thresholds.</em></p>".to_string();
    };

    let mut html = String::from(
        "<div class=\"plot\"><div class=\"plot-title\">Allocation</div><table><thead><tr>\
         <th>Entity</th><th>Weight</th><th>ROI (%)</th><th>Volatility</th></tr></thead><tbody>",
    );
    for (entity, weight) in plan.ranked() {
        let (roi, volatility) = report
            .metrics
            .get(&entity)
            .map(|m| (m.roi, m.volatility))
            .unwrap_or((f64::NAN, f64::NAN));
        html.push_str(&format!(
            "<tr><td>{}</td><td>{:.2}%</td><td>{:.2}</td><td>{:.2}</td></tr>",
            escape(&entity),
            weight * 100.0,
            roi,
            volatility
        ));
    }
    html.push_str("</tbody></table></div>");
    html
}

fn svg_header() -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}"><style>text{{font-family:Arial,sans-serif;font-size:10px;fill:#666}}</style>"#,
        w = WIDTH,
        h = HEIGHT
    )
}

fn svg_footer() -> &'static str {
    "</svg>"
}

fn wrap_plot(title: &str, svg_body: String) -> String {
    format!(
        r#"<div class="plot"><div class="plot-title">{title}</div>{svg}</div>"#,
        title = escape(title),
        svg = svg_body
    )
}

fn empty_plot(title: &str) -> String {
    let mut svg = svg_header();
    svg.push_str(&format!(
        r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">No data</text>"#,
        x = WIDTH / 2.0,
        y = HEIGHT / 2.0
    ));
    svg.push_str(svg_footer());
    wrap_plot(title, svg)
}

/// Min/max of finite values, widened when flat. `include_zero` pins the
/// axis at zero for bar and value charts.
fn extent(values: &[f64], include_zero: bool) -> Option<(f64, f64)> {
    let mut min_v = f64::INFINITY;
    let mut max_v = f64::NEG_INFINITY;

    for v in values.iter().copied().filter(|v| v.is_finite()) {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }

    if !min_v.is_finite() || !max_v.is_finite() {
        return None;
    }

    if include_zero {
        min_v = min_v.min(0.0);
        max_v = max_v.max(0.0);
    }

    if min_v == max_v {
        let adjust = if min_v == 0.0 { 1.0 } else { min_v.abs() * 0.1 };
        min_v -= adjust;
        max_v += adjust;
    }

    Some((min_v, max_v))
}

fn scale_y(value: f64, min_v: f64, max_v: f64) -> f64 {
    let inner_height = HEIGHT - 2.0 * PADDING;
    let norm = (value - min_v) / (max_v - min_v);
    PADDING + (1.0 - norm) * inner_height
}

fn x_positions(len: usize, left: f64, right: f64) -> Vec<f64> {
    match len {
        0 => Vec::new(),
        1 => vec![(left + right) / 2.0],
        _ => (0..len)
            .map(|i| left + (right - left) * (i as f64 / (len - 1) as f64))
            .collect(),
    }
}

/// `count + 1` evenly spaced values from min to max.
fn ticks(min_v: f64, max_v: f64, count: usize) -> Vec<f64> {
    (0..=count)
        .map(|i| min_v + (max_v - min_v) * i as f64 / count as f64)
        .collect()
}

fn polyline(points: &[(f64, f64)], stroke: &str, opacity: f64) -> String {
    if points.is_empty() {
        return String::new();
    }

    let coords: String = points
        .iter()
        .map(|(x, y)| format!("{:.2},{:.2}", x, y))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        r#"<polyline fill="none" stroke="{stroke}" stroke-width="1.5" stroke-opacity="{opacity}" points="{coords}" />"#,
        stroke = stroke,
        opacity = opacity,
        coords = coords
    )
}

fn draw_value_grid(svg: &mut String, min_v: f64, max_v: f64, left: f64, right: f64) {
    for tick in ticks(min_v, max_v, 4) {
        let y = scale_y(tick, min_v, max_v);
        svg.push_str(&format!(
            r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="{grid}" stroke-width="0.5" /><text x="{tx:.2}" y="{ty:.2}" text-anchor="end">{label}</text>"##,
            x1 = left,
            x2 = right,
            y = y,
            grid = GRID_COLOR,
            tx = left - 4.0,
            ty = y + 3.0,
            label = format_number(tick)
        ));
    }
}

/// Roughly six date labels spread across the axis.
fn add_date_axis(svg: &mut String, dates: &[NaiveDate], xs: &[f64]) {
    if dates.is_empty() || xs.is_empty() {
        return;
    }

    let axis_y = HEIGHT - PADDING + 5.0;
    let step = (dates.len() / 6).max(1);

    svg.push_str(&format!(
        r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="#000" stroke-width="1" />"##,
        x1 = xs[0],
        x2 = xs[xs.len() - 1],
        y = axis_y
    ));

    for (date, x) in dates.iter().zip(xs).step_by(step) {
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" transform="rotate(45 {x:.2} {y:.2})">{label}</text>"#,
            x = x,
            y = axis_y + 14.0,
            label = date.format("%Y-%m-%d")
        ));
    }
}

fn draw_legend(svg: &mut String, entries: &[(&str, &str)]) {
    let mut x = PADDING + LABEL_WIDTH;
    let y = PADDING / 2.0;
    for (label, color) in entries {
        svg.push_str(&format!(
            r##"<rect x="{x:.2}" y="{ry:.2}" width="10" height="10" fill="{color}" /><text x="{tx:.2}" y="{ty:.2}">{label}</text>"##,
            x = x,
            ry = y - 8.0,
            color = color,
            tx = x + 14.0,
            ty = y,
            label = escape(label)
        ));
        x += 170.0;
    }
}

fn format_number(value: f64) -> String {
    if value.abs() >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value.abs() >= 10_000.0 {
        format!("{:.0}K", value / 1_000.0)
    } else if value.abs() >= 100.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
