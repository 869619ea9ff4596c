use crate::stats::{BoxStats, CorrelationMatrix, Estimate, Histogram, PieSlice};
use crate::theme::{diverging_color, Theme};
use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::ops::Range;

pub type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Longest category label drawn on an axis before it is cut short
const MAX_TICK_LABEL: usize = 14;

/// Most category ticks labelled on one axis
const MAX_CATEGORY_TICKS: usize = 40;

/// Largest canvas one figure may allocate, in pixels
pub const MAX_CANVAS_PIXELS: usize = 25_000_000;

/// RGB pixel buffer that one figure is drawn into
pub struct Canvas {
    buffer: Vec<u8>,
    width: u32,
    height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot create a {}x{} canvas", width, height);
        }
        let pixels = (width as usize)
            .checked_mul(height as usize)
            .filter(|&n| n <= MAX_CANVAS_PIXELS)
            .with_context(|| {
                format!(
                    "A {}x{} canvas exceeds the {} pixel limit",
                    width, height, MAX_CANVAS_PIXELS
                )
            })?;
        Ok(Canvas {
            buffer: vec![0u8; pixels * 3],
            width,
            height,
        })
    }

    /// Clear to white, run the drawing closure, then flush to the buffer
    pub fn draw<F>(&mut self, draw: F) -> Result<()>
    where
        F: FnOnce(&Area<'_>) -> Result<()>,
    {
        let root = BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height))
            .into_drawing_area();
        root.fill(&WHITE).context("Failed to fill background")?;
        draw(&root)?;
        root.present().context("Failed to present drawing")?;
        Ok(())
    }

    /// Finalize and encode the canvas as PNG
    pub fn render(self) -> Result<Vec<u8>> {
        let mut png_bytes = Vec::new();
        {
            let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
            encoder
                .write_image(
                    &self.buffer,
                    self.width,
                    self.height,
                    image::ColorType::Rgb8,
                )
                .context("Failed to encode PNG")?;
        }

        Ok(png_bytes)
    }
}

/// Optional caption and axis descriptions of one chart
#[derive(Debug, Clone, Copy, Default)]
pub struct Labels<'a> {
    pub title: Option<&'a str>,
    pub x: Option<&'a str>,
    pub y: Option<&'a str>,
}

impl<'a> Labels<'a> {
    pub fn new(title: &'a str, x: &'a str, y: &'a str) -> Self {
        Self {
            title: Some(title),
            x: Some(x),
            y: Some(y),
        }
    }
}

/// Axis range with 5% padding; a degenerate range is widened by one unit
fn padded(min: f64, max: f64) -> Range<f64> {
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding)..(max + padding)
    }
}

fn category_range(n: usize) -> Range<f64> {
    -0.5..(n as f64 - 0.5)
}

/// Label for a tick on a category axis; blank between categories
fn category_label(labels: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels
        .get(idx as usize)
        .map(|l| shorten(l))
        .unwrap_or_default()
}

fn shorten(label: &str) -> String {
    if label.chars().count() <= MAX_TICK_LABEL {
        label.to_string()
    } else {
        let head: String = label.chars().take(MAX_TICK_LABEL - 1).collect();
        format!("{}…", head)
    }
}

fn chart_builder<'a, 'b>(
    area: &'a Area<'b>,
    labels: &Labels<'_>,
    theme: &Theme,
) -> ChartBuilder<'a, 'b, BitMapBackend<'b>> {
    let mut builder = ChartBuilder::on(area);
    builder.margin(12).x_label_area_size(50).y_label_area_size(60);
    if let Some(title) = labels.title {
        builder.caption(title, theme.title_style());
    }
    builder
}

/// Histogram bars with a density curve scaled to counts
pub fn draw_histogram(
    area: &Area<'_>,
    labels: Labels<'_>,
    hist: &Histogram,
    density: &[(f64, f64)],
    theme: &Theme,
) -> Result<()> {
    let (Some(&x_min), Some(&x_max)) = (hist.edges.first(), hist.edges.last()) else {
        anyhow::bail!("Cannot draw a histogram with no bins");
    };
    let y_max = (hist.max_count().max(1) as f64) * 1.1;

    let mut chart = chart_builder(area, &labels, theme)
        .build_cartesian_2d(x_min..x_max, 0f64..y_max)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .light_line_style(&theme.grid)
        .x_desc(labels.x.unwrap_or(""))
        .y_desc(labels.y.unwrap_or("Count"))
        .label_style(theme.label_style())
        .draw()
        .context("Failed to draw mesh")?;

    let color = theme.primary();
    chart
        .draw_series(hist.bins().map(|(lo, hi, count)| {
            Rectangle::new([(lo, 0.0), (hi, count as f64)], color.mix(0.75).filled())
        }))
        .context("Failed to draw bins")?;
    chart
        .draw_series(hist.bins().map(|(lo, hi, count)| {
            Rectangle::new([(lo, 0.0), (hi, count as f64)], WHITE.stroke_width(1))
        }))
        .context("Failed to draw bin outlines")?;

    if !density.is_empty() {
        let scale = hist.total() as f64 * hist.bin_width();
        chart
            .draw_series(LineSeries::new(
                density.iter().map(|&(x, d)| (x, d * scale)),
                color.stroke_width(3),
            ))
            .context("Failed to draw density curve")?;
    }

    Ok(())
}

/// One bar per category, coloured from the palette
pub fn draw_count_bars(
    area: &Area<'_>,
    labels: Labels<'_>,
    counts: &[(String, usize)],
    theme: &Theme,
) -> Result<()> {
    if counts.is_empty() {
        anyhow::bail!("Cannot create bar chart with no data");
    }
    let categories: Vec<String> = counts.iter().map(|(c, _)| c.clone()).collect();
    let y_max = counts.iter().map(|(_, c)| *c).max().unwrap_or(1).max(1) as f64 * 1.1;

    let mut chart = chart_builder(area, &labels, theme)
        .build_cartesian_2d(category_range(categories.len()), 0f64..y_max)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .light_line_style(&theme.grid)
        .x_labels(categories.len().min(MAX_CATEGORY_TICKS))
        .x_label_formatter(&|x| category_label(&categories, *x))
        .x_desc(labels.x.unwrap_or(""))
        .y_desc(labels.y.unwrap_or("count"))
        .label_style(theme.label_style())
        .draw()
        .context("Failed to draw mesh")?;

    chart
        .draw_series(counts.iter().enumerate().map(|(i, (_, count))| {
            let x = i as f64;
            Rectangle::new(
                [(x - 0.4, 0.0), (x + 0.4, *count as f64)],
                theme.color(i).filled(),
            )
        }))
        .context("Failed to draw bars")?;

    Ok(())
}

/// Pie with percentage labels on each slice
pub fn draw_pie(area: &Area<'_>, title: &str, slices: &[PieSlice], theme: &Theme) -> Result<()> {
    if slices.is_empty() {
        anyhow::bail!("Cannot draw a pie chart with no slices");
    }
    let area = area
        .titled(title, theme.title_style())
        .context("Failed to draw title")?;

    let (w, h) = area.dim_in_pixel();
    let center = (w as i32 / 2, h as i32 / 2);
    let radius = w.min(h) as f64 * 0.36;

    let sizes: Vec<f64> = slices.iter().map(|s| s.count as f64).collect();
    let colors: Vec<RGBColor> = (0..slices.len()).map(|i| theme.color(i)).collect();
    let names: Vec<String> = slices.iter().map(|s| s.label.clone()).collect();

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &names);
    pie.label_style(theme.label_style());
    pie.percentages(("sans-serif", 18.0).into_font().color(&WHITE));
    area.draw(&pie).context("Failed to draw pie")?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Orientation {
    Horizontal,
    Vertical,
}

/// Box, whiskers, caps, median and outliers of one box at `center` on the
/// category axis.
fn draw_box(
    chart: &mut ChartContext<'_, BitMapBackend<'_>, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    stats: &BoxStats,
    center: f64,
    orientation: Orientation,
    color: RGBColor,
) -> Result<()> {
    let pt = |value: f64, offset: f64| match orientation {
        Orientation::Horizontal => (value, center + offset),
        Orientation::Vertical => (center + offset, value),
    };
    let edge = RGBColor(63, 63, 63);
    let half = 0.4;
    let cap = 0.2;

    chart
        .draw_series(std::iter::once(Rectangle::new(
            [pt(stats.q1, -half), pt(stats.q3, half)],
            color.mix(0.85).filled(),
        )))
        .context("Failed to draw box")?;
    chart
        .draw_series(std::iter::once(Rectangle::new(
            [pt(stats.q1, -half), pt(stats.q3, half)],
            edge.stroke_width(2),
        )))
        .context("Failed to draw box outline")?;

    let lines = vec![
        vec![pt(stats.median, -half), pt(stats.median, half)],
        vec![pt(stats.lower_whisker, 0.0), pt(stats.q1, 0.0)],
        vec![pt(stats.q3, 0.0), pt(stats.upper_whisker, 0.0)],
        vec![pt(stats.lower_whisker, -cap), pt(stats.lower_whisker, cap)],
        vec![pt(stats.upper_whisker, -cap), pt(stats.upper_whisker, cap)],
    ];
    chart
        .draw_series(
            lines
                .into_iter()
                .map(|line| PathElement::new(line, edge.stroke_width(2))),
        )
        .context("Failed to draw whiskers")?;

    chart
        .draw_series(
            stats
                .outliers
                .iter()
                .map(|&v| Circle::new(pt(v, 0.0), 4, edge.stroke_width(1))),
        )
        .context("Failed to draw outliers")?;

    Ok(())
}

/// Single horizontal box for one numeric column
pub fn draw_box_horizontal(
    area: &Area<'_>,
    labels: Labels<'_>,
    stats: &BoxStats,
    theme: &Theme,
) -> Result<()> {
    let (lo, hi) = stats.extent();
    let mut chart = chart_builder(area, &labels, theme)
        .build_cartesian_2d(padded(lo, hi), -1f64..1f64)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .light_line_style(&theme.grid)
        .y_label_formatter(&|_| String::new())
        .x_desc(labels.x.unwrap_or(""))
        .label_style(theme.label_style())
        .draw()
        .context("Failed to draw mesh")?;

    draw_box(&mut chart, stats, 0.0, Orientation::Horizontal, theme.primary())
}

/// Vertical boxes, one per category
pub fn draw_grouped_boxes(
    area: &Area<'_>,
    labels: Labels<'_>,
    groups: &[(String, BoxStats)],
    theme: &Theme,
) -> Result<()> {
    if groups.is_empty() {
        anyhow::bail!("Cannot draw box plot with no groups");
    }
    let categories: Vec<String> = groups.iter().map(|(c, _)| c.clone()).collect();
    let lo = groups
        .iter()
        .map(|(_, s)| s.extent().0)
        .fold(f64::INFINITY, f64::min);
    let hi = groups
        .iter()
        .map(|(_, s)| s.extent().1)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut chart = chart_builder(area, &labels, theme)
        .build_cartesian_2d(category_range(categories.len()), padded(lo, hi))
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .light_line_style(&theme.grid)
        .x_labels(categories.len().min(MAX_CATEGORY_TICKS))
        .x_label_formatter(&|x| category_label(&categories, *x))
        .x_desc(labels.x.unwrap_or(""))
        .y_desc(labels.y.unwrap_or(""))
        .label_style(theme.label_style())
        .draw()
        .context("Failed to draw mesh")?;

    for (i, (_, stats)) in groups.iter().enumerate() {
        draw_box(&mut chart, stats, i as f64, Orientation::Vertical, theme.color(i))?;
    }
    Ok(())
}

/// Mean line with a shaded confidence band
pub fn draw_line(
    area: &Area<'_>,
    labels: Labels<'_>,
    points: &[(f64, Estimate)],
    theme: &Theme,
) -> Result<()> {
    if points.is_empty() {
        anyhow::bail!("Cannot draw a line with no points");
    }
    let x_min = points.iter().map(|(x, _)| *x).fold(f64::INFINITY, f64::min);
    let x_max = points.iter().map(|(x, _)| *x).fold(f64::NEG_INFINITY, f64::max);
    let y_min = points.iter().map(|(_, e)| e.low).fold(f64::INFINITY, f64::min);
    let y_max = points.iter().map(|(_, e)| e.high).fold(f64::NEG_INFINITY, f64::max);

    let mut chart = chart_builder(area, &labels, theme)
        .build_cartesian_2d(padded(x_min, x_max), padded(y_min, y_max))
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .light_line_style(&theme.grid)
        .x_desc(labels.x.unwrap_or(""))
        .y_desc(labels.y.unwrap_or(""))
        .label_style(theme.label_style())
        .draw()
        .context("Failed to draw mesh")?;

    let color = theme.primary();
    if points.len() > 1 {
        let band: Vec<(f64, f64)> = points
            .iter()
            .map(|(x, e)| (*x, e.high))
            .chain(points.iter().rev().map(|(x, e)| (*x, e.low)))
            .collect();
        chart
            .draw_series(std::iter::once(Polygon::new(band, color.mix(0.2).filled())))
            .context("Failed to draw confidence band")?;
        chart
            .draw_series(LineSeries::new(
                points.iter().map(|(x, e)| (*x, e.mean)),
                color.stroke_width(2),
            ))
            .context("Failed to draw line series")?;
    } else {
        chart
            .draw_series(
                points
                    .iter()
                    .map(|(x, e)| Circle::new((*x, e.mean), 4, color.filled())),
            )
            .context("Failed to draw point")?;
    }

    Ok(())
}

/// Scatter of paired values
pub fn draw_scatter(
    area: &Area<'_>,
    labels: Labels<'_>,
    points: &[(f64, f64)],
    point_size: i32,
    theme: &Theme,
) -> Result<()> {
    if points.is_empty() {
        anyhow::bail!("Cannot create scatter plot with no data points");
    }
    let x_min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let x_max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y_min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let y_max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let mut chart = chart_builder(area, &labels, theme)
        .build_cartesian_2d(padded(x_min, x_max), padded(y_min, y_max))
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .light_line_style(&theme.grid)
        .x_desc(labels.x.unwrap_or(""))
        .y_desc(labels.y.unwrap_or(""))
        .label_style(theme.label_style())
        .draw()
        .context("Failed to draw mesh")?;

    let color = theme.primary();
    chart
        .draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), point_size, color.mix(0.8).filled())),
        )
        .context("Failed to draw point series")?;

    Ok(())
}

/// Category means with 95% interval error bars
pub fn draw_bar_estimates(
    area: &Area<'_>,
    labels: Labels<'_>,
    groups: &[(String, Estimate)],
    theme: &Theme,
) -> Result<()> {
    if groups.is_empty() {
        anyhow::bail!("Cannot create bar chart with no data");
    }
    let categories: Vec<String> = groups.iter().map(|(c, _)| c.clone()).collect();
    let y_min = groups.iter().map(|(_, e)| e.low).fold(0.0, f64::min);
    let y_max = groups.iter().map(|(_, e)| e.high).fold(0.0, f64::max);

    let mut chart = chart_builder(area, &labels, theme)
        .build_cartesian_2d(category_range(categories.len()), padded(y_min, y_max))
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .light_line_style(&theme.grid)
        .x_labels(categories.len().min(MAX_CATEGORY_TICKS))
        .x_label_formatter(&|x| category_label(&categories, *x))
        .x_desc(labels.x.unwrap_or(""))
        .y_desc(labels.y.unwrap_or(""))
        .label_style(theme.label_style())
        .draw()
        .context("Failed to draw mesh")?;

    chart
        .draw_series(groups.iter().enumerate().map(|(i, (_, e))| {
            let x = i as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, e.mean)], theme.color(i).filled())
        }))
        .context("Failed to draw bars")?;

    let edge = RGBColor(63, 63, 63);
    chart
        .draw_series(groups.iter().enumerate().flat_map(|(i, (_, e))| {
            let x = i as f64;
            vec![
                PathElement::new(vec![(x, e.low), (x, e.high)], edge.stroke_width(2)),
                PathElement::new(vec![(x - 0.1, e.low), (x + 0.1, e.low)], edge.stroke_width(2)),
                PathElement::new(vec![(x - 0.1, e.high), (x + 0.1, e.high)], edge.stroke_width(2)),
            ]
        }))
        .context("Failed to draw error bars")?;

    Ok(())
}

/// n x n grid: histograms on the diagonal, scatter plots elsewhere
pub fn draw_pair_grid(
    area: &Area<'_>,
    columns: &[(String, Vec<Option<f64>>)],
    theme: &Theme,
) -> Result<()> {
    let n = columns.len();
    if n == 0 {
        anyhow::bail!("Cannot draw a pair grid with no columns");
    }

    for (idx, cell) in area.split_evenly((n, n)).iter().enumerate() {
        let (row, col) = (idx / n, idx % n);
        let (y_name, y_values) = &columns[row];
        let (x_name, x_values) = &columns[col];
        let labels = Labels {
            title: None,
            x: (row == n - 1).then_some(x_name.as_str()),
            y: (col == 0).then_some(y_name.as_str()),
        };

        if row == col {
            let values = crate::stats::finite(x_values);
            if let Some(hist) = crate::stats::histogram(&values) {
                draw_histogram(cell, Labels { y: labels.y.or(Some("")), ..labels }, &hist, &[], theme)?;
            }
        } else {
            let points = crate::stats::paired(x_values, y_values);
            if !points.is_empty() {
                draw_scatter(cell, labels, &points, 2, theme)?;
            }
        }
    }
    Ok(())
}

/// Lower-triangle correlation heatmap with annotations and a colour bar
pub fn draw_heatmap(
    area: &Area<'_>,
    title: &str,
    matrix: &CorrelationMatrix,
    theme: &Theme,
) -> Result<()> {
    let n = matrix.len();
    if n == 0 {
        anyhow::bail!("Cannot draw a heatmap with no columns");
    }

    let (width, _) = area.dim_in_pixel();
    let (main, legend) = area.split_horizontally(width.saturating_sub(120) as i32);

    let names = &matrix.labels;
    let row_label = |y: f64| category_label(names, (n - 1) as f64 - y);

    let mut chart = ChartBuilder::on(&main)
        .margin(12)
        .caption(title, theme.title_style())
        .x_label_area_size(70)
        .y_label_area_size(110)
        .build_cartesian_2d(category_range(n), category_range(n))
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n.min(MAX_CATEGORY_TICKS))
        .y_labels(n.min(MAX_CATEGORY_TICKS))
        .x_label_formatter(&|x| category_label(names, *x))
        .y_label_formatter(&|y| row_label(*y))
        .label_style(theme.label_style())
        .draw()
        .context("Failed to draw mesh")?;

    // Row 0 sits at the top.
    let center = |i: usize, j: usize| (j as f64, (n - 1 - i) as f64);

    chart
        .draw_series(matrix.visible_cells().map(|(i, j, value)| {
            let (x, y) = center(i, j);
            let fill = match value {
                Some(v) => diverging_color(v).filled(),
                None => WHITE.filled(),
            };
            Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], fill)
        }))
        .context("Failed to draw cells")?;

    let font_size = (28.0 - 2.0 * n as f64).clamp(9.0, 20.0);
    chart
        .draw_series(matrix.visible_cells().map(|(i, j, value)| {
            let text = match value {
                Some(v) => format!("{:.2}", v),
                None => "nan".to_string(),
            };
            let ink = match value {
                Some(v) if v.abs() > 0.6 => WHITE,
                _ => BLACK,
            };
            let style = ("sans-serif", font_size)
                .into_font()
                .color(&ink)
                .pos(Pos::new(HPos::Center, VPos::Center));
            Text::new(text, center(i, j), style)
        }))
        .context("Failed to draw annotations")?;

    draw_color_bar(&legend, theme)
}

fn draw_color_bar(area: &Area<'_>, theme: &Theme) -> Result<()> {
    const STEPS: usize = 100;
    let area = area.margin(60, 80, 10, 20);

    let mut chart = ChartBuilder::on(&area)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..1f64, -1f64..1f64)
        .context("Failed to build colour bar")?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(2)
        .x_label_formatter(&|_| String::new())
        .y_labels(5)
        .y_label_formatter(&|v| format!("{:.1}", v))
        .label_style(theme.label_style())
        .draw()
        .context("Failed to draw colour bar axis")?;

    let step = 2.0 / STEPS as f64;
    chart
        .draw_series((0..STEPS).map(|i| {
            let lo = -1.0 + i as f64 * step;
            Rectangle::new(
                [(0.0, lo), (1.0, lo + step)],
                diverging_color(lo + step / 2.0).filled(),
            )
        }))
        .context("Failed to draw colour bar")?;

    Ok(())
}
