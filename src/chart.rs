// Chart dispatch: one chart request maps onto one drawing primitive

use crate::data::Dataset;
use crate::error::{DashboardError, Result};
use crate::graph::{self, Canvas, Labels};
use crate::stats::{self, CorrelationMatrix};
use crate::theme::Theme;
use crate::RenderOptions;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Histogram,
    CountPlot,
    PieChart,
    BoxPlot,
    LinePlot,
    ScatterPlot,
    BarPlot,
    CategoricalBoxPlot,
    PairPlot,
    CorrelationHeatmap,
}

impl ChartKind {
    /// Short name used in file names and log fields
    pub fn slug(&self) -> &'static str {
        match self {
            ChartKind::Histogram => "histogram",
            ChartKind::CountPlot => "countplot",
            ChartKind::PieChart => "pie",
            ChartKind::BoxPlot => "boxplot",
            ChartKind::LinePlot => "lineplot",
            ChartKind::ScatterPlot => "scatterplot",
            ChartKind::BarPlot => "barplot",
            ChartKind::CategoricalBoxPlot => "boxplot_by_category",
            ChartKind::PairPlot => "pairplot",
            ChartKind::CorrelationHeatmap => "heatmap",
        }
    }

    /// Name used in "No numeric columns available for ..." messages
    pub fn display_name(&self) -> &'static str {
        match self {
            ChartKind::Histogram => "Histogram",
            ChartKind::CountPlot => "Countplot",
            ChartKind::PieChart => "Pie Chart",
            ChartKind::BoxPlot | ChartKind::CategoricalBoxPlot => "Boxplot",
            ChartKind::LinePlot => "Line Plot",
            ChartKind::ScatterPlot => "Scatter Plot",
            ChartKind::BarPlot => "Bar Plot",
            ChartKind::PairPlot => "Pairplot",
            ChartKind::CorrelationHeatmap => "Heatmap",
        }
    }
}

/// Everything needed to draw one chart. Built fresh for every render.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartRequest {
    Histogram { column: String },
    CountPlot { column: String },
    PieChart { column: String, top_n: usize },
    BoxPlot { column: String },
    LinePlot { x: String, y: String },
    ScatterPlot { x: String, y: String },
    BarPlot { x: String, y: String },
    CategoricalBoxPlot { x: String, y: String },
    PairPlot { columns: Vec<String> },
    CorrelationHeatmap { columns: Vec<String> },
}

impl ChartRequest {
    pub fn kind(&self) -> ChartKind {
        match self {
            ChartRequest::Histogram { .. } => ChartKind::Histogram,
            ChartRequest::CountPlot { .. } => ChartKind::CountPlot,
            ChartRequest::PieChart { .. } => ChartKind::PieChart,
            ChartRequest::BoxPlot { .. } => ChartKind::BoxPlot,
            ChartRequest::LinePlot { .. } => ChartKind::LinePlot,
            ChartRequest::ScatterPlot { .. } => ChartKind::ScatterPlot,
            ChartRequest::BarPlot { .. } => ChartKind::BarPlot,
            ChartRequest::CategoricalBoxPlot { .. } => ChartKind::CategoricalBoxPlot,
            ChartRequest::PairPlot { .. } => ChartKind::PairPlot,
            ChartRequest::CorrelationHeatmap { .. } => ChartKind::CorrelationHeatmap,
        }
    }

    pub fn title(&self) -> String {
        match self {
            ChartRequest::Histogram { column } => format!("Histogram of {}", column),
            ChartRequest::CountPlot { column } => format!("Countplot of {}", column),
            ChartRequest::PieChart { column, .. } => format!("Pie Chart of {}", column),
            ChartRequest::BoxPlot { column } => format!("Boxplot of {}", column),
            ChartRequest::LinePlot { x, y } => format!("Line Plot: {} vs {}", x, y),
            ChartRequest::ScatterPlot { x, y } => format!("Scatter Plot: {} vs {}", x, y),
            ChartRequest::BarPlot { x, y } => format!("Bar Plot: {} vs {}", x, y),
            ChartRequest::CategoricalBoxPlot { x, y } => format!("Boxplot: {} vs {}", x, y),
            ChartRequest::PairPlot { .. } => "Pairplot".to_string(),
            ChartRequest::CorrelationHeatmap { .. } => "Correlation Heatmap".to_string(),
        }
    }
}

/// An encoded chart, handed to the display surface and then dropped
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub kind: ChartKind,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Render one chart request against a dataset
pub fn render_chart(
    request: &ChartRequest,
    dataset: &Dataset,
    options: &RenderOptions,
    theme: &Theme,
) -> Result<Figure> {
    let title = request.title();
    let (width, height) = figure_size(request, options)?;
    let mut canvas = Canvas::new(width, height).map_err(DashboardError::render)?;

    match request {
        ChartRequest::Histogram { column } => {
            let values = stats::finite(dataset.numeric(column)?);
            let hist = stats::histogram(&values).ok_or_else(|| no_values(column))?;
            let density = stats::kde_curve(&values);
            canvas
                .draw(|root| {
                    graph::draw_histogram(root, Labels::new(&title, column, "Count"), &hist, &density, theme)
                })
                .map_err(DashboardError::render)?;
        }
        ChartRequest::CountPlot { column } => {
            let counts = stats::category_counts(dataset.categorical(column)?);
            if counts.is_empty() {
                return Err(no_values(column));
            }
            canvas
                .draw(|root| graph::draw_count_bars(root, Labels::new(&title, column, "count"), &counts, theme))
                .map_err(DashboardError::render)?;
        }
        ChartRequest::PieChart { column, top_n } => {
            let slices = stats::top_categories(dataset.categorical(column)?, *top_n);
            if slices.is_empty() {
                return Err(no_values(column));
            }
            canvas
                .draw(|root| graph::draw_pie(root, &title, &slices, theme))
                .map_err(DashboardError::render)?;
        }
        ChartRequest::BoxPlot { column } => {
            let values = stats::finite(dataset.numeric(column)?);
            let box_stats = stats::box_stats(&values).ok_or_else(|| no_values(column))?;
            canvas
                .draw(|root| graph::draw_box_horizontal(root, Labels::new(&title, column, ""), &box_stats, theme))
                .map_err(DashboardError::render)?;
        }
        ChartRequest::LinePlot { x, y } => {
            let points = stats::aggregate_by_x(dataset.numeric(x)?, dataset.numeric(y)?);
            if points.is_empty() {
                return Err(no_values(y));
            }
            canvas
                .draw(|root| graph::draw_line(root, Labels::new(&title, x, y), &points, theme))
                .map_err(DashboardError::render)?;
        }
        ChartRequest::ScatterPlot { x, y } => {
            let points = stats::paired(dataset.numeric(x)?, dataset.numeric(y)?);
            if points.is_empty() {
                return Err(no_values(y));
            }
            canvas
                .draw(|root| graph::draw_scatter(root, Labels::new(&title, x, y), &points, 4, theme))
                .map_err(DashboardError::render)?;
        }
        ChartRequest::BarPlot { x, y } => {
            let groups: Vec<(String, stats::Estimate)> =
                stats::group_by_category(dataset.categorical(x)?, dataset.numeric(y)?)
                    .into_iter()
                    .filter_map(|(label, values)| stats::mean_ci(&values).map(|e| (label, e)))
                    .collect();
            if groups.is_empty() {
                return Err(no_values(y));
            }
            canvas
                .draw(|root| graph::draw_bar_estimates(root, Labels::new(&title, x, y), &groups, theme))
                .map_err(DashboardError::render)?;
        }
        ChartRequest::CategoricalBoxPlot { x, y } => {
            let groups: Vec<(String, stats::BoxStats)> =
                stats::group_by_category(dataset.categorical(x)?, dataset.numeric(y)?)
                    .into_iter()
                    .filter_map(|(label, values)| stats::box_stats(&values).map(|s| (label, s)))
                    .collect();
            if groups.is_empty() {
                return Err(no_values(y));
            }
            canvas
                .draw(|root| graph::draw_grouped_boxes(root, Labels::new(&title, x, y), &groups, theme))
                .map_err(DashboardError::render)?;
        }
        ChartRequest::PairPlot { columns } => {
            if columns.is_empty() {
                return Err(DashboardError::EmptySelection);
            }
            let series = columns
                .iter()
                .map(|c| Ok((c.clone(), dataset.numeric(c)?.to_vec())))
                .collect::<Result<Vec<_>>>()?;
            canvas
                .draw(|root| graph::draw_pair_grid(root, &series, theme))
                .map_err(DashboardError::render)?;
        }
        ChartRequest::CorrelationHeatmap { columns } => {
            let matrix = CorrelationMatrix::compute(dataset, columns)?;
            if matrix.is_empty() {
                return Err(DashboardError::NoNumericColumns {
                    chart: ChartKind::CorrelationHeatmap.display_name(),
                });
            }
            canvas
                .draw(|root| graph::draw_heatmap(root, &title, &matrix, theme))
                .map_err(DashboardError::render)?;
        }
    }

    let png = canvas.render().map_err(DashboardError::render)?;
    Ok(Figure {
        kind: request.kind(),
        title,
        width,
        height,
        png,
    })
}

/// Longest side of a pair grid; cells shrink to stay inside it
const MAX_PAIR_SIDE: u32 = 3000;

/// Smallest pair-grid cell that still fits its axes
const MIN_PAIR_CELL: u32 = 120;

/// Pair grids scale with the number of columns; heatmaps get extra room
/// for the colour bar.
fn figure_size(request: &ChartRequest, options: &RenderOptions) -> Result<(u32, u32)> {
    let size = match request {
        ChartRequest::PairPlot { columns } => {
            let n = u32::try_from(columns.len().max(1)).unwrap_or(u32::MAX);
            let cell = options.pair_cell.min(MAX_PAIR_SIDE / n);
            if cell == 0 || cell < options.pair_cell.min(MIN_PAIR_CELL) {
                return Err(DashboardError::Render(format!(
                    "a Pairplot of {} columns does not fit, select at most {}",
                    columns.len(),
                    MAX_PAIR_SIDE / options.pair_cell.clamp(1, MIN_PAIR_CELL)
                )));
            }
            (cell * n, cell * n)
        }
        ChartRequest::CorrelationHeatmap { .. } => (
            options.width.saturating_add(200),
            options.height.saturating_add(150),
        ),
        _ => (options.width, options.height),
    };
    Ok(size)
}

fn no_values(column: &str) -> DashboardError {
    DashboardError::NoValues {
        column: column.to_string(),
    }
}
