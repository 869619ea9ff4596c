//! Page layouts and the form-to-chart dispatch
//!
//! A page is rendered in one pass: the dataset is classified once, every
//! panel resolves its selectors against the classification lists, and each
//! resolved request is drawn independently. A failing panel never blocks
//! its siblings.

use crate::chart::{render_chart, ChartKind, ChartRequest, Figure};
use crate::data::{Classification, Dataset};
use crate::error::{DashboardError, Result};
use crate::theme::Theme;
use crate::RenderOptions;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Form field that marks a multiselect as submitted, even with nothing ticked
pub const MULTI_MARKER: &str = "_multi";

const PIE_TOP_MIN: usize = 3;
const PIE_TOP_MAX: usize = 10;
const PIE_TOP_DEFAULT: usize = 5;
const PAIR_DEFAULT_COLUMNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Welcome,
    Univariate,
    Bivariate,
    Multivariate,
}

impl Page {
    pub const ALL: [Page; 4] = [
        Page::Welcome,
        Page::Univariate,
        Page::Bivariate,
        Page::Multivariate,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Page::Welcome => "welcome",
            Page::Univariate => "univariate",
            Page::Bivariate => "bivariate",
            Page::Multivariate => "multivariate",
        }
    }

    /// Label shown in the navigation radio group
    pub fn label(&self) -> &'static str {
        match self {
            Page::Welcome => "Welcome",
            Page::Univariate => "Univariate Analysis",
            Page::Bivariate => "Bivariate Analysis",
            Page::Multivariate => "Multivariate Analysis",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Welcome => "Welcome to the Data Analysis Application 🎉",
            _ => self.label(),
        }
    }

    pub fn header(&self) -> Option<&'static str> {
        match self {
            Page::Welcome => None,
            Page::Univariate => Some("Explore Single-Variable Trends"),
            Page::Bivariate => Some("Explore Relationships Between Two Variables"),
            Page::Multivariate => Some("Discover Patterns Across Multiple Variables"),
        }
    }

    pub fn needs_dataset(&self) -> bool {
        !matches!(self, Page::Welcome)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Page {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        Page::ALL
            .into_iter()
            .find(|p| p.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| DashboardError::UnknownPage(s.to_string()))
    }
}

/// Widget values submitted with one request, in submission order.
/// Keys may repeat (multiselect); single-valued lookups take the last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetState {
    entries: Vec<(String, String)>,
}

impl WidgetState {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Replace every value of `key` with a single one
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.retain(|(k, _)| k != key);
        self.entries.push((key.to_string(), value.into()));
    }

    /// Selectbox semantics: the requested option if offered, else the first.
    /// `None` only when there is nothing to choose from.
    pub fn select(&self, key: &str, options: &[String]) -> Option<String> {
        let requested = self.get(key);
        options
            .iter()
            .find(|o| Some(o.as_str()) == requested)
            .or_else(|| options.first())
            .cloned()
    }

    /// Integer slider clamped to `min..=max`; unparseable input gives the default
    pub fn slider(&self, key: &str, min: usize, max: usize, default: usize) -> usize {
        self.get(key)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|v| v.clamp(min as i64, max as i64) as usize)
            .unwrap_or(default)
    }

    /// Multiselect semantics. With no submission the default applies; a
    /// submitted form with nothing ticked yields an empty selection.
    pub fn multiselect(&self, key: &str, options: &[String], default: &[String]) -> Vec<String> {
        let submitted = self.get_all(key);
        let marked = self
            .entries
            .iter()
            .any(|(k, v)| k == MULTI_MARKER && v == key);
        if submitted.is_empty() && !marked {
            return default.to_vec();
        }

        let mut chosen: Vec<String> = Vec::new();
        for value in submitted {
            if options.iter().any(|o| o == value) && !chosen.iter().any(|c| c == value) {
                chosen.push(value.to_string());
            }
        }
        chosen
    }
}

/// One form control of a panel, with its resolved value
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Select {
        key: &'static str,
        label: &'static str,
        options: Vec<String>,
        selected: String,
    },
    MultiSelect {
        key: &'static str,
        label: &'static str,
        options: Vec<String>,
        selected: Vec<String>,
    },
    Slider {
        key: &'static str,
        label: &'static str,
        min: usize,
        max: usize,
        value: usize,
    },
}

impl Control {
    pub fn key(&self) -> &'static str {
        match self {
            Control::Select { key, .. }
            | Control::MultiSelect { key, .. }
            | Control::Slider { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelOutcome {
    Figure(Figure),
    Error(String),
    Warning(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub kind: ChartKind,
    pub heading: &'static str,
    pub controls: Vec<Control>,
    pub outcome: PanelOutcome,
}

impl Panel {
    pub fn figure(&self) -> Option<&Figure> {
        match &self.outcome {
            PanelOutcome::Figure(figure) => Some(figure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub page: Page,
    pub title: &'static str,
    pub header: Option<&'static str>,
    pub classification: Option<Classification>,
    pub panels: Vec<Panel>,
}

/// Render one page. Pure over its inputs: equal arguments give equal pages.
pub fn render_page(
    page: Page,
    dataset: Option<&Dataset>,
    state: &WidgetState,
    options: &RenderOptions,
    theme: &Theme,
) -> Result<RenderedPage> {
    let started = Instant::now();

    let (classification, panels) = if page.needs_dataset() {
        let dataset = dataset.ok_or(DashboardError::NoDataset)?;
        let classification = dataset.classify();
        debug!(
            numeric = classification.numeric_columns.len(),
            categorical = classification.categorical_columns.len(),
            "classified columns"
        );
        let ctx = PanelContext {
            dataset,
            classes: &classification,
            state,
            options,
            theme,
        };
        let panels = match page {
            Page::Univariate => univariate(&ctx),
            Page::Bivariate => bivariate(&ctx),
            Page::Multivariate => multivariate(&ctx),
            Page::Welcome => Vec::new(),
        };
        (Some(classification), panels)
    } else {
        (None, Vec::new())
    };

    info!(
        page = page.slug(),
        panels = panels.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "page rendered"
    );

    Ok(RenderedPage {
        page,
        title: page.title(),
        header: page.header(),
        classification,
        panels,
    })
}

struct PanelContext<'a> {
    dataset: &'a Dataset,
    classes: &'a Classification,
    state: &'a WidgetState,
    options: &'a RenderOptions,
    theme: &'a Theme,
}

impl PanelContext<'_> {
    fn numeric(&self) -> &[String] {
        &self.classes.numeric_columns
    }

    fn categorical(&self) -> &[String] {
        &self.classes.categorical_columns
    }

    /// Resolve a selectbox over `options`; `None` when the list is empty
    fn select(&self, key: &'static str, label: &'static str, options: &[String]) -> Option<(Control, String)> {
        let selected = self.state.select(key, options)?;
        let control = Control::Select {
            key,
            label,
            options: options.to_vec(),
            selected: selected.clone(),
        };
        Some((control, selected))
    }

    fn draw(&self, request: ChartRequest, controls: Vec<Control>) -> Panel {
        let kind = request.kind();
        let outcome = match render_chart(&request, self.dataset, self.options, self.theme) {
            Ok(figure) => PanelOutcome::Figure(figure),
            Err(err) => {
                warn!(chart = kind.slug(), error = %err, "panel failed");
                PanelOutcome::Error(err.to_string())
            }
        };
        Panel {
            kind,
            heading: kind.display_name(),
            controls,
            outcome,
        }
    }
}

fn no_numeric(kind: ChartKind, controls: Vec<Control>) -> Panel {
    let message = DashboardError::NoNumericColumns {
        chart: kind.display_name(),
    };
    warn!(chart = kind.slug(), "no numeric columns");
    Panel {
        kind,
        heading: kind.display_name(),
        controls,
        outcome: PanelOutcome::Error(message.to_string()),
    }
}

/// Single numeric column panel: histogram or box plot
fn numeric_panel(
    ctx: &PanelContext<'_>,
    kind: ChartKind,
    key: &'static str,
    label: &'static str,
) -> Panel {
    match ctx.select(key, label, ctx.numeric()) {
        Some((control, column)) => {
            let request = match kind {
                ChartKind::BoxPlot => ChartRequest::BoxPlot { column },
                _ => ChartRequest::Histogram { column },
            };
            ctx.draw(request, vec![control])
        }
        None => no_numeric(kind, Vec::new()),
    }
}

fn univariate(ctx: &PanelContext<'_>) -> Vec<Panel> {
    let mut panels = vec![numeric_panel(
        ctx,
        ChartKind::Histogram,
        "hist",
        "Select column for Histogram:",
    )];

    if let Some((control, column)) =
        ctx.select("countplot", "Select column for Countplot:", ctx.categorical())
    {
        panels.push(ctx.draw(ChartRequest::CountPlot { column }, vec![control]));
    }

    if let Some((control, column)) =
        ctx.select("pie", "Select column for Pie Chart:", ctx.categorical())
    {
        let top_n = ctx
            .state
            .slider("top_n", PIE_TOP_MIN, PIE_TOP_MAX, PIE_TOP_DEFAULT);
        let slider = Control::Slider {
            key: "top_n",
            label: "Number of top categories for Pie Chart:",
            min: PIE_TOP_MIN,
            max: PIE_TOP_MAX,
            value: top_n,
        };
        panels.push(ctx.draw(ChartRequest::PieChart { column, top_n }, vec![control, slider]));
    }

    panels.push(numeric_panel(
        ctx,
        ChartKind::BoxPlot,
        "box",
        "Select column for Boxplot:",
    ));
    panels
}

fn bivariate(ctx: &PanelContext<'_>) -> Vec<Panel> {
    let mut panels = Vec::new();

    let numeric_pairs: [(ChartKind, &'static str, &'static str, &'static str, &'static str); 2] = [
        (ChartKind::LinePlot, "line_x", "X for Line Plot:", "line_y", "Y for Line Plot:"),
        (
            ChartKind::ScatterPlot,
            "scatter_x",
            "X for Scatter Plot:",
            "scatter_y",
            "Y for Scatter Plot:",
        ),
    ];
    for (kind, x_key, x_label, y_key, y_label) in numeric_pairs {
        let x = ctx.select(x_key, x_label, ctx.numeric());
        let y = ctx.select(y_key, y_label, ctx.numeric());
        let panel = match (x, y) {
            (Some((x_control, x)), Some((y_control, y))) => {
                let request = match kind {
                    ChartKind::LinePlot => ChartRequest::LinePlot { x, y },
                    _ => ChartRequest::ScatterPlot { x, y },
                };
                ctx.draw(request, vec![x_control, y_control])
            }
            _ => no_numeric(kind, Vec::new()),
        };
        panels.push(panel);
    }

    let grouped: [(ChartKind, &'static str, &'static str, &'static str, &'static str); 2] = [
        (
            ChartKind::BarPlot,
            "bar_x",
            "X for Bar Plot (Categorical):",
            "bar_y",
            "Y for Bar Plot (Numeric):",
        ),
        (
            ChartKind::CategoricalBoxPlot,
            "box_x",
            "X for Boxplot (Categorical):",
            "box_y",
            "Y for Boxplot (Numeric):",
        ),
    ];
    for (kind, x_key, x_label, y_key, y_label) in grouped {
        let Some((x_control, x)) = ctx.select(x_key, x_label, ctx.categorical()) else {
            continue;
        };
        let panel = match ctx.select(y_key, y_label, ctx.numeric()) {
            Some((y_control, y)) => {
                let request = match kind {
                    ChartKind::BarPlot => ChartRequest::BarPlot { x, y },
                    _ => ChartRequest::CategoricalBoxPlot { x, y },
                };
                ctx.draw(request, vec![x_control, y_control])
            }
            None => no_numeric(kind, vec![x_control]),
        };
        panels.push(panel);
    }

    panels
}

fn multivariate(ctx: &PanelContext<'_>) -> Vec<Panel> {
    let numeric = ctx.numeric();
    if numeric.is_empty() {
        return vec![
            no_numeric(ChartKind::PairPlot, Vec::new()),
            no_numeric(ChartKind::CorrelationHeatmap, Vec::new()),
        ];
    }

    let default = &numeric[..numeric.len().min(PAIR_DEFAULT_COLUMNS)];
    let selected = ctx.state.multiselect("pair", numeric, default);
    let control = Control::MultiSelect {
        key: "pair",
        label: "Select columns for Pairplot:",
        options: numeric.to_vec(),
        selected: selected.clone(),
    };
    let pair = if selected.is_empty() {
        Panel {
            kind: ChartKind::PairPlot,
            heading: ChartKind::PairPlot.display_name(),
            controls: vec![control],
            outcome: PanelOutcome::Warning(DashboardError::EmptySelection.to_string()),
        }
    } else {
        ctx.draw(ChartRequest::PairPlot { columns: selected }, vec![control])
    };

    let heatmap = ctx.draw(
        ChartRequest::CorrelationHeatmap {
            columns: numeric.to_vec(),
        },
        Vec::new(),
    );

    vec![pair, heatmap]
}
