//! HTML rendering of pages
//!
//! Every page is one document: a sidebar with the navigation radio group
//! and the upload form, and a main column with the page content. All widget
//! controls of a page belong to a single GET form, so changing one control
//! re-submits the others and the whole page re-renders with the new state.

use crate::assets::{SampleDownload, WelcomeContent, WelcomeMedia};
use crate::page::{Control, Page, Panel, PanelOutcome, RenderedPage, MULTI_MARKER};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt::Write;

const STYLE: &str = "\
body{margin:0;font-family:sans-serif;color:#262730;display:flex;min-height:100vh}\
aside{width:300px;background:#f0f2f6;padding:24px;box-sizing:border-box}\
main{flex:1;padding:32px 48px;max-width:1400px}\
h1{margin-top:0}\
.panel{margin:24px 0;padding-bottom:16px;border-bottom:1px solid #e6e6e6}\
.panel img{max-width:100%;height:auto}\
.control{margin:8px 0}\
.control label{display:block;font-size:14px;margin-bottom:4px}\
.msg{padding:12px 16px;border-radius:6px;margin:12px 0}\
.error{background:#ffe9e9;color:#7d1a1a}\
.warning{background:#fff8e1;color:#6b5200}\
.info{background:#e8f1fb;color:#0d3c6e}\
.success{background:#e6f4ea;color:#14532d}\
video{width:100%;max-width:1280px;border-radius:12px;box-shadow:0 4px 25px rgba(0,0,0,.4)}\
iframe{width:100%;max-width:1280px;height:720px;border:0}";

/// Status line in the sidebar and the dataset carried by every link
#[derive(Debug, Clone, Default)]
pub struct Chrome {
    /// Active staged dataset, forwarded in the `dataset` query parameter
    pub dataset: Option<String>,
    /// Remote variant: no upload form
    pub remote: bool,
}

impl Chrome {
    fn page_href(&self, page: Page) -> String {
        match &self.dataset {
            Some(name) => format!("/page/{}?dataset={}", page.slug(), urlencoding::encode(name)),
            None => format!("/page/{}", page.slug()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
    Info,
    Success,
}

impl Level {
    fn class(&self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
            Level::Success => "success",
        }
    }
}

/// Escape text for element content and quoted attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

pub fn message(level: Level, text: &str) -> String {
    format!(
        "<div class=\"msg {}\">{}</div>",
        level.class(),
        escape(text)
    )
}

/// Wrap page content in the document shell
pub fn document(current: Page, chrome: &Chrome, notice: Option<(Level, String)>, content: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">");
    html.push_str("<title>Data Analysis App</title><style>");
    html.push_str(STYLE);
    html.push_str("</style></head><body>");
    html.push_str(&sidebar(current, chrome, notice));
    html.push_str("<main>");
    html.push_str(content);
    html.push_str("</main></body></html>\n");
    html
}

fn sidebar(current: Page, chrome: &Chrome, notice: Option<(Level, String)>) -> String {
    let mut html = String::from("<aside><h2>Navigation</h2><form class=\"nav\"><p>Select Page:</p>");
    for page in Page::ALL {
        let _ = write!(
            html,
            "<div><label><input type=\"radio\" name=\"navigation\" value=\"{}\"{} \
             onchange=\"window.location=this.value\"> {}</label></div>",
            escape(&chrome.page_href(page)),
            if page == current { " checked" } else { "" },
            escape(page.label())
        );
    }
    html.push_str("</form>");

    if current.needs_dataset() && !chrome.remote {
        html.push_str("<h2>Upload Dataset</h2>");
        let _ = write!(
            html,
            "<form method=\"post\" action=\"/upload\" enctype=\"multipart/form-data\">\
             <input type=\"hidden\" name=\"page\" value=\"{}\">\
             <label>Upload your CSV file here<br>\
             <input type=\"file\" name=\"file\" accept=\".csv\" onchange=\"this.form.submit()\"></label>\
             <noscript><button type=\"submit\">Upload</button></noscript></form>",
            current.slug()
        );
    }
    if let Some((level, text)) = notice {
        html.push_str(&message(level, &text));
    }
    html.push_str("</aside>");
    html
}

/// Title and header block shared by every analysis page
fn heading(page: Page) -> String {
    let mut html = format!("<h1>{}</h1>", escape(page.title()));
    if let Some(header) = page.header() {
        let _ = write!(html, "<h2>{}</h2>", escape(header));
    }
    html
}

/// Main column for a page that could not be rendered at all
pub fn halted(page: Page, level: Level, text: &str) -> String {
    let mut html = heading(page);
    html.push_str(&message(level, text));
    html
}

/// Main column for a rendered analysis page
pub fn rendered_page(rendered: &RenderedPage, chrome: &Chrome) -> String {
    let mut html = heading(rendered.page);
    let form_id = "widgets";
    let _ = write!(
        html,
        "<form id=\"{}\" method=\"get\" action=\"/page/{}\">",
        form_id,
        rendered.page.slug()
    );
    if let Some(name) = &chrome.dataset {
        let _ = write!(
            html,
            "<input type=\"hidden\" name=\"dataset\" value=\"{}\">",
            escape(name)
        );
    }
    html.push_str("</form>");

    for panel in &rendered.panels {
        html.push_str(&panel_html(panel, form_id));
    }
    html
}

fn panel_html(panel: &Panel, form_id: &str) -> String {
    let mut html = format!(
        "<section class=\"panel\" id=\"{}\"><h3>{}</h3>",
        panel.kind.slug(),
        escape(panel.heading)
    );
    for control in &panel.controls {
        html.push_str(&control_html(control, form_id));
    }
    match &panel.outcome {
        PanelOutcome::Figure(figure) => {
            let _ = write!(
                html,
                "<img src=\"data:image/png;base64,{}\" alt=\"{}\" width=\"{}\" height=\"{}\">",
                STANDARD.encode(&figure.png),
                escape(&figure.title),
                figure.width,
                figure.height
            );
        }
        PanelOutcome::Error(text) => html.push_str(&message(Level::Error, text)),
        PanelOutcome::Warning(text) => html.push_str(&message(Level::Warning, text)),
    }
    html.push_str("</section>");
    html
}

fn control_html(control: &Control, form_id: &str) -> String {
    let submit = "this.form.submit()";
    match control {
        Control::Select {
            key,
            label,
            options,
            selected,
        } => {
            let mut html = format!(
                "<div class=\"control\"><label for=\"{key}\">{}</label>\
                 <select id=\"{key}\" name=\"{key}\" form=\"{form_id}\" onchange=\"{submit}\">",
                escape(label)
            );
            for option in options {
                let _ = write!(
                    html,
                    "<option value=\"{0}\"{1}>{0}</option>",
                    escape(option),
                    if option == selected { " selected" } else { "" }
                );
            }
            html.push_str("</select></div>");
            html
        }
        Control::MultiSelect {
            key,
            label,
            options,
            selected,
        } => {
            let mut html = format!(
                "<div class=\"control\"><label>{}</label>\
                 <input type=\"hidden\" name=\"{}\" value=\"{key}\" form=\"{form_id}\">",
                escape(label),
                MULTI_MARKER
            );
            for option in options {
                let _ = write!(
                    html,
                    "<label><input type=\"checkbox\" name=\"{key}\" value=\"{0}\" form=\"{form_id}\" \
                     onchange=\"{submit}\"{1}> {0}</label>",
                    escape(option),
                    if selected.contains(option) { " checked" } else { "" }
                );
            }
            html.push_str("</div>");
            html
        }
        Control::Slider {
            key,
            label,
            min,
            max,
            value,
        } => format!(
            "<div class=\"control\"><label for=\"{key}\">{} <output>{value}</output></label>\
             <input type=\"range\" id=\"{key}\" name=\"{key}\" min=\"{min}\" max=\"{max}\" \
             value=\"{value}\" form=\"{form_id}\" onchange=\"{submit}\"></div>",
            escape(label)
        ),
    }
}

/// Main column of the Welcome page
pub fn welcome(content: &WelcomeContent, chrome: &Chrome) -> String {
    let source = if content.remote {
        "the sample dataset"
    } else {
        "your uploaded dataset"
    };
    let mut html = heading(Page::Welcome);
    let _ = write!(
        html,
        "<p>This application is designed for dynamic data visualization and analysis using {source}. \
         It supports:</p><ul>\
         <li><b>Univariate Analysis:</b> Single-variable exploration.</li>\
         <li><b>Bivariate Analysis:</b> Explore relationships between two variables.</li>\
         <li><b>Multivariate Analysis:</b> Advanced insights involving multiple variables.</li></ul>\
         <h3>Features include:</h3><ul><li>Interactive visualizations.</li>\
         <li>Seamless data upload and processing.</li>\
         <li>Advanced plots with custom options.</li></ul>\
         <p>Navigate through the sidebar options to begin your journey! 📊</p><hr>\
         <h2>📥 Download Sample Dataset</h2>"
    );

    match &content.sample {
        SampleDownload::Staged { file_name } => {
            let _ = write!(
                html,
                "<p><a class=\"button\" href=\"/sample?dataset={}\" download=\"{}\">Download CSV</a></p>",
                urlencoding::encode(file_name),
                escape(file_name)
            );
        }
        SampleDownload::Remote { url } => {
            let _ = write!(
                html,
                "<p><a class=\"button\" href=\"{}\">Download CSV</a></p>",
                escape(url)
            );
        }
        SampleDownload::None => html.push_str(&message(
            Level::Info,
            "No CSV file found in the `app_data/` folder. Upload a CSV to enable download.",
        )),
    }

    html.push_str("<hr><h2>🎥 Exploratory Data Analysis Video on the sample Dataset</h2>");
    match &content.media {
        WelcomeMedia::Videos(names) => {
            for name in names {
                let _ = write!(
                    html,
                    "<h3>▶️ {}</h3><video controls preload=\"metadata\" src=\"/videos/{}\"></video>",
                    escape(name),
                    urlencoding::encode(name)
                );
            }
        }
        WelcomeMedia::Preview { url } => {
            let _ = write!(
                html,
                "<iframe src=\"{}\" allow=\"autoplay\"></iframe>",
                escape(url)
            );
        }
        WelcomeMedia::None => html.push_str(&message(
            Level::Info,
            "🎬 No videos found in the `videos/` folder. Add `.mp4` files to display them here.",
        )),
    }

    if let Some(name) = &chrome.dataset {
        let _ = write!(
            html,
            "<p class=\"msg info\">Active dataset: {}</p>",
            escape(name)
        );
    }
    html
}
