//! Figure styling
//!
//! A white-grid look: white background, light grey grid, a categorical
//! palette for series and a blue-white-red diverging map for correlations.
//! Titles share one fixed style across every chart.

use plotters::style::{FontStyle, IntoFont, RGBColor, TextStyle};
use serde::Deserialize;

const DEFAULT_PALETTE: &[&str] = &[
    "#4C72B0", "#DD8452", "#55A868", "#C44E52", "#8172B3", "#937860", "#DA8BC3", "#8C8C8C",
    "#CCB974", "#64B5CD",
];

/// Theme settings as written in the config file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub title_color: String,
    pub title_size: f64,
    pub palette: Vec<String>,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            title_color: "#FF0000".to_string(),
            title_size: 25.0,
            palette: DEFAULT_PALETTE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Fully resolved theme, no optional fields
#[derive(Debug, Clone)]
pub struct Theme {
    pub title_color: RGBColor,
    pub title_size: f64,
    pub palette: Vec<RGBColor>,
    pub grid: RGBColor,
    pub text: RGBColor,
    pub axis_label_size: f64,
}

impl Default for Theme {
    fn default() -> Self {
        ThemeConfig::default().resolve()
    }
}

impl ThemeConfig {
    /// Unparseable colours fall back to the defaults.
    pub fn resolve(&self) -> Theme {
        let title_color = parse_color(&self.title_color).unwrap_or(RGBColor(255, 0, 0));
        let mut palette: Vec<RGBColor> = self.palette.iter().filter_map(|c| parse_color(c)).collect();
        if palette.is_empty() {
            palette = DEFAULT_PALETTE.iter().filter_map(|c| parse_color(c)).collect();
        }

        Theme {
            title_color,
            title_size: if self.title_size > 0.0 { self.title_size } else { 25.0 },
            palette,
            grid: RGBColor(234, 234, 242),
            text: RGBColor(38, 38, 38),
            axis_label_size: 16.0,
        }
    }
}

impl Theme {
    /// Bold title in the fixed title colour
    pub fn title_style(&self) -> TextStyle<'static> {
        ("sans-serif", self.title_size, FontStyle::Bold)
            .into_font()
            .color(&self.title_color)
    }

    pub fn label_style(&self) -> TextStyle<'static> {
        ("sans-serif", self.axis_label_size)
            .into_font()
            .color(&self.text)
    }

    pub fn color(&self, index: usize) -> RGBColor {
        self.palette[index % self.palette.len()]
    }

    /// First palette colour, used for single-series charts
    pub fn primary(&self) -> RGBColor {
        self.color(0)
    }
}

/// Blue-white-red diverging colour for a value in [-1, 1]
pub fn diverging_color(value: f64) -> RGBColor {
    const COLD: (f64, f64, f64) = (59.0, 76.0, 192.0);
    const MID: (f64, f64, f64) = (221.0, 221.0, 221.0);
    const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

    let v = value.clamp(-1.0, 1.0);
    let (from, to, t) = if v < 0.0 {
        (COLD, MID, v + 1.0)
    } else {
        (MID, WARM, v)
    };
    let lerp = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

/// Parse a color string into RGBColor, supporting hex (#RRGGBB, #RGB) and named colors
pub fn parse_color(color_str: &str) -> Option<RGBColor> {
    let s = color_str.trim();
    if s.starts_with('#') {
        return parse_hex_color(s);
    }
    match s.to_lowercase().as_str() {
        "red" => Some(RGBColor(255, 0, 0)),
        "green" => Some(RGBColor(0, 128, 0)),
        "blue" => Some(RGBColor(0, 0, 255)),
        "black" => Some(RGBColor(0, 0, 0)),
        "white" => Some(RGBColor(255, 255, 255)),
        "yellow" => Some(RGBColor(255, 255, 0)),
        "cyan" => Some(RGBColor(0, 255, 255)),
        "magenta" => Some(RGBColor(255, 0, 255)),
        "orange" => Some(RGBColor(255, 165, 0)),
        "purple" => Some(RGBColor(128, 0, 128)),
        "gray" | "grey" => Some(RGBColor(128, 128, 128)),
        _ => None,
    }
}

fn parse_hex_color(hex: &str) -> Option<RGBColor> {
    let hex = hex.trim_start_matches('#');
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(RGBColor(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()?;
            Some(RGBColor(r * 17, g * 17, b * 17))
        }
        _ => None,
    }
}
