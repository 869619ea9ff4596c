// Library exports for statboard

pub mod assets;
pub mod chart;
pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod html;
pub mod page;
pub mod server;
pub mod source;
pub mod stats;
pub mod theme;

use serde::Deserialize;

/// Pixel sizes of rendered figures
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Side of one cell in the pair grid
    #[serde(default = "default_pair_cell")]
    pub pair_cell: u32,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_pair_cell() -> u32 { 260 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            pair_cell: default_pair_cell(),
        }
    }
}
