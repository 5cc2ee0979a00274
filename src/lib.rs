//! htmlslides
//!
//! Turns pasted HTML markup into a sequence of editable slides, applies
//! selection-scoped text styling, and exports the slides as a zip archive of PNG
//! images or as a multi-page PDF.
//!
//! # Pipeline
//!
//! - **Extraction**: markup is parsed with `scraper`, scripts are stripped and
//!   every `.slide` element becomes one slide (or the whole body when there are none)
//! - **Preview**: slides are cloned into an editable preview document
//! - **Styling**: font size / color patches target the current selection
//! - **Export**: each slide is rasterized onto a 1280×720 canvas and packaged
//!
//! # Example
//!
//! ```no_run
//! use htmlslides::{extract::extract_slides, export::ExportPipeline, preview::Preview, ToolConfig};
//!
//! # async fn run() -> htmlslides::Result<()> {
//! let config = ToolConfig::default();
//! let extraction = extract_slides(
//!     r#"<div class="slide">A</div><div class="slide">B</div>"#,
//!     &config.extract_options(),
//! )?;
//! let mut preview = Preview::new(config.display);
//! preview.render(&extraction.slides);
//!
//! let pipeline = ExportPipeline::new(config.clone());
//! let archive = pipeline.export_images(&preview).await?;
//! assert_eq!(archive.entries, vec!["slide-01.png", "slide-02.png"]);
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;

pub mod error;
pub use error::{Error, Result};

pub mod css;
pub mod dom;
pub mod export;
pub mod extract;
pub mod fonts;
pub mod preview;
pub mod rendering;
pub mod selection;
pub mod session;
pub mod style;

/// Configuration for extraction, preview and export
///
/// The defaults reproduce the editor's behavior: slides are marked with the
/// `slide` class, parsing is lenient, and exports use a 1280×720 canvas
/// rasterized at twice its logical size on a white background.
///
/// # Examples
///
/// ```
/// let cfg = htmlslides::ToolConfig::default();
/// assert_eq!(cfg.marker_class, "slide");
/// assert_eq!(cfg.viewport.width, 1280);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Class that marks an element as a slide boundary
    pub marker_class: String,
    /// Report html5ever structural errors instead of recovering silently
    pub strict_parse: bool,
    /// Surface a diagnostic when no marker elements are present
    pub require_markers: bool,
    /// Logical export canvas
    pub viewport: Viewport,
    /// Supersampling factor applied when rasterizing
    pub supersample: u32,
    /// Canvas background color
    pub background: String,
    /// Global preview parameters
    pub display: DisplayParams,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            marker_class: "slide".to_string(),
            strict_parse: false,
            require_markers: false,
            viewport: Viewport::default(),
            supersample: 2,
            background: "#ffffff".to_string(),
            display: DisplayParams::default(),
        }
    }
}

impl ToolConfig {
    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: ToolConfig =
            serde_json::from_str(s).map_err(|e| Error::ConfigError(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.marker_class.trim().is_empty()
            || self.marker_class.contains(char::is_whitespace)
        {
            return Err(Error::ConfigError(format!(
                "marker class must be a single non-empty class name, got {:?}",
                self.marker_class
            )));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError("viewport must not be empty".into()));
        }
        if !(1..=8).contains(&self.supersample) {
            return Err(Error::ConfigError(format!(
                "supersample must be between 1 and 8, got {}",
                self.supersample
            )));
        }
        if css::parse_color(&self.background).is_none() {
            return Err(Error::ConfigError(format!(
                "background is not a color: {}",
                self.background
            )));
        }
        self.display.validate()
    }

    pub fn extract_options(&self) -> extract::ExtractOptions {
        extract::ExtractOptions {
            marker_class: self.marker_class.clone(),
            strict_parse: self.strict_parse,
            require_markers: self.require_markers,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Global display parameters shared by every slide in the preview
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayParams {
    /// Zoom factor of the preview
    pub scale: f32,
    /// Multiplier for vertical spacing
    pub density: f32,
    /// Multiplier for font sizes
    pub font_scale: f32,
}

impl Default for DisplayParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            density: 1.0,
            font_scale: 1.0,
        }
    }
}

impl DisplayParams {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("scale", self.scale),
            ("density", self.density),
            ("font_scale", self.font_scale),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(Error::ConfigError(format!("{} must be positive, got {}", name, v)));
            }
        }
        Ok(())
    }
}
