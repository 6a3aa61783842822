//! Raster export with vector fallback
//!
//! The pipeline clones the drawing's SVG, pins explicit pixel dimensions and a
//! solid background, rasterizes at a fixed supersampling factor and writes a
//! timestamped PNG. If rasterization is refused or fails, the original SVG is
//! written unmodified instead.

use super::render::{Drawing, DrawingContent};
use super::svg::{
    format_number, insert_after_root, references_external_resource, set_root_attribute, view_box,
};
use crate::{log_debug, log_info, log_warn};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use strum_macros::Display;

/// Supersampling factor for raster export
pub const EXPORT_SCALE: f32 = 3.0;

/// Background painted behind exported diagrams
pub const DEFAULT_BACKGROUND: &str = "#ffffff";

/// Largest raster edge we are willing to allocate
const MAX_RASTER_EDGE: f32 = 16_384.0;

const FILE_STEM: &str = "codeflow-diagram";

static FONTDB: LazyLock<Arc<resvg::usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = resvg::usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

/// Errors raised while turning SVG into pixels
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("Rasterization refused: document is not self-contained ({0})")]
    OriginRestricted(String),
    #[error("Failed to parse SVG for export: {0}")]
    Parse(String),
    #[error("Cannot allocate a {width}x{height} raster surface")]
    Allocation { width: u32, height: u32 },
    #[error("Scaled dimensions are out of range: {0}")]
    InvalidSize(String),
    #[error("Failed to encode PNG output: {0}")]
    Encode(String),
}

/// Errors raised by [`Exporter::export_raster`]
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Nothing to export: {0}")]
    NothingToExport(String),
    #[error("Failed to write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A PNG produced by a [`Rasterizer`]
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Converts a self-contained SVG document into PNG bytes
pub trait Rasterizer {
    fn rasterize(&self, svg: &str, scale: f32) -> Result<RasterImage, RasterError>;
}

/// [`Rasterizer`] backed by resvg
#[derive(Debug, Default, Clone, Copy)]
pub struct ResvgRasterizer;

impl Rasterizer for ResvgRasterizer {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::as_conversions
    )]
    fn rasterize(&self, svg: &str, scale: f32) -> Result<RasterImage, RasterError> {
        if references_external_resource(svg) {
            return Err(RasterError::OriginRestricted(
                "external resource reference".to_string(),
            ));
        }

        let options = resvg::usvg::Options {
            fontdb: Arc::clone(&FONTDB),
            ..Default::default()
        };
        let tree = resvg::usvg::Tree::from_str(svg, &options)
            .map_err(|e| RasterError::Parse(e.to_string()))?;

        let size = tree.size();
        let scaled_width = (size.width() * scale).ceil();
        let scaled_height = (size.height() * scale).ceil();

        if !scaled_width.is_finite() || !scaled_height.is_finite() {
            return Err(RasterError::InvalidSize("not finite".to_string()));
        }
        if scaled_width < 1.0 || scaled_height < 1.0 {
            return Err(RasterError::InvalidSize(format!(
                "{scaled_width}x{scaled_height} collapsed below 1px"
            )));
        }
        if scaled_width > MAX_RASTER_EDGE || scaled_height > MAX_RASTER_EDGE {
            return Err(RasterError::InvalidSize(format!(
                "{scaled_width}x{scaled_height} exceeds {MAX_RASTER_EDGE}px"
            )));
        }

        let width = scaled_width as u32;
        let height = scaled_height as u32;
        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or(RasterError::Allocation { width, height })?;

        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );

        let png = pixmap
            .encode_png()
            .map_err(|e| RasterError::Encode(e.to_string()))?;

        Ok(RasterImage { width, height, png })
    }
}

/// Export settings
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub background: String,
    pub output_dir: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            background: DEFAULT_BACKGROUND.to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

/// Format of an exported file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExportFormat {
    #[strum(serialize = "png")]
    Png,
    #[strum(serialize = "svg")]
    Svg,
}

/// A file written by the exporter
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub width: u32,
    pub height: u32,
}

/// Writes drawings to disk as PNG, falling back to SVG
pub struct Exporter<R = ResvgRasterizer> {
    options: ExportOptions,
    rasterizer: R,
}

impl Exporter<ResvgRasterizer> {
    pub fn new(options: ExportOptions) -> Self {
        Self::with_rasterizer(options, ResvgRasterizer)
    }
}

impl<R: Rasterizer> Exporter<R> {
    pub fn with_rasterizer(options: ExportOptions, rasterizer: R) -> Self {
        Self {
            options,
            rasterizer,
        }
    }

    /// Export the drawing as a high-resolution PNG, or as the original SVG if
    /// rasterization fails
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::as_conversions
    )]
    pub fn export_raster(&self, drawing: &Drawing) -> Result<ExportedFile, ExportError> {
        let (svg, width, height) = match &drawing.content {
            DrawingContent::Vector { svg, width, height } => (svg, *width, *height),
            DrawingContent::Failed { message } => {
                return Err(ExportError::NothingToExport(message.clone()));
            }
        };

        let prepared = prepare_for_export(svg, width, height, &self.options.background);
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();

        match self.rasterizer.rasterize(&prepared, EXPORT_SCALE) {
            Ok(image) => {
                let path = self.output_path(&stamp, ExportFormat::Png);
                write_file(&path, &image.png)?;
                log_info!(
                    "Exported {}x{} PNG to {}",
                    image.width,
                    image.height,
                    path.display()
                );
                Ok(ExportedFile {
                    path,
                    format: ExportFormat::Png,
                    width: image.width,
                    height: image.height,
                })
            }
            Err(e) => {
                log_warn!("Raster export failed, saving vector document instead: {}", e);
                let path = self.output_path(&stamp, ExportFormat::Svg);
                write_file(&path, svg.as_bytes())?;
                Ok(ExportedFile {
                    path,
                    format: ExportFormat::Svg,
                    width: width.ceil() as u32,
                    height: height.ceil() as u32,
                })
            }
        }
    }

    fn output_path(&self, stamp: &str, format: ExportFormat) -> PathBuf {
        self.options
            .output_dir
            .join(format!("{FILE_STEM}-{stamp}.{format}"))
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    std::fs::write(path, bytes).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Copy of `svg` with explicit pixel size and a solid background
pub fn prepare_for_export(svg: &str, width: f32, height: f32, background: &str) -> String {
    let [x, y, w, h] = view_box(svg).unwrap_or([0.0, 0.0, width, height]);

    let mut prepared = set_root_attribute(svg, "width", &format_number(width));
    prepared = set_root_attribute(&prepared, "height", &format_number(height));
    if view_box(&prepared).is_none() {
        let value = [x, y, w, h]
            .iter()
            .map(|n| format_number(*n))
            .collect::<Vec<_>>()
            .join(" ");
        prepared = set_root_attribute(&prepared, "viewBox", &value);
    }

    let backdrop = format!(
        r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
        format_number(x),
        format_number(y),
        format_number(w),
        format_number(h),
        background
    );
    log_debug!("Prepared {}x{} document for export", width, height);
    insert_after_root(&prepared, &backdrop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::svg::root_attribute;

    #[test]
    fn test_prepare_sets_size_and_background() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100%" viewBox="0 0 40 20"><g/></svg>"#;
        let prepared = prepare_for_export(svg, 40.0, 20.0, "#ffffff");
        assert_eq!(root_attribute(&prepared, "width").as_deref(), Some("40"));
        assert_eq!(root_attribute(&prepared, "height").as_deref(), Some("20"));
        assert!(prepared.contains(r##"<rect x="0" y="0" width="40" height="20" fill="#ffffff"/><g/>"##));
    }

    #[test]
    fn test_prepare_adds_missing_view_box() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20"></svg>"#;
        let prepared = prepare_for_export(svg, 40.0, 20.0, "#000000");
        assert_eq!(
            root_attribute(&prepared, "viewBox").as_deref(),
            Some("0 0 40 20")
        );
    }

    #[test]
    fn test_external_reference_is_origin_restricted() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><image href="https://example.com/x.png" width="10" height="10"/></svg>"#;
        let err = ResvgRasterizer
            .rasterize(svg, EXPORT_SCALE)
            .expect_err("external reference should be refused");
        assert!(matches!(err, RasterError::OriginRestricted(_)));
    }
}
