//! Diagram rendering and export

pub mod export;
pub mod render;
pub mod svg;

pub use export::{
    DEFAULT_BACKGROUND, EXPORT_SCALE, ExportError, ExportFormat, ExportOptions,
    ExportedFile, Exporter, RasterError, RasterImage, Rasterizer, ResvgRasterizer,
    prepare_for_export,
};
pub use render::{DiagramRenderer, Drawing, DrawingContent, Viewport};
