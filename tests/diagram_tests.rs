use codeflow::diagram::{
    DiagramRenderer, Drawing, ExportError, ExportFormat, ExportOptions, Exporter, RasterError,
    RasterImage, Rasterizer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const FLOWCHART: &str = "graph TD\n  A[Start] --> B{Done?}\n  B -->|No| A\n  B -->|Yes| C[End]";

const BOX_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="120" height="80" viewBox="0 0 120 80"><rect x="10" y="10" width="100" height="60" fill="#6366f1"/></svg>"##;

/// Rasterizer that always refuses, counting how often it was asked
struct RefusingRasterizer {
    calls: Arc<AtomicUsize>,
}

impl Rasterizer for RefusingRasterizer {
    fn rasterize(&self, _svg: &str, _scale: f32) -> Result<RasterImage, RasterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RasterError::OriginRestricted("tainted canvas".to_string()))
    }
}

fn options_in(dir: &TempDir) -> ExportOptions {
    ExportOptions {
        output_dir: dir.path().to_path_buf(),
        ..ExportOptions::default()
    }
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("Failed to read output directory")
        .map(|entry| entry.expect("Failed to read directory entry").path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(extension))
        .collect()
}

#[test]
fn test_png_export_is_three_times_natural_size() {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let drawing = Drawing::from_svg(FLOWCHART, BOX_SVG.to_string());

    let exported = Exporter::new(options_in(&dir))
        .export_raster(&drawing)
        .expect("export should succeed");

    assert_eq!(exported.format, ExportFormat::Png);
    assert_eq!((exported.width, exported.height), (360, 240));

    let bytes = std::fs::read(&exported.path).expect("Failed to read exported PNG");
    let pixmap =
        resvg::tiny_skia::Pixmap::decode_png(&bytes).expect("exported file should be a PNG");
    assert_eq!((pixmap.width(), pixmap.height()), (360, 240));

    let name = exported
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .expect("exported file has a name");
    assert!(name.starts_with("codeflow-diagram-"));
    assert!(name.ends_with(".png"));
    assert!(files_with_extension(dir.path(), "svg").is_empty());
}

#[test]
fn test_exported_png_has_opaque_background() {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let drawing = Drawing::from_svg(FLOWCHART, BOX_SVG.to_string());

    let exported = Exporter::new(options_in(&dir))
        .export_raster(&drawing)
        .expect("export should succeed");

    let bytes = std::fs::read(&exported.path).expect("Failed to read exported PNG");
    let pixmap =
        resvg::tiny_skia::Pixmap::decode_png(&bytes).expect("exported file should be a PNG");
    // Corner lies outside the drawn rect, so only the background covers it
    let corner = pixmap.pixel(0, 0).expect("corner pixel exists");
    assert_eq!(
        (corner.red(), corner.green(), corner.blue(), corner.alpha()),
        (255, 255, 255, 255)
    );
}

#[test]
fn test_refused_rasterization_writes_vector_once() {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let calls = Arc::new(AtomicUsize::new(0));
    let exporter = Exporter::with_rasterizer(
        options_in(&dir),
        RefusingRasterizer {
            calls: Arc::clone(&calls),
        },
    );
    let drawing = Drawing::from_svg(FLOWCHART, BOX_SVG.to_string());

    let exported = exporter
        .export_raster(&drawing)
        .expect("fallback export should succeed");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(exported.format, ExportFormat::Svg);
    assert!(files_with_extension(dir.path(), "png").is_empty());

    let svgs = files_with_extension(dir.path(), "svg");
    assert_eq!(svgs.len(), 1);
    let written = std::fs::read_to_string(&svgs[0]).expect("Failed to read fallback SVG");
    assert_eq!(written, BOX_SVG);
}

#[test]
fn test_external_reference_falls_back_to_vector() {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="50" height="50"><style>@import url("https://fonts.example.com/f.css");</style><rect width="50" height="50"/></svg>"#;
    let drawing = Drawing::from_svg(FLOWCHART, svg.to_string());

    let exported = Exporter::new(options_in(&dir))
        .export_raster(&drawing)
        .expect("fallback export should succeed");

    assert_eq!(exported.format, ExportFormat::Svg);
    assert_eq!(files_with_extension(dir.path(), "svg").len(), 1);
    assert!(files_with_extension(dir.path(), "png").is_empty());
}

#[test]
fn test_failed_drawing_has_nothing_to_export() {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let drawing = Drawing::failed(FLOWCHART, "Could not render diagram");

    let err = Exporter::new(options_in(&dir))
        .export_raster(&drawing)
        .expect_err("failed drawing cannot be exported");

    assert!(matches!(err, ExportError::NothingToExport(_)));
    assert_eq!(
        std::fs::read_dir(dir.path())
            .expect("Failed to read output directory")
            .count(),
        0
    );
}

#[test]
fn test_flowchart_renders_to_svg() {
    let drawing = Drawing::from_source(FLOWCHART);
    let svg = drawing.svg().expect("flowchart should render");
    assert!(svg.contains("<svg"));
    assert!(drawing.error().is_none());
}

#[test]
fn test_renderer_keeps_viewport_for_same_source() {
    let mut renderer = DiagramRenderer::new();
    renderer.render(FLOWCHART);
    renderer.viewport_mut().zoom_by(2.0);
    renderer.viewport_mut().pan_by(5.0, 5.0);

    let first = renderer.render(FLOWCHART).clone();
    assert!(!renderer.viewport().is_identity());
    assert_eq!(renderer.current(), Some(&first));

    renderer.render("graph LR\n  X --> Y");
    assert!(renderer.viewport().is_identity());
    assert_eq!(
        renderer.current().map(|d| d.source.as_str()),
        Some("graph LR\n  X --> Y")
    );
}
