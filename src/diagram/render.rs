//! Mermaid → SVG rendering with a resettable viewport

use super::svg::{format_number, set_root_attribute, view_box};
use crate::{log_debug, log_warn};

const MIN_ZOOM: f32 = 0.25;
const MAX_ZOOM: f32 = 4.0;

/// What a render attempt produced
#[derive(Debug, Clone, PartialEq)]
pub enum DrawingContent {
    /// Rendered vector drawing with its natural pixel size
    Vector { svg: String, width: f32, height: f32 },
    /// The description could not be rendered; shown inline instead of a drawing
    Failed { message: String },
}

/// A rendered diagram together with the description it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub source: String,
    pub content: DrawingContent,
}

impl Drawing {
    /// Render a Mermaid description
    pub fn from_source(source: &str) -> Self {
        if source.trim().is_empty() {
            return Self::failed(source, "Diagram description is empty");
        }

        let opts = mermaid_rs_renderer::RenderOptions {
            theme: mermaid_rs_renderer::Theme::modern(),
            layout: mermaid_rs_renderer::LayoutConfig::default(),
        };

        match mermaid_rs_renderer::render_with_options(source, opts) {
            Ok(svg) => {
                log_debug!("Mermaid SVG generated ({} bytes)", svg.len());
                Self::from_svg(source, svg)
            }
            Err(e) => {
                log_warn!("Mermaid render failed: {e}");
                Self::failed(source, &format!("Could not render diagram: {e}"))
            }
        }
    }

    /// Wrap an SVG document, measuring its natural size
    pub fn from_svg(source: &str, svg: String) -> Self {
        match measure(&svg) {
            Some((width, height)) => Self {
                source: source.to_string(),
                content: DrawingContent::Vector { svg, width, height },
            },
            None => Self::failed(source, "Rendered diagram has no measurable size"),
        }
    }

    pub fn failed(source: &str, message: &str) -> Self {
        Self {
            source: source.to_string(),
            content: DrawingContent::Failed {
                message: message.to_string(),
            },
        }
    }

    pub fn svg(&self) -> Option<&str> {
        match &self.content {
            DrawingContent::Vector { svg, .. } => Some(svg),
            DrawingContent::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.content {
            DrawingContent::Failed { message } => Some(message),
            DrawingContent::Vector { .. } => None,
        }
    }

    /// The drawing as seen through a viewport, for on-screen display
    pub fn view_svg(&self, viewport: &Viewport) -> Option<String> {
        let DrawingContent::Vector { svg, width, height } = &self.content else {
            return None;
        };
        if viewport.is_identity() {
            return Some(svg.clone());
        }

        let [x, y, w, h] = view_box(svg).unwrap_or([0.0, 0.0, *width, *height]);
        let zoomed = [
            x + viewport.pan_x,
            y + viewport.pan_y,
            w / viewport.zoom,
            h / viewport.zoom,
        ];
        let value = zoomed
            .iter()
            .map(|n| format_number(*n))
            .collect::<Vec<_>>()
            .join(" ");
        Some(set_root_attribute(svg, "viewBox", &value))
    }
}

/// Natural size of an SVG document as resvg sees it
fn measure(svg: &str) -> Option<(f32, f32)> {
    let tree = resvg::usvg::Tree::from_str(svg, &resvg::usvg::Options::default()).ok()?;
    let size = tree.size();
    (size.width() > 0.0 && size.height() > 0.0).then(|| (size.width(), size.height()))
}

/// Zoom and pan applied when viewing a drawing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl Viewport {
    pub fn zoom_by(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[allow(clippy::float_cmp)]
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// Holds the current drawing; re-rendering only happens for a new source
#[derive(Debug, Default)]
pub struct DiagramRenderer {
    current: Option<Drawing>,
    viewport: Viewport,
}

impl DiagramRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `source`, replacing the current drawing and resetting the
    /// viewport only when the source differs from what is on screen
    pub fn render(&mut self, source: &str) -> &Drawing {
        if self.current.as_ref().is_none_or(|d| d.source != source) {
            self.viewport.reset();
            self.current = None;
        }
        self.current
            .get_or_insert_with(|| Drawing::from_source(source))
    }

    pub fn current(&self) -> Option<&Drawing> {
        self.current.as_ref()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// Current drawing as seen through the viewport
    pub fn view(&self) -> Option<String> {
        self.current.as_ref()?.view_svg(&self.viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100" viewBox="0 0 200 100"><rect width="200" height="100" fill="red"/></svg>"#;

    #[test]
    fn test_from_svg_measures_size() {
        let drawing = Drawing::from_svg("src", SVG.to_string());
        assert_eq!(
            drawing.content,
            DrawingContent::Vector {
                svg: SVG.to_string(),
                width: 200.0,
                height: 100.0
            }
        );
    }

    #[test]
    fn test_unparseable_svg_is_failed_drawing() {
        let drawing = Drawing::from_svg("src", "not svg".to_string());
        assert!(drawing.error().is_some());
        assert!(drawing.svg().is_none());
    }

    #[test]
    fn test_empty_source_reports_inline_error() {
        let mut renderer = DiagramRenderer::new();
        let drawing = renderer.render("   ");
        assert_eq!(drawing.error(), Some("Diagram description is empty"));
    }

    #[test]
    fn test_viewport_zoom_is_clamped() {
        let mut viewport = Viewport::default();
        viewport.zoom_by(100.0);
        assert!((viewport.zoom - MAX_ZOOM).abs() < f32::EPSILON);
        viewport.zoom_by(0.0001);
        assert!((viewport.zoom - MIN_ZOOM).abs() < f32::EPSILON);
        viewport.reset();
        assert!(viewport.is_identity());
    }

    #[test]
    fn test_view_svg_applies_zoom_and_pan() {
        let drawing = Drawing::from_svg("src", SVG.to_string());
        let mut viewport = Viewport::default();
        assert_eq!(drawing.view_svg(&viewport).as_deref(), Some(SVG));

        viewport.zoom_by(2.0);
        viewport.pan_by(10.0, 5.0);
        let view = drawing.view_svg(&viewport).expect("vector drawing has a view");
        assert!(view.contains(r#"viewBox="10 5 100 50""#));
    }
}
