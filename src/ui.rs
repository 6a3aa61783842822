use crate::diagram::{Drawing, DrawingContent, ExportFormat, ExportedFile};
use crate::orchestrator::{AnalysisError, ErrorCategory};
use crate::types::{AnalysisResult, format_analysis};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::fmt::Write;
use std::time::Duration;

// RGB tuples for the `colored` crate's `.truecolor()` method
pub mod rgb {
    pub const ELECTRIC_PURPLE: (u8, u8, u8) = (225, 53, 255);
    pub const NEON_CYAN: (u8, u8, u8) = (128, 255, 234);
    pub const CORAL: (u8, u8, u8) = (255, 106, 193);
    pub const ELECTRIC_YELLOW: (u8, u8, u8) = (241, 250, 140);
    pub const SUCCESS_GREEN: (u8, u8, u8) = (80, 250, 123);
    pub const DIM_WHITE: (u8, u8, u8) = (180, 180, 190);
    pub const DIM_SEPARATOR: (u8, u8, u8) = (60, 60, 70);
}

/// Track quiet mode state
static QUIET_MODE: std::sync::LazyLock<Mutex<bool>> =
    std::sync::LazyLock::new(|| Mutex::new(false));

/// Enable or disable quiet mode
pub fn set_quiet_mode(enabled: bool) {
    *QUIET_MODE.lock() = enabled;
}

/// Check if quiet mode is enabled
pub fn is_quiet_mode() -> bool {
    *QUIET_MODE.lock()
}

pub fn create_spinner(message: &str) -> ProgressBar {
    if is_quiet_mode() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("✦✧✶✷✸✹✺✻✼✽")
        .template("{spinner} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn print_info(message: &str) {
    if !is_quiet_mode() {
        println!("{}", message.cyan().bold());
    }
}

pub fn print_warning(message: &str) {
    if !is_quiet_mode() {
        println!("{}", message.yellow().bold());
    }
}

pub fn print_error(message: &str) {
    // Always print errors, even in quiet mode
    eprintln!("{}", message.red().bold());
}

pub fn print_success(message: &str) {
    if !is_quiet_mode() {
        println!("{}", message.green().bold());
    }
}

pub fn print_version(version: &str) {
    if !is_quiet_mode() {
        println!(
            "{} {} {}",
            create_gradient_text("⬡ Codeflow"),
            "version".cyan(),
            version.green()
        );
    }
}

/// Print an analysis result as colored sections
pub fn print_analysis(result: &AnalysisResult) {
    if is_quiet_mode() {
        return;
    }
    if colored::control::SHOULD_COLORIZE.should_colorize() {
        println!("{}", render_analysis(result));
    } else {
        print!("{}", format_analysis(result));
    }
}

/// Colored text rendition of an analysis result
pub fn render_analysis(result: &AnalysisResult) -> String {
    let (pr, pg, pb) = rgb::ELECTRIC_PURPLE;
    let (cr, cg, cb) = rgb::NEON_CYAN;
    let (yr, yg, yb) = rgb::ELECTRIC_YELLOW;
    let (wr, wg, wb) = rgb::DIM_WHITE;

    let mut out = String::new();
    let _ = writeln!(out, "{}", "Explanation".truecolor(pr, pg, pb).bold());
    for line in textwrap::wrap(&result.explanation, 78) {
        let _ = writeln!(out, "{line}");
    }

    let _ = writeln!(
        out,
        "\n{}  {}\n{} {}",
        "Time complexity:".truecolor(cr, cg, cb).bold(),
        result.time_complexity,
        "Space complexity:".truecolor(cr, cg, cb).bold(),
        result.space_complexity
    );

    let _ = writeln!(out, "\n{}", "Optimization tip".truecolor(yr, yg, yb).bold());
    for line in textwrap::wrap(&result.optimization_tip, 78) {
        let _ = writeln!(out, "{line}");
    }

    let _ = writeln!(out, "\n{}", "Flowchart".truecolor(pr, pg, pb).bold());
    let _ = write!(out, "{}", result.diagram_source.truecolor(wr, wg, wb));
    out
}

/// Report the outcome of rendering a diagram
pub fn print_drawing(drawing: &Drawing) {
    match &drawing.content {
        DrawingContent::Vector { width, height, .. } => {
            print_info(&format!("Diagram rendered ({width:.0}x{height:.0})"));
        }
        DrawingContent::Failed { message } => {
            print_warning(&format!("Diagram could not be rendered: {message}"));
        }
    }
}

/// Report a file written by the exporter
pub fn print_export(file: &ExportedFile) {
    match file.format {
        ExportFormat::Png => print_success(&format!(
            "Saved {}x{} PNG to {}",
            file.width,
            file.height,
            file.path.display()
        )),
        ExportFormat::Svg => print_warning(&format!(
            "High-resolution export failed; saved the vector diagram to {}",
            file.path.display()
        )),
    }
}

/// Print an orchestrator error, styled by its category
pub fn print_analysis_error(error: &AnalysisError) {
    match error.category() {
        ErrorCategory::Connectivity => print_error(&format!("⚡ {error}")),
        ErrorCategory::Timeout => print_error(&format!("⏱ {error}")),
        ErrorCategory::Cancelled => print_warning(&error.to_string()),
        ErrorCategory::Unexpected => print_error(&error.to_string()),
    }
}

/// Create gradient text with Electric Purple -> Neon Cyan
pub fn create_gradient_text(text: &str) -> String {
    let gradient = [
        rgb::ELECTRIC_PURPLE,
        (200, 100, 255),
        (180, 150, 250),
        (150, 200, 245),
        rgb::NEON_CYAN,
    ];

    apply_gradient(text, &gradient)
}

fn apply_gradient(text: &str, gradient: &[(u8, u8, u8)]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let chars_len = chars.len();
    let gradient_len = gradient.len();

    let mut result = String::new();

    if chars_len == 0 || gradient_len == 0 {
        return result;
    }

    for (i, c) in chars.iter().enumerate() {
        let index = if chars_len == 1 {
            0
        } else {
            i * (gradient_len - 1) / (chars_len - 1)
        };
        if let Some(&(r, g, b)) = gradient.get(index) {
            let _ = write!(result, "{}", c.to_string().truecolor(r, g, b));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_analysis_contains_sections() {
        colored::control::set_override(false);
        let result = AnalysisResult {
            explanation: "Counts words.".to_string(),
            diagram_source: "graph TD\n  A-->B".to_string(),
            time_complexity: "O(n)".to_string(),
            space_complexity: "O(1)".to_string(),
            optimization_tip: "None needed.".to_string(),
        };
        let text = render_analysis(&result);
        assert!(text.contains("Explanation\nCounts words."));
        assert!(text.contains("Time complexity:  O(n)"));
        assert!(text.contains("graph TD\n  A-->B"));
    }

    #[test]
    fn test_gradient_keeps_every_character() {
        colored::control::set_override(false);
        assert_eq!(create_gradient_text("flow"), "flow");
        assert_eq!(create_gradient_text(""), "");
    }
}
