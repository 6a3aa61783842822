use crate::commands;
use crate::log_debug;
use crate::ui;
use clap::builder::{Styles, styling::AnsiColor};
use clap::{Args, Parser, Subcommand, crate_version};
use std::path::PathBuf;

const LOG_FILE: &str = "codeflow-debug.log";

/// CLI structure defining the available commands and global arguments
#[derive(Parser)]
#[command(
    author,
    version = crate_version!(),
    about = "Codeflow: turn source code into flowcharts and complexity estimates",
    long_about = "Codeflow sends a code snippet (or a screenshot of one) to a hosted model and returns a plain-language explanation, Big-O estimates, an optimization tip and a Mermaid flowchart it can render and export.",
    disable_version_flag = true,
    styles = get_styles(),
)]
pub struct Cli {
    /// Subcommands available for the CLI
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log debug messages to a file
    #[arg(
        short = 'l',
        long = "log",
        global = true,
        help = "Log debug messages to a file"
    )]
    pub log: bool,

    /// Specify a custom log file path
    #[arg(
        long = "log-file",
        global = true,
        help = "Specify a custom log file path (`-` for stderr)"
    )]
    pub log_file: Option<String>,

    /// Suppress non-essential output (spinners, waiting messages, etc.)
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress non-essential output"
    )]
    pub quiet: bool,

    /// Display the version
    #[arg(
        short = 'v',
        long = "version",
        global = true,
        help = "Display the version"
    )]
    pub version: bool,
}

/// Enumeration of available subcommands
#[derive(Subcommand)]
#[command(subcommand_negates_reqs = true)]
#[command(subcommand_precedence_over_arg = true)]
pub enum Commands {
    /// Analyze a code snippet
    #[command(
        about = "Analyze source code",
        long_about = "Explain a code snippet, estimate its time and space complexity and draw its control flow. Reads the file argument, an image of code (--image) or stdin. Press Ctrl-C to stop a running analysis."
    )]
    Analyze(AnalyzeArgs),

    /// Extract code from an image
    #[command(
        about = "Extract code from an image",
        long_about = "Send a screenshot or photo of code to the model and print the extracted source text."
    )]
    Ocr {
        /// Image file (png, jpg, webp, gif, heic)
        image: PathBuf,
    },

    /// Render a Mermaid flowchart
    #[command(
        about = "Render a Mermaid flowchart",
        long_about = "Render a Mermaid flowchart description to SVG, optionally zoomed and panned, and export it as a high-resolution PNG."
    )]
    Render(RenderArgs),

    /// Re-analyze a file whenever it changes
    #[command(
        about = "Watch a file and re-analyze on change",
        long_about = "Analyze a file and analyze it again every time it is saved. A new save replaces any analysis still running. Ctrl-C stops a running analysis, or exits when idle."
    )]
    Watch {
        /// Source file to watch
        file: PathBuf,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Configure codeflow
    #[command(about = "Configure provider, timeout and export settings")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Source file to analyze; reads stdin when omitted or `-`
    pub file: Option<PathBuf>,

    /// Extract the code from an image first
    #[arg(long, conflicts_with = "file", help = "Extract the code from an image first")]
    pub image: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long, help = "Print the result as JSON")]
    pub json: bool,

    #[command(flatten)]
    pub export: ExportArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// Export the flowchart as PNG (SVG if rasterizing fails)
    #[arg(
        short,
        long,
        help = "Export the flowchart as PNG (falls back to SVG)"
    )]
    pub export: bool,

    /// Directory for exported files
    #[arg(long, help = "Directory for exported files")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Mermaid file to render
    pub file: PathBuf,

    /// Zoom factor applied to the view
    #[arg(long, default_value_t = 1.0, help = "Zoom factor applied to the view")]
    pub zoom: f32,

    /// Horizontal pan in diagram units
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub pan_x: f32,

    /// Vertical pan in diagram units
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub pan_y: f32,

    /// Print the viewed SVG to stdout
    #[arg(long, help = "Print the viewed SVG to stdout")]
    pub svg: bool,

    #[command(flatten)]
    pub export: ExportArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Set the API key
    #[arg(long, help = "Set the API key")]
    pub api_key: Option<String>,

    /// Set the model
    #[arg(long, help = "Set the model")]
    pub model: Option<String>,

    /// Set the analysis timeout in seconds
    #[arg(long, help = "Set the analysis timeout in seconds")]
    pub timeout: Option<u64>,

    /// Set the maximum number of flowchart nodes
    #[arg(long, help = "Set the maximum number of flowchart nodes")]
    pub max_nodes: Option<usize>,

    /// Set the default export directory
    #[arg(long, help = "Set the default export directory")]
    pub output_dir: Option<PathBuf>,

    /// Set additional generation parameters
    #[arg(
        long,
        help = "Set additional generation parameters (key=value)"
    )]
    pub param: Option<Vec<String>>,

    /// Print the current configuration
    #[arg(short, long, help = "Print the current configuration")]
    pub print: bool,
}

/// Define custom styles for Clap
fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Magenta.on_default().bold())
        .usage(AnsiColor::Cyan.on_default().bold())
        .literal(AnsiColor::Green.on_default().bold())
        .placeholder(AnsiColor::Yellow.on_default())
        .valid(AnsiColor::Blue.on_default().bold())
        .invalid(AnsiColor::Red.on_default().bold())
        .error(AnsiColor::Red.on_default().bold())
}

/// Parse the command-line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Main function to parse arguments and handle the command
pub async fn main() -> anyhow::Result<()> {
    let cli = parse_args();

    if cli.version {
        ui::print_version(crate_version!());
        return Ok(());
    }

    if cli.log {
        crate::logger::enable_logging();
        match cli.log_file.as_deref().unwrap_or(LOG_FILE) {
            "-" => crate::logger::set_log_to_stderr(true),
            log_file => crate::logger::set_log_file(log_file)?,
        }

        if let Ok(config) = crate::config::Config::load() {
            crate::logger::set_verbose_logging(config.logging.verbose_logging);
            if config.logging.verbose_logging {
                log_debug!("Verbose logging enabled - will show HTTP and watcher internals");
            }
        }
    }

    if cli.quiet {
        ui::set_quiet_mode(true);
    }

    if let Some(command) = cli.command {
        handle_command(command).await
    } else {
        let _ = Cli::parse_from(["codeflow", "--help"]);
        Ok(())
    }
}

/// Dispatch a parsed subcommand to its handler
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Analyze(args) => {
            log_debug!("Handling 'analyze' command with args: {:?}", args);
            commands::handle_analyze_command(args).await
        }
        Commands::Ocr { image } => {
            log_debug!("Handling 'ocr' command for {}", image.display());
            commands::handle_ocr_command(&image).await
        }
        Commands::Render(args) => {
            log_debug!("Handling 'render' command with args: {:?}", args);
            commands::handle_render_command(&args)
        }
        Commands::Watch { file, export } => {
            log_debug!("Handling 'watch' command for {}", file.display());
            commands::handle_watch_command(file, export).await
        }
        Commands::Config(args) => {
            log_debug!("Handling 'config' command");
            commands::handle_config_command(args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze_with_export() {
        let cli = Cli::try_parse_from(["codeflow", "analyze", "main.rs", "--export", "--json"])
            .expect("analyze arguments should parse");
        let Some(Commands::Analyze(args)) = cli.command else {
            panic!("expected analyze command");
        };
        assert_eq!(args.file, Some(PathBuf::from("main.rs")));
        assert!(args.json);
        assert!(args.export.export);
    }

    #[test]
    fn test_image_conflicts_with_file() {
        assert!(
            Cli::try_parse_from(["codeflow", "analyze", "main.rs", "--image", "shot.png"]).is_err()
        );
    }

    #[test]
    fn test_render_accepts_negative_pan() {
        let cli = Cli::try_parse_from([
            "codeflow", "render", "flow.mmd", "--zoom", "2", "--pan-x", "-10",
        ])
        .expect("render arguments should parse");
        let Some(Commands::Render(args)) = cli.command else {
            panic!("expected render command");
        };
        assert!((args.zoom - 2.0).abs() < f32::EPSILON);
        assert!((args.pan_x + 10.0).abs() < f32::EPSILON);
    }
}
