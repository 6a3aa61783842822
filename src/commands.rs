use crate::cli::{AnalyzeArgs, ConfigArgs, ExportArgs, RenderArgs};
use crate::client::{AnalysisClient, Analyzer, GeminiBackend, InlineImage};
use crate::config::Config;
use crate::diagram::{DiagramRenderer, Drawing, EXPORT_SCALE, ExportOptions, Exporter};
use crate::orchestrator::connectivity::probe;
use crate::orchestrator::{
    AnalysisError, AnalysisState, ConnectivityMonitor, ErrorCategory, Orchestrator,
};
use crate::types::AnalysisResult;
use crate::watcher::{SourceEvent, SourceWatcher};
use crate::{log_debug, trace_debug, trace_info, trace_warn, ui};
use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

type GeminiClient = AnalysisClient<GeminiBackend>;

/// Build the model client from configuration
fn build_client(config: &Config) -> Result<Arc<GeminiClient>> {
    let backend = GeminiBackend::new(config.provider.clone())?;
    Ok(Arc::new(
        AnalysisClient::new(backend).with_max_diagram_nodes(config.analysis.max_diagram_nodes),
    ))
}

/// Start the connectivity monitor, probing once before returning
async fn start_connectivity(config: &Config) -> ConnectivityMonitor {
    if !config.connectivity.enabled {
        return ConnectivityMonitor::always_online();
    }
    let target = config.connectivity.probe_host.clone();
    let interval = config.probe_interval();
    let monitor = ConnectivityMonitor::new(probe(&target, interval).await);
    trace_debug!(target: "codeflow::connectivity", host = %target, state = ?monitor.current(), "Initial probe");
    // Detached; it lives as long as the runtime
    let _probe = monitor.spawn_probe(target, interval);
    monitor
}

async fn build_orchestrator(
    config: &Config,
    client: Arc<GeminiClient>,
) -> Orchestrator<GeminiClient> {
    let connectivity = start_connectivity(config).await;
    Orchestrator::with_shared(client, connectivity).with_timeout(config.timeout())
}

fn export_options(config: &Config, args: &ExportArgs) -> ExportOptions {
    let mut options = config.export_options();
    if let Some(dir) = &args.output_dir {
        options.output_dir.clone_from(dir);
    }
    options
}

/// Read source text from a file, or stdin for `None` / `-`
async fn read_source(file: Option<&Path>) -> Result<String> {
    let source = match file {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read '{}'", path.display()))?,
        _ => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("Failed to read source from stdin")?;
            buffer
        }
    };
    if source.trim().is_empty() {
        return Err(anyhow!("Nothing to analyze: the input is empty"));
    }
    Ok(source)
}

/// Export a drawing, creating the output directory if needed
fn export_drawing(drawing: &Drawing, options: ExportOptions) -> Result<()> {
    std::fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "Failed to create output directory '{}'",
            options.output_dir.display()
        )
    })?;
    let file = Exporter::new(options).export_raster(drawing)?;
    ui::print_export(&file);
    Ok(())
}

/// Show a finished analysis and its flowchart, exporting on request
fn present_result(
    result: &AnalysisResult,
    renderer: &mut DiagramRenderer,
    export: Option<ExportOptions>,
) {
    ui::print_analysis(result);
    let drawing = renderer.render(&result.diagram_source);
    ui::print_drawing(drawing);
    if let Some(options) = export
        && let Err(e) = export_drawing(drawing, options)
    {
        ui::print_error(&format!("Export failed: {e}"));
    }
}

/// Handle the 'analyze' command
pub async fn handle_analyze_command(args: AnalyzeArgs) -> Result<()> {
    let config = Config::load()?;
    let client = build_client(&config)?;

    let source = if let Some(image_path) = &args.image {
        let image = InlineImage::from_path(image_path).await?;
        let spinner = ui::create_spinner("Extracting code from image...");
        let extracted = client.extract_code(image).await;
        spinner.finish_and_clear();
        extracted?
    } else {
        read_source(args.file.as_deref()).await?
    };

    let orchestrator = build_orchestrator(&config, client).await;
    let spinner = ui::create_spinner("Analyzing code...");

    let analysis = orchestrator.analyze(&source);
    tokio::pin!(analysis);
    let outcome = tokio::select! {
        outcome = &mut analysis => outcome,
        _ = tokio::signal::ctrl_c() => {
            orchestrator.stop();
            analysis.await
        }
    };
    spinner.finish_and_clear();

    let result = match outcome {
        Ok(result) => result,
        Err(e) if e.category() == ErrorCategory::Cancelled => {
            ui::print_analysis_error(&e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&*result)?);
        if args.export.export {
            let drawing = Drawing::from_source(&result.diagram_source);
            export_drawing(&drawing, export_options(&config, &args.export))?;
        }
        return Ok(());
    }

    let export = args
        .export
        .export
        .then(|| export_options(&config, &args.export));
    let mut renderer = DiagramRenderer::new();
    present_result(&result, &mut renderer, export);
    Ok(())
}

/// Handle the 'ocr' command
pub async fn handle_ocr_command(image_path: &Path) -> Result<()> {
    let config = Config::load()?;
    let client = build_client(&config)?;
    let image = InlineImage::from_path(image_path).await?;

    let spinner = ui::create_spinner("Extracting code from image...");
    let extracted = client.extract_code(image).await;
    spinner.finish_and_clear();

    println!("{}", extracted?);
    Ok(())
}

/// Handle the 'render' command
pub fn handle_render_command(args: &RenderArgs) -> Result<()> {
    let config = Config::load()?;
    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read '{}'", args.file.display()))?;

    let mut renderer = DiagramRenderer::new();
    let drawing = renderer.render(&source).clone();
    if let Some(message) = drawing.error() {
        return Err(anyhow!("Diagram could not be rendered: {message}"));
    }
    ui::print_drawing(&drawing);

    let viewport = renderer.viewport_mut();
    viewport.zoom_by(args.zoom);
    viewport.pan_by(args.pan_x, args.pan_y);

    if args.svg
        && let Some(view) = renderer.view()
    {
        println!("{view}");
    }

    if args.export.export {
        export_drawing(&drawing, export_options(&config, &args.export))?;
    }
    Ok(())
}

fn spawn_analysis<A: Analyzer>(orchestrator: &Arc<Orchestrator<A>>, file: &Path) {
    let orchestrator = Arc::clone(orchestrator);
    let file = file.to_path_buf();
    tokio::spawn(async move {
        match tokio::fs::read_to_string(&file).await {
            Ok(source) if source.trim().is_empty() => {
                ui::print_warning(&format!("{} is empty, skipping", file.display()));
            }
            Ok(source) => {
                // The outcome is published through the state channel
                let _ = orchestrator.analyze(&source).await;
            }
            Err(e) => ui::print_error(&format!("Failed to read '{}': {e}", file.display())),
        }
    });
}

fn present_state(
    state: &AnalysisState,
    renderer: &mut DiagramRenderer,
    export: Option<&ExportOptions>,
) {
    if state.loading {
        ui::print_info("Analyzing...");
        return;
    }
    match (&state.result, &state.error) {
        (Some(result), _) => present_result(result, renderer, export.cloned()),
        (None, Some(AnalysisError::Superseded)) => {
            log_debug!("Ignoring superseded request state");
        }
        (None, Some(error)) => ui::print_analysis_error(error),
        (None, None) => {}
    }
}

/// Handle the 'watch' command
pub async fn handle_watch_command(file: PathBuf, export: ExportArgs) -> Result<()> {
    let config = Config::load()?;
    let client = build_client(&config)?;
    let orchestrator = Arc::new(build_orchestrator(&config, client).await);
    let export_options = export.export.then(|| export_options(&config, &export));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let watcher = SourceWatcher::new(&file, event_tx)?;
    trace_info!(target: "codeflow::watch", path = %watcher.path().display(), "Watching for changes");
    ui::print_info(&format!(
        "Watching {} (Ctrl-C stops an analysis, or exits when idle)",
        watcher.path().display()
    ));

    let mut state_rx = orchestrator.subscribe();
    let mut renderer = DiagramRenderer::new();
    spawn_analysis(&orchestrator, watcher.path());

    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(SourceEvent::Changed(path)) => {
                    log_debug!("{} changed", path.display());
                    spawn_analysis(&orchestrator, &path);
                }
                Some(SourceEvent::Removed(path)) => {
                    ui::print_warning(&format!("{} was removed; waiting for it to return", path.display()));
                }
                Some(SourceEvent::WatcherError(e)) => {
                    trace_warn!(target: "codeflow::watch", error = %e, "Watcher error");
                    ui::print_warning(&format!("Watcher error: {e}"));
                }
                None => break,
            },
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                present_state(&state, &mut renderer, export_options.as_ref());
            }
            _ = tokio::signal::ctrl_c() => {
                if !orchestrator.stop() {
                    break;
                }
            }
        }
    }

    ui::print_info("Stopped watching.");
    Ok(())
}

/// Handle the 'config' command
pub fn handle_config_command(args: ConfigArgs) -> Result<()> {
    let ConfigArgs {
        api_key,
        model,
        timeout,
        max_nodes,
        output_dir,
        param,
        print,
    } = args;

    let config_path = Config::get_config_path()?;
    let mut config = Config::load_from(&config_path)?;
    let original = config.clone();

    let additional_params = param.as_deref().map(parse_additional_params);
    config.update(api_key, model, timeout, max_nodes, output_dir, additional_params)?;

    if config != original {
        config.save_to(&config_path)?;
        ui::print_success("Configuration updated successfully.");
    }

    if print || config == original {
        print_configuration(&config);
    }
    Ok(())
}

fn parse_additional_params(params: &[String]) -> HashMap<String, String> {
    params
        .iter()
        .filter_map(|param| {
            param
                .split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("••••{tail}")
}

fn print_configuration(config: &Config) {
    let (pr, pg, pb) = ui::rgb::ELECTRIC_PURPLE;
    let cyan = ui::rgb::NEON_CYAN;
    let coral = ui::rgb::CORAL;
    let yellow = ui::rgb::ELECTRIC_YELLOW;
    let green = ui::rgb::SUCCESS_GREEN;
    let dim = ui::rgb::DIM_WHITE;
    let dim_sep = ui::rgb::DIM_SEPARATOR;

    println!();
    println!(
        "{}  {}  {}",
        "━━━".truecolor(pr, pg, pb),
        "CODEFLOW CONFIGURATION"
            .truecolor(cyan.0, cyan.1, cyan.2)
            .bold(),
        "━━━".truecolor(pr, pg, pb)
    );
    println!();

    print_section_header("PROVIDER");
    print_config_row("Model", &config.provider.model, cyan, true);
    print_config_row("Endpoint", &config.provider.endpoint, dim, false);
    print_config_row("API Key", &mask_key(&config.provider.api_key), yellow, false);
    print_config_row(
        "Temperature",
        &config.provider.temperature.to_string(),
        coral,
        false,
    );
    print_config_row(
        "Max Tokens",
        &config.provider.max_output_tokens.to_string(),
        coral,
        false,
    );
    if !config.provider.additional_params.is_empty() {
        println!(
            "  {} {}",
            "Params".truecolor(dim.0, dim.1, dim.2),
            "─".truecolor(dim_sep.0, dim_sep.1, dim_sep.2)
        );
        let mut params: Vec<_> = config.provider.additional_params.iter().collect();
        params.sort();
        for (key, value) in params {
            println!(
                "    {} {} {}",
                key.truecolor(cyan.0, cyan.1, cyan.2),
                "→".truecolor(dim_sep.0, dim_sep.1, dim_sep.2),
                value.truecolor(dim.0, dim.1, dim.2)
            );
        }
    }

    println!();
    print_section_header("ANALYSIS");
    print_config_row(
        "Timeout",
        &format!("{}s", config.analysis.timeout_seconds),
        coral,
        false,
    );
    print_config_row(
        "Max Nodes",
        &config.analysis.max_diagram_nodes.to_string(),
        coral,
        false,
    );

    println!();
    print_section_header("EXPORT");
    print_config_row("Scale", &format!("{EXPORT_SCALE}x"), coral, false);
    print_config_row("Background", &config.export.background, dim, false);
    print_config_row(
        "Output Dir",
        &config.export.output_dir.display().to_string(),
        dim,
        false,
    );

    println!();
    print_section_header("CONNECTIVITY");
    print_config_row(
        "Probe",
        if config.connectivity.enabled {
            "enabled"
        } else {
            "disabled"
        },
        if config.connectivity.enabled { green } else { dim },
        false,
    );
    print_config_row("Host", &config.connectivity.probe_host, dim, false);

    println!();
    println!(
        "{}",
        "─".repeat(40).truecolor(dim_sep.0, dim_sep.1, dim_sep.2)
    );
    println!();
}

fn print_section_header(name: &str) {
    let (pr, pg, pb) = ui::rgb::ELECTRIC_PURPLE;
    let (sr, sg, sb) = ui::rgb::DIM_SEPARATOR;
    println!(
        "{} {} {}",
        "─".truecolor(pr, pg, pb),
        name.truecolor(pr, pg, pb).bold(),
        "─".repeat(30 - name.len().min(28)).truecolor(sr, sg, sb)
    );
}

fn print_config_row(label: &str, value: &str, value_color: (u8, u8, u8), highlight: bool) {
    let (dr, dg, db) = ui::rgb::DIM_WHITE;
    let label_styled = format!("{label:>12}").truecolor(dr, dg, db);

    let value_styled = if highlight {
        value
            .truecolor(value_color.0, value_color.1, value_color.2)
            .bold()
    } else {
        value.truecolor(value_color.0, value_color.1, value_color.2)
    };

    println!("{label_styled}  {value_styled}");
}
