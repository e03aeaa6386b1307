use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use styleme_capture::{
    AnalysisResult, CaptureAppConfig, CaptureKind, CaptureSession, CaptureSessionBuilder, Facing,
    HttpAnalysisEndpoint, LoggingObserver, MediaDeviceProvider, MockMediaDevices,
    StillImageDevices,
};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "styleme-capture")]
#[command(about = "Capture a product or profile photo and submit it for analysis")]
#[command(version)]
#[command(long_about = "Runs one capture session end to end: opens the camera source, \
takes a still, and uploads it to the analysis endpoint. Without camera hardware the \
source is an image file given with --image.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "styleme.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Image file used as the camera source
    #[arg(short, long, value_name = "FILE")]
    image: Option<PathBuf>,

    /// What is being photographed (product, profile)
    #[arg(short, long, default_value = "product")]
    kind: String,

    /// Camera facing (front, rear); defaults to the kind's usual camera
    #[arg(short, long)]
    facing: Option<String>,

    /// Extra upload field as key=value, repeatable
    #[arg(long = "context", value_name = "KEY=VALUE")]
    context: Vec<String>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print effective configuration and exit
    #[arg(long, help = "Print the effective configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - acquire and capture but don't upload
    #[arg(long, help = "Acquire and capture without submitting the still")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

/// Exit status after an interrupt (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;
const EXIT_FAILURE: u8 = 1;

// Exit codes are returned, never `process::exit`: the log guard must drop
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let _log_guard = init_logging(&args)?;

    info!("Starting styleme-capture v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match CaptureAppConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.print_config {
        println!("# styleme-capture configuration");
        println!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        return Ok(ExitCode::from(EXIT_FAILURE));
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(ExitCode::SUCCESS);
    }

    let kind: CaptureKind = args.kind.parse().map_err(|e: String| anyhow!(e))?;
    let facing: Option<Facing> = args
        .facing
        .as_deref()
        .map(str::parse::<Facing>)
        .transpose()
        .map_err(|e: String| anyhow!(e))?;

    let devices = select_devices(args.image.as_deref(), args.dry_run)?;
    let endpoint = HttpAnalysisEndpoint::new(&config.analysis)
        .context("Failed to create analysis client")?;

    let mut builder = CaptureSessionBuilder::new(kind)
        .config(&config)
        .devices(devices)
        .endpoint(Arc::new(endpoint))
        .observer(Arc::new(LoggingObserver::new("cli")));
    for entry in &args.context {
        let (key, value) = parse_context(entry)?;
        builder = builder.context(key, value);
    }
    let session = builder.build()?;

    let outcome = tokio::select! {
        outcome = run_session(&session, facing, args.dry_run) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, releasing camera");
            session.dispose();
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    session.dispose();

    Ok(ExitCode::from(report_outcome(outcome)?))
}

/// Print the session outcome and pick the process exit status
fn report_outcome(outcome: styleme_capture::Result<Option<AnalysisResult>>) -> Result<u8> {
    match outcome {
        Ok(Some(result)) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(0)
        }
        Ok(None) => {
            println!("✓ Dry run completed successfully - still captured, nothing uploaded");
            Ok(0)
        }
        Err(e) => {
            error!("Capture session failed: {}", e);
            eprintln!("✗ {}", e.user_message());
            Ok(EXIT_FAILURE)
        }
    }
}

/// Acquire, capture and (unless dry-running) submit
async fn run_session(
    session: &CaptureSession,
    facing: Option<Facing>,
    dry_run: bool,
) -> styleme_capture::Result<Option<AnalysisResult>> {
    match facing {
        Some(facing) => session.acquire(facing).await?,
        None => session.acquire_preferred().await?,
    }

    let still = session.capture().await?;
    info!(
        "Captured still {} ({}x{}, {} bytes)",
        still.capture_id,
        still.width,
        still.height,
        still.len()
    );

    if dry_run {
        return Ok(None);
    }

    session.submit().await.map(Some)
}

fn select_devices(image: Option<&Path>, dry_run: bool) -> Result<Arc<dyn MediaDeviceProvider>> {
    match (image, dry_run) {
        (Some(path), _) => Ok(Arc::new(StillImageDevices::new(path))),
        (None, true) => {
            info!("No --image given, dry run uses a synthetic camera");
            Ok(Arc::new(MockMediaDevices::new().with_frame_size(1280, 720)))
        }
        (None, false) => Err(anyhow!(
            "No camera source: pass --image <FILE> (or --dry-run for a synthetic camera)"
        )),
    }
}

fn parse_context(entry: &str) -> Result<(String, String)> {
    let (key, value) = entry
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid --context '{}', expected KEY=VALUE", entry))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Invalid --context '{}', key is empty", entry));
    }
    Ok((key.to_string(), value.to_string()))
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("styleme_capture={}", log_level)));

    let mut layers = Vec::new();

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };
    layers.push(fmt_layer);

    let guard = match &args.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_context() {
        assert_eq!(
            parse_context("lojaId=42").unwrap(),
            ("lojaId".to_string(), "42".to_string())
        );
        assert_eq!(
            parse_context("nota=a=b").unwrap(),
            ("nota".to_string(), "a=b".to_string())
        );
        assert!(parse_context("novalue").is_err());
        assert!(parse_context("=x").is_err());
    }

    #[test]
    fn test_report_outcome_exit_status() {
        use styleme_capture::{SessionError, SubmitError};

        let result = AnalysisResult {
            ok: true,
            message: None,
            products: Vec::new(),
            sku_style_me: Some("ABC123".to_string()),
        };
        assert_eq!(report_outcome(Ok(Some(result))).unwrap(), 0);
        assert_eq!(report_outcome(Ok(None)).unwrap(), 0);

        let rejected = SessionError::from(SubmitError::ServerRejected("SKU duplicado".into()));
        assert_eq!(report_outcome(Err(rejected)).unwrap(), EXIT_FAILURE);
        assert_eq!(
            report_outcome(Err(SessionError::Cancelled)).unwrap(),
            EXIT_FAILURE
        );
    }

    #[test]
    fn test_live_run_needs_camera_source() {
        assert!(select_devices(None, false).is_err());
        assert!(select_devices(None, true).is_ok());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "styleme-capture",
            "--image",
            "shirt.jpg",
            "--kind",
            "profile",
            "--context",
            "usuarioId=7",
            "--dry-run",
        ]);
        assert_eq!(args.kind, "profile");
        assert_eq!(args.context, vec!["usuarioId=7".to_string()]);
        assert!(args.dry_run);
        assert_eq!(args.image, Some(PathBuf::from("shirt.jpg")));
    }
}
