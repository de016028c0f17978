use anyhow::Result;
use clap::Parser;
use facewatch::{FacewatchConfig, FacewatchOrchestrator};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "facewatch")]
#[command(about = "Motion-gated face recognition alert terminal")]
#[command(version)]
#[command(long_about = "Watches a camera while a motion sensor reports activity, \
matches faces against a gallery of known identities and raises a buzzer and LCD alert \
for every known face, recording each alert with a face crop in a SQLite audit trail. \
Uses real GPIO and an I2C LCD on a Raspberry Pi and console stand-ins elsewhere.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "facewatch.toml", help = "Path to TOML configuration file")]
    config: String,

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
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - open every device but don't run the detector
    #[arg(long, help = "Open camera, database and hardware, then exit")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Keyboard control: space simulates motion, q quits
    #[arg(short, long, help = "Enable keyboard control for bench testing")]
    keyboard: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args);

    info!("Starting Facewatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match FacewatchConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }
    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let mut orchestrator = match FacewatchOrchestrator::builder(config)
        .with_keyboard(args.keyboard)
        .build()
    {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("Startup failed: {}", e);
            eprintln!("✗ Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    if args.dry_run {
        info!("Dry run mode - devices opened, detector not started");
        orchestrator
            .shutdown(facewatch::ShutdownReason::UserRequest)
            .await;
        println!("✓ Dry run completed successfully - all devices opened");
        return Ok(());
    }

    let exit_code = orchestrator.run().await;
    drop(orchestrator);

    info!("Facewatch exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

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
        .unwrap_or_else(|_| EnvFilter::new(format!("facewatch={}", log_level)));

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

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Facewatch configuration file");
    println!("# Every option with its default value. Environment variables override");
    println!("# the file, e.g. FACEWATCH_DETECTION__COOLDOWN_SECONDS=10");
    println!();
    println!("{}", toml::to_string_pretty(&FacewatchConfig::default())?);
    Ok(())
}
