use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use facewatch::{
    config::{DetectionConfig, FacewatchConfig},
    frame::Frame,
    recognition::{build_encoder, build_locator, Signature},
    storage::SqliteStore,
};
use serde::Serialize;
use std::time::SystemTime;
use tracing::{info, warn};

/// Manage the known-face gallery used by the facewatch terminal.
#[derive(Parser, Debug)]
#[command(name = "gallery_tool")]
#[command(about = "Enroll, list and remove identities in the facewatch gallery")]
struct Args {
    /// Path to facewatch configuration file
    #[arg(short = 'c', long, default_value = "facewatch.toml")]
    config: PathBuf,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and schema
    Init,
    /// Encode a face image and store its signature under a name
    Enroll {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        image: PathBuf,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List identities with signature and alert counts
    List,
    /// Remove an identity with its signatures and alerts
    Remove {
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Debug, Serialize)]
struct Enrolled {
    identity_key: i64,
    signature_id: i64,
    name: String,
    signature_len: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = load_config(&args.config)?;
    let database = config.storage.database_path();

    match args.command {
        Command::Init => {
            SqliteStore::open(&database)
                .with_context(|| format!("Failed to open {}", database.display()))?;
            println!("Gallery ready at {}", database.display());
        }
        Command::Enroll {
            name,
            image,
            description,
        } => {
            let store = SqliteStore::open(&database)?;
            let signature = signature_from_image(&config.detection, &image)?;
            let identity_key = store.enroll_identity(&name, description.as_deref())?;
            let source = image.display().to_string();
            let signature_id = store.add_signature(identity_key, Some(&source), &signature)?;
            info!("Enrolled {} from {}", name, source);

            let enrolled = Enrolled {
                identity_key,
                signature_id,
                name,
                signature_len: signature.len(),
            };
            if args.json {
                println!("{}", serde_json::to_string_pretty(&enrolled)?);
            } else {
                println!(
                    "Enrolled '{}' (identity {}, signature {})",
                    enrolled.name, enrolled.identity_key, enrolled.signature_id
                );
            }
        }
        Command::List => {
            let store = SqliteStore::open(&database)?;
            let identities = store.list_identities()?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&identities)?);
            } else if identities.is_empty() {
                println!("Gallery is empty");
            } else {
                println!("{:<6} {:<24} {:>10} {:>8}", "ID", "NAME", "SIGNATURES", "ALERTS");
                for identity in identities {
                    println!(
                        "{:<6} {:<24} {:>10} {:>8}",
                        identity.id, identity.name, identity.signature_count, identity.alert_count
                    );
                }
            }
        }
        Command::Remove { name } => {
            let store = SqliteStore::open(&database)?;
            if !store.delete_identity(&name)? {
                return Err(anyhow!("No identity named '{}'", name));
            }
            println!("Removed '{}'", name);
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<FacewatchConfig> {
    if !path.exists() {
        warn!("{} not found, using defaults and environment", path.display());
    }
    FacewatchConfig::load_from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))
}

/// Locate the largest face on an image and encode it with the configured
/// pipeline stages
fn signature_from_image(detection: &DetectionConfig, path: &Path) -> Result<Signature> {
    let image = image::open(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?
        .to_rgb8();

    // A single still must yield a face on the first call
    let mut detection = detection.clone();
    detection.simulate_interval_frames = 1;

    let mut locator = build_locator(&detection)?;
    let mut encoder = build_encoder(&detection)?;

    let small = Frame::new(0, SystemTime::now(), image).downscale(detection.scale_factor);
    let region = locator
        .locate(&small)?
        .into_iter()
        .max_by_key(|region| region.area())
        .ok_or_else(|| anyhow!("No face found in {}", path.display()))?;

    Ok(encoder.encode(&small, &region)?)
}
