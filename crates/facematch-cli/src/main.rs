use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use facematch_core::{
    EmbeddingStore, FaceError, FaceService, Identification, Identity, NewIdentity,
};
use facematch_store::SqliteStore;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod intake;
mod sidecar;

use config::Config;
use sidecar::SidecarEncoder;

#[derive(Parser)]
#[command(name = "facematch", version, about = "Enroll people and identify unknown photos by face")]
struct Cli {
    /// Configuration file (TOML); overrides FACEMATCH_CONFIG
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a person from a photo
    Enroll {
        /// Display name
        #[arg(short, long)]
        name: String,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Source photo (png, jpg, jpeg)
        #[arg(short, long)]
        image: PathBuf,
        /// Face file for the photo (default: <image>.faces.json)
        #[arg(long)]
        faces: Option<PathBuf>,
    },
    /// Identify the person in a photo
    Identify {
        /// Photo to identify (png, jpg, jpeg)
        #[arg(short, long)]
        image: PathBuf,
        /// Face file for the photo (default: <image>.faces.json)
        #[arg(long)]
        faces: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List enrolled people
    List {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration and database status
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "configuration resolved");

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("failed to open face database {}", config.db_path.display()))?;
    let mut service = FaceService::new(store, config.service());

    match cli.command {
        Commands::Enroll {
            name,
            age,
            email,
            phone,
            image,
            faces,
        } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("name must not be empty");
            }
            let identity = NewIdentity {
                name,
                age,
                email: non_empty(email),
                phone: non_empty(phone),
                image_path: String::new(),
            };
            let enrolled = enroll(&mut service, &config, identity, &image, faces)?;
            println!("Enrolled {} (id {})", enrolled.name, enrolled.id);
        }
        Commands::Identify { image, faces, json } => {
            intake::check_image_type(&image, &config.allowed_extensions)?;
            let mut encoder = SidecarEncoder::new(faces);
            let outcome = service
                .identify_image(&mut encoder, &image)
                .map_err(|e| face_error(e, &image))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_identification(&outcome);
            }
        }
        Commands::List { json } => {
            let identities: Vec<Identity> = service
                .store()
                .all()
                .context("failed to read enrolled faces")?
                .into_iter()
                .map(|face| face.identity)
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&identities)?);
            } else if identities.is_empty() {
                println!("No people enrolled");
            } else {
                for identity in &identities {
                    println!(
                        "{:>5}  {:<24} {:>4}  {:<28} {:<16} {}",
                        identity.id,
                        identity.name,
                        display(identity.age),
                        identity.email.as_deref().unwrap_or("-"),
                        identity.phone.as_deref().unwrap_or("-"),
                        identity.image_path,
                    );
                }
            }
        }
        Commands::Status => {
            let enrolled = service.store().count().context("failed to count enrolled faces")?;
            println!(
                "{}",
                serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "db_path": config.db_path,
                    "upload_dir": config.upload_dir,
                    "match_threshold": config.match_threshold,
                    "enrolled": enrolled,
                })
            );
        }
    }

    Ok(())
}

/// Copy the photo into the upload folder and enroll it. The copy is removed
/// again if enrollment fails.
fn enroll(
    service: &mut FaceService<SqliteStore>,
    config: &Config,
    mut identity: NewIdentity,
    image: &Path,
    faces: Option<PathBuf>,
) -> Result<Identity> {
    let stored = intake::store_image(image, &config.upload_dir, &config.allowed_extensions)?;
    identity.image_path = stored.to_string_lossy().into_owned();

    let mut encoder = SidecarEncoder::new(faces);
    match service.enroll_image(&mut encoder, image, &identity) {
        Ok(enrolled) => Ok(enrolled),
        Err(e) => {
            if let Err(err) = std::fs::remove_file(&stored) {
                tracing::warn!(path = %stored.display(), error = %err, "failed to remove stored image");
            }
            Err(face_error(e, image))
        }
    }
}

/// Turn a service error into a message the operator can act on.
fn face_error(e: FaceError, image: &Path) -> anyhow::Error {
    match e {
        FaceError::NoFaceDetected => anyhow!(
            "no face detected in {}; use a clear, front-facing photo",
            image.display()
        ),
        e @ FaceError::Persistence(_) => anyhow::Error::new(e).context("face database error"),
        other => anyhow::Error::new(other).context(format!("failed to process {}", image.display())),
    }
}

fn print_identification(outcome: &Identification) {
    match outcome {
        Identification::Matched {
            identity,
            reference_image,
            distance,
        } => {
            println!("Match found: {}", identity.name);
            println!("  id:       {}", identity.id);
            println!("  age:      {}", display(identity.age));
            println!("  email:    {}", identity.email.as_deref().unwrap_or("-"));
            println!("  phone:    {}", identity.phone.as_deref().unwrap_or("-"));
            println!("  image:    {reference_image}");
            println!("  distance: {distance:.4}");
        }
        Identification::NoMatch => println!("No matching face found"),
    }
}

fn display<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use facematch_core::ServiceConfig;

    fn test_config(root: &Path) -> Config {
        Config {
            db_path: root.join("faces.db"),
            upload_dir: root.join("uploads"),
            match_threshold: 0.5,
            allowed_extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
        }
    }

    fn alice() -> NewIdentity {
        NewIdentity {
            name: "Alice".into(),
            ..Default::default()
        }
    }

    fn uploads_left(config: &Config) -> usize {
        std::fs::read_dir(&config.upload_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[test]
    fn test_enroll_without_face_removes_copy() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let image = dir.path().join("alice.jpg");
        std::fs::write(&image, b"jpeg bytes").unwrap();
        std::fs::write(sidecar::sidecar_path(&image), r#"{ "faces": [] }"#).unwrap();

        let mut service = FaceService::new(
            SqliteStore::open_in_memory().unwrap(),
            ServiceConfig::default(),
        );
        let err = enroll(&mut service, &config, alice(), &image, None).unwrap_err();

        assert_eq!(
            err.to_string(),
            format!(
                "no face detected in {}; use a clear, front-facing photo",
                image.display()
            )
        );
        assert_eq!(uploads_left(&config), 0);
        assert_eq!(service.store().count().unwrap(), 0);
    }

    #[test]
    fn test_enroll_missing_face_file_removes_copy() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let image = dir.path().join("alice.png");
        std::fs::write(&image, b"png bytes").unwrap();

        let mut service = FaceService::new(
            SqliteStore::open_in_memory().unwrap(),
            ServiceConfig::default(),
        );
        let err = enroll(&mut service, &config, alice(), &image, None).unwrap_err();

        assert!(err.to_string().starts_with("failed to process"), "{err:#}");
        assert_eq!(uploads_left(&config), 0);
    }

    #[test]
    fn test_enroll_keeps_copy_and_records_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let image = dir.path().join("alice.jpg");
        std::fs::write(&image, b"jpeg bytes").unwrap();
        let faces = dir.path().join("alice.json");
        std::fs::write(&faces, r#"{ "faces": [[0.1, 0.2, 0.3]] }"#).unwrap();

        let mut service = FaceService::new(
            SqliteStore::open_in_memory().unwrap(),
            ServiceConfig::default(),
        );
        let enrolled = enroll(&mut service, &config, alice(), &image, Some(faces)).unwrap();

        let stored = config.upload_dir.join("alice.jpg");
        assert_eq!(enrolled.image_path, stored.to_string_lossy());
        assert_eq!(std::fs::read(&stored).unwrap(), b"jpeg bytes");
        assert_eq!(uploads_left(&config), 1);
    }
}
