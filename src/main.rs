use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use rust_asset_backend::config::{AssetConfig, VerifyConfig};
use rust_asset_backend::infrastructure::assets;
use rust_asset_backend::services::cleanup::CleanupRequest;
use rust_asset_backend::services::notifications::{Notifier, TracingNotifier};
use rust_asset_backend::services::verifier::{HttpProbe, ReachabilityVerifier};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rust-asset-backend", version, about = "Remote asset upload and cleanup")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a local file and confirm it is publicly reachable
    Upload {
        file: PathBuf,
        /// Remote file name (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
        /// Directory below the base directory, e.g. "Images/2024"
        #[arg(long, default_value = "")]
        dir: String,
    },
    /// Run one existence check against a public URL
    Verify { url: String },
    /// Retire a superseded asset by its public URL
    Cleanup { previous_url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_asset_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);

    match cli.command {
        Command::Upload { file, name, dir } => {
            let config = AssetConfig::from_env()?;
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| anyhow::anyhow!("{} has no file name", file.display()))?,
            };

            info!("🚀 Uploading {} as {}", file.display(), name);
            let orchestrator = assets::setup_orchestrator(&config, notifier)?;
            let mut source = tokio::fs::File::open(&file).await?;

            match orchestrator
                .upload_and_confirm(&mut source, &name, &dir)
                .await
            {
                Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
                Err(e) => {
                    error!("❌ Upload failed: {}", e);
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({
                            "error": e.to_string(),
                            "stage": e.stage,
                            "kind": e.kind,
                            "transient": e.is_transient(),
                        }))?
                    );
                    std::process::exit(1);
                }
            }
        }
        Command::Verify { url } => {
            let verify = VerifyConfig::from_source(|key| std::env::var(key).ok());
            let verifier = ReachabilityVerifier::new(Arc::new(HttpProbe::new(verify.timeout)?));
            let report = verifier.verify(&url).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Cleanup { previous_url } => {
            let config = AssetConfig::from_env()?;
            let Some(coordinator) = assets::setup_cleanup(&config, notifier) else {
                anyhow::bail!("CDN_CLOUD_NAME, CDN_API_KEY and CDN_API_SECRET must be set");
            };

            let request = CleanupRequest::new(Some(previous_url));
            let outcome = coordinator.run(&request).await;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "outcome": outcome,
                    "state": request.state(),
                }))?
            );
        }
    }

    Ok(())
}
