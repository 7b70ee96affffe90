//! Triage CLI - Main entry point.

use triage::artifact::ArtifactStore;
use triage::cli::{Cli, Commands};

/// Exit status when the artifact, storage or configuration cannot be prepared.
const STARTUP_FAILURE_EXIT_CODE: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    match &cli.command {
        Commands::Serve { .. } => {
            let config = cli.serve_config()?;
            if let Err(e) = triage::run(config).await {
                if e.is_fatal_at_startup() {
                    eprintln!("Refusing to start: {}", e);
                    std::process::exit(STARTUP_FAILURE_EXIT_CODE);
                }
                return Err(e.into());
            }
        }

        Commands::Check { artifact } => {
            let config = cli.base_config()?;
            triage::observability::init(&config.observability)?;

            let path = artifact.clone().unwrap_or(config.artifact.path);
            let bundle = ArtifactStore::new(&path).load()?;
            let summary = bundle.summary();

            println!("Artifact:        {}", path.display());
            println!("Schema version:  {}", summary.schema_version);
            println!("Model:           {}", summary.model_kind);
            println!("Classes:         {}", summary.classes.join(", "));
            println!("Scaler:          {}", summary.scaler_kind);
            println!("Encoded columns: {}", summary.encoded_columns);
            println!("Features:        {}", summary.feature_count);
        }

        Commands::Version => {
            println!("triage {}", triage::VERSION);
        }
    }

    Ok(())
}
