//! embedmongo CLI
//!
//! Usage:
//!   embedmongo resolve 4.0.12 --os linux --arch x86_64 --bits 64
//!   embedmongo detect --json
//!   embedmongo run 4.4.1 --port 27100
//!   embedmongo ranges 4.0.1 4.0.2 4.0.3 4.2.0

use embedmongo::cli::{Args, DetectArgs, RangesArgs, ResolveArgs, RunArgs, SubCommand};
use embedmongo::{
    compress_ranges, platform, ArtifactStore, BitSize, Command, CpuArch, DirectoryStore,
    Distribution, Os, Platform, Resolver, Supervisor, Version,
};
use std::error::Error;
use std::time::Duration;
use tokio::sync::watch;

type CliResult = Result<(), Box<dyn Error>>;

#[tokio::main]
async fn main() {
    let args: Args = argh::from_env();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "error" => "error",
        "warn" => "warn",
        "info" => "info",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };
    let env = env_logger::Env::default().default_filter_or(log_level);
    env_logger::init_from_env(env);

    let result = match args.command {
        SubCommand::Resolve(args) => resolve(args),
        SubCommand::Detect(args) => detect(args),
        SubCommand::Run(args) => run(args).await,
        SubCommand::Ranges(args) => ranges(args),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn resolve(args: ResolveArgs) -> CliResult {
    let host = platform::detect().unwrap_or_else(|e| {
        log::warn!("{}, resolving for linux x86/64bit unless overridden", e);
        Platform::new(Os::Linux, CpuArch::X86, BitSize::B64)
    });
    let platform = args.platform_override().apply(host)?;

    let mut resolver = Resolver::new();
    if let Some(base_url) = &args.base_url {
        resolver = resolver.with_base_url(base_url.as_str());
    }

    let distribution = Distribution::new(args.version, platform);
    let artifact = resolver.resolve(&distribution)?;
    let executable = artifact.executable_entry(Command::Mongod.base_name());

    if args.json {
        let output = serde_json::json!({
            "distribution": distribution.to_string(),
            "artifact": artifact,
            "executable": format!("{}/{}", artifact.archive_stem(), executable),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", distribution);
        println!("  url:        {}", artifact.url);
        println!("  archive:    {}", artifact.archive);
        println!("  executable: {}/{}", artifact.archive_stem(), executable);
    }
    Ok(())
}

fn detect(args: DetectArgs) -> CliResult {
    let platform = platform::detect()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&platform)?);
    } else {
        println!("{}", platform);
    }
    Ok(())
}

fn ranges(args: RangesArgs) -> CliResult {
    let versions: Vec<_> = args.versions.iter().map(Version::numeric).collect();
    for range in compress_ranges(&versions) {
        println!("{}", range);
    }
    Ok(())
}

async fn run(args: RunArgs) -> CliResult {
    let mut config = args.run_config()?;
    let platform = config.target_platform()?;

    let resolver = Resolver::new().with_base_url(config.download_base_url.as_str());
    let artifact = resolver.resolve(&Distribution::new(config.version.clone(), platform))?;
    log::info!("Using {}", artifact);

    let root = args
        .artifact_dir(&config)
        .ok_or("No artifact directory, set EMBEDMONGO_ARTIFACT_DIR or --artifact-dir")?;
    let executable = DirectoryStore::new(root).executable_path(&artifact, config.command)?;

    if config.command == Command::Mongod && config.db_path.is_none() {
        let db_path = std::env::temp_dir().join(format!("embedmongo-{}", config.port));
        std::fs::create_dir_all(&db_path)?;
        log::info!("Using data directory {}", db_path.display());
        config.db_path = Some(db_path);
    }

    // Create shutdown channel
    let (shutdown_tx, mut shutdown_rx) = watch::channel(());

    // Set up Ctrl+C handler
    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, initiating shutdown...");
        let _ = shutdown_tx.send(());
    })?;

    let mut supervisor = Supervisor::new(config.supervisor_config(executable));
    let pid = supervisor.start().await?.pid();
    log::info!("{} {} is ready (pid {})", config.command, config.version, pid);

    if config.command.is_server() {
        // Wait for shutdown signal or the server exiting on its own
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    if !supervisor.check_alive() {
                        break;
                    }
                }
            }
        }
    }

    let code = supervisor.stop().await?;
    log::info!("embedmongo exiting (exit code {:?})", code);
    Ok(())
}
