//! blocksync - delta-download files over HTTP using zsync control files

use blocksync::cli::{Cli, Commands, ConfigArgs, MakeArgs, SyncArgs};
use blocksync::config::SyncOptions;
use blocksync::control::{read_control_file_from_bytes, write_control_file};
use blocksync::progress::{format_size, ConsoleProgress};
use blocksync::transport::{HttpTransport, Transport};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json);

    let shutdown = setup_shutdown_handler();

    match cli.command {
        Commands::Sync(args) => handle_sync_command(args).await?,
        Commands::Make(args) => handle_make_command(args)?,
        Commands::Config(args) => handle_config_command(args)?,
    }

    drop(shutdown);
    Ok(())
}

async fn handle_sync_command(args: SyncArgs) -> anyhow::Result<()> {
    let mut options = match &args.config {
        Some(path) => SyncOptions::load_from(path)?,
        None => SyncOptions::load()?,
    };
    options.progress = options.progress || args.progress;

    let control_url = Url::parse(&args.control)?;
    let output_dir = args
        .output
        .unwrap_or_else(|| std::path::PathBuf::from("."));

    tracing::info!(control = %control_url, "Starting sync");

    let transport = HttpTransport::new(&options)?;
    let progress = ConsoleProgress::new(options.progress);

    let bytes = transport.fetch(&control_url).await?;
    let mut cf = read_control_file_from_bytes(&bytes)?;
    if let Some(url) = args.url {
        cf.header.url = Some(url);
    }

    let output = output_dir.join(cf.header.filename.trim_start());
    let downloaded = blocksync::sync::sync(
        &cf,
        Some(&control_url),
        &output,
        &transport,
        &options,
        Some(&progress),
    )
    .await?;
    progress.finish();

    println!(
        "Synced {} ({} downloaded of {})",
        output.display(),
        format_size(downloaded),
        format_size(cf.header.length)
    );
    Ok(())
}

fn handle_make_command(args: MakeArgs) -> anyhow::Result<()> {
    tracing::info!(file = ?args.file, "Generating control file");

    let cf = blocksync::control::build_control_file(&args.file, args.block_size, args.url)?;
    let output = args
        .output
        .unwrap_or_else(|| args.file.with_extension("zsync"));
    write_control_file(&cf, &output)?;

    println!(
        "Wrote {} ({} blocks of {})",
        output.display(),
        cf.block_sums.len(),
        format_size(cf.header.block_size as u64)
    );
    Ok(())
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("blocksync=info"),
        1 => EnvFilter::new("blocksync=debug"),
        2 => EnvFilter::new("blocksync=trace"),
        _ => EnvFilter::new("trace"),
    };

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn setup_shutdown_handler() -> tokio::sync::oneshot::Sender<()> {
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Received Ctrl+C, shutting down...");
                std::process::exit(130);
            }
            _ = rx => {
                // Normal shutdown
            }
        }
    });

    tx
}

fn handle_config_command(args: ConfigArgs) -> anyhow::Result<()> {
    if args.path {
        match SyncOptions::default_config_path() {
            Ok(path) => println!("{}", path.display()),
            Err(e) => eprintln!("Error: {}", e),
        }
    } else if args.init {
        let path = SyncOptions::default_config_path()?;
        let options = SyncOptions::default();
        options.save_to(&path)?;
        println!("Created default configuration at {}", path.display());
    } else {
        let options = SyncOptions::load().unwrap_or_default();
        println!("{}", toml::to_string_pretty(&options)?);
    }
    Ok(())
}
