//! peershare command line: serve a folder of files, or list, download, and
//! verify them from another machine.

mod progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use peershare_catalog::Catalog;
use peershare_client::{Client, ClientConfig, DownloadOutcome, DownloadRequest};
use peershare_server::{FileServer, ServerConfig};

use progress::{DownloadProgress, format_bytes};

#[derive(Parser)]
#[command(name = "peershare", version, about)]
struct Cli {
    /// Verbose logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ~/.config/peershare/)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ServerOpts {
    /// Server host (defaults to the last server used)
    #[arg(short, long)]
    server: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Share files: run the server until Ctrl-C
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(short, long)]
        port: Option<u16>,

        /// File or folder to share, registered recursively
        #[arg(long)]
        shared_folder: Option<PathBuf>,

        /// Connection ceiling
        #[arg(long)]
        max_connections: Option<usize>,

        /// Serve raw bytes even when clients ask for compression
        #[arg(long)]
        no_compression: bool,
    },

    /// List the files a server shares
    List {
        #[command(flatten)]
        server: ServerOpts,
    },

    /// Download a file, resuming an interrupted transfer when possible
    Get {
        /// Name of the file as listed by the server
        name: String,

        /// Destination path (defaults to the download folder + name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Start over instead of resuming a partial download
        #[arg(long)]
        no_resume: bool,

        #[command(flatten)]
        server: ServerOpts,
    },

    /// Ask the server for a file's SHA-256 checksum
    Checksum {
        name: String,

        #[command(flatten)]
        server: ServerOpts,
    },

    /// Check that a server is reachable
    Probe {
        #[command(flatten)]
        server: ServerOpts,
    },
}

fn config_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config").join("peershare"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Applies `--server`/`--port` over the persisted config and remembers the
/// result, so the next invocation can omit them.
fn resolve_client(opts: &ServerOpts, config_path: &Path) -> anyhow::Result<(Client, ClientConfig)> {
    let mut config = ClientConfig::load(config_path);
    if let Some(server) = &opts.server {
        config.server_host = server.clone();
    }
    if let Some(port) = opts.port {
        config.server_port = port;
    }
    if config.server_host.is_empty() {
        bail!("no server configured; pass --server <host>");
    }

    config
        .save(config_path)
        .with_context(|| format!("saving client config to {}", config_path.display()))?;

    let client = Client::new(config.server_host.clone(), config.server_port);
    Ok((client, config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if cli.verbose { "debug" } else { "info" })
        }))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve {
            port,
            shared_folder,
            max_connections,
            no_compression,
        } => {
            let config_path = cli
                .config
                .unwrap_or_else(|| config_dir().join("server.json"));
            serve(
                &config_path,
                port,
                shared_folder,
                max_connections,
                no_compression,
            )
            .await
        }
        Commands::List { server } => {
            let config_path = cli
                .config
                .unwrap_or_else(|| config_dir().join("client.json"));
            let (client, _config) = resolve_client(&server, &config_path)?;
            list(&client).await
        }
        Commands::Get {
            name,
            output,
            no_resume,
            server,
        } => {
            let config_path = cli
                .config
                .unwrap_or_else(|| config_dir().join("client.json"));
            let (client, config) = resolve_client(&server, &config_path)?;
            get(&client, &config, name, output, no_resume).await
        }
        Commands::Checksum { name, server } => {
            let config_path = cli
                .config
                .unwrap_or_else(|| config_dir().join("client.json"));
            let (client, _config) = resolve_client(&server, &config_path)?;
            let digest = client
                .fetch_checksum(&name)
                .await
                .with_context(|| format!("fetching checksum of {name}"))?;
            println!("{digest}  {name}");
            Ok(())
        }
        Commands::Probe { server } => {
            let config_path = cli
                .config
                .unwrap_or_else(|| config_dir().join("client.json"));
            let (client, _config) = resolve_client(&server, &config_path)?;
            client.probe().await.context("server unreachable")?;
            println!("{}:{} is reachable", client.host(), client.port());
            Ok(())
        }
    }
}

async fn serve(
    config_path: &Path,
    port: Option<u16>,
    shared_folder: Option<PathBuf>,
    max_connections: Option<usize>,
    no_compression: bool,
) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(config_path);
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(folder) = shared_folder {
        config.shared_folder = Some(folder);
    }
    if let Some(max) = max_connections {
        config.max_connections = max;
    }
    if no_compression {
        config.compression_enabled = false;
    }
    config
        .save(config_path)
        .with_context(|| format!("saving server config to {}", config_path.display()))?;

    let catalog = Arc::new(Catalog::new());
    if let Some(folder) = &config.shared_folder {
        let added = catalog
            .add_path(folder)
            .await
            .with_context(|| format!("registering {}", folder.display()))?;
        info!(added, folder = %folder.display(), "catalog populated");
        println!("Sharing {added} file(s) from {}", folder.display());
    } else {
        println!("No shared folder configured; serving an empty catalog");
    }

    let server = FileServer::bind(config, catalog)
        .await
        .context("binding server port")?;
    println!("Listening on {} (Ctrl-C to stop)", server.local_addr()?);

    let cancel = server.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    server.run().await.context("server failed")?;
    Ok(())
}

async fn list(client: &Client) -> anyhow::Result<()> {
    let files = client.fetch_listing().await.context("fetching listing")?;
    if files.is_empty() {
        println!("No files available");
        return Ok(());
    }

    for file in files {
        println!(
            "{:<40} {:>10}  {}",
            file.name,
            format_bytes(file.size),
            file.digest
        );
    }
    Ok(())
}

async fn get(
    client: &Client,
    config: &ClientConfig,
    name: String,
    output: Option<PathBuf>,
    no_resume: bool,
) -> anyhow::Result<()> {
    let dest = output.unwrap_or_else(|| config.download_dir.join(&name));
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    // The listing supplies the digest the download is verified against.
    let listing = client.fetch_listing().await.context("fetching listing")?;
    let remote = listing.iter().find(|f| f.name == name);
    if remote.is_none() {
        bail!("{name} is not in the server's listing");
    }

    let request = DownloadRequest {
        name: name.clone(),
        dest: dest.clone(),
        expected_digest: remote.map(|f| f.digest.clone()),
        compress: config.compression_enabled,
        resume: !no_resume,
    };

    let bar = DownloadProgress::new(&name, remote.map(|f| f.size));
    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    let outcome = {
        let download = client.download(&request, Some(tx));
        tokio::pin!(download);
        loop {
            tokio::select! {
                outcome = &mut download => break outcome,
                Some(bytes) = rx.recv() => bar.update(bytes),
            }
        }
    }
    .context("download failed")?;

    match outcome {
        DownloadOutcome::Complete { bytes, digest } => {
            bar.finish();
            println!("Downloaded {} ({}) to {}", name, format_bytes(bytes), dest.display());
            println!("SHA-256: {digest}");
            Ok(())
        }
        DownloadOutcome::Incomplete {
            bytes_downloaded,
            reason,
        } => {
            bar.abandon();
            bail!(
                "download incomplete after {}: {reason} (run the same command to resume)",
                format_bytes(bytes_downloaded)
            );
        }
        DownloadOutcome::Corrupted { expected, actual } => {
            bar.abandon();
            bail!(
                "downloaded file failed verification (expected {expected}, got {actual}); \
                 partial data was removed"
            );
        }
        DownloadOutcome::Refused { reason } => {
            bar.abandon();
            bail!("server refused the download: {reason}");
        }
    }
}
