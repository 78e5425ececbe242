use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{sync::Arc, time::Duration};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use spotifyfs::audio::{encoder, PreviewTransport};
use spotifyfs::config::Config;
use spotifyfs::fs::{CatalogFs, FileType};
use spotifyfs::sources::SpotifyClient;
use spotifyfs::tree::Node;

const READ_CHUNK: usize = 64 * 1024;

/// Inspect and edit the catalog through the filesystem tree.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List a directory
    Ls { path: String },
    /// Show the attributes of a path
    Stat { path: String },
    /// Print where a listed entity links to
    Readlink { path: String },
    /// Write a file to stdout
    Cat { path: String },
    /// Add the best match for NAME to a playlist
    Add { playlist: String, name: String },
    /// Remove a playlist track or unfollow an artist
    Rm { path: String },
    /// Rename within a directory (moves a playlist track to the new position)
    Mv { path: String, new_name: String },
    /// Follow the best matching artist
    Follow { name: String },
    /// Stop following an artist
    Unfollow { name: String },
}

/// Splits `/a/b/c` into `/a/b` and `c`.
fn split_path(path: &str) -> Result<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, name)) if !name.is_empty() => Ok((parent, name)),
        _ => anyhow::bail!("{:?} has no parent directory", path),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spotifyfs=debug".parse()?)
                .add_directive("symphonia=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!("🎵 Starting spotifyfs v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    if config.access_token.is_empty() {
        anyhow::bail!("SPOTIFY_ACCESS_TOKEN is not set");
    }
    info!("{}", config.summary());

    let client = Arc::new(SpotifyClient::new(&config)?);
    let transport = Arc::new(PreviewTransport::new(client.clone()));
    let sweep_every = config.cache_ttl();
    let fs = CatalogFs::new(config, client, transport, encoder::default_factory());
    let sweeper = fs.spawn_cache_sweeper(sweep_every);

    let outcome = tokio::select! {
        outcome = run(&fs, cli.command) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("⚠️ Interrupted");
            Ok(())
        }
    };

    sweeper.abort();
    let metrics = fs.cache_metrics();
    info!(
        "📊 Cache: {} entries, {:.0}% hit rate",
        metrics.entries,
        metrics.hit_rate() * 100.0
    );
    outcome
}

async fn run(fs: &CatalogFs, command: Command) -> Result<()> {
    match command {
        Command::Ls { path } => {
            let dir = fs.resolve(&path).await?;
            for (name, attr) in fs.readdir(&dir).await? {
                let marker = match attr.kind {
                    FileType::Directory => "/",
                    FileType::Symlink => "@",
                    FileType::RegularFile => "",
                };
                println!("{:>12}  {}{}", attr.size, name, marker);
            }
        }
        Command::Stat { path } => {
            let node = fs.resolve(&path).await?;
            let attr = fs.getattr(&node).await?;
            println!("{:?}", node);
            println!("  type:  {:?}", attr.kind);
            println!("  size:  {}", attr.size);
            println!("  mode:  {:o}", attr.perm);
            println!("  mtime: {}", attr.mtime.to_rfc3339());
        }
        Command::Readlink { path } => {
            let (parent_path, name) = split_path(&path)?;
            let parent = fs.resolve(parent_path).await?;
            println!("{}", fs.readlink(&fs.lookup(&parent, name).await?)?);
        }
        Command::Cat { path } => cat(fs, &path).await?,
        Command::Add { playlist, name } => {
            let parent = fs.resolve(&playlist).await?;
            fs.mknod(&parent, &name).await?;
            info!("➕ Added {:?} to {}", name, playlist);
        }
        Command::Rm { path } => {
            let (parent_path, name) = split_path(&path)?;
            let parent = fs.resolve(parent_path).await?;
            if fs.lookup(&parent, name).await?.is_dir() {
                fs.rmdir(&parent, name).await?;
            } else {
                fs.unlink(&parent, name).await?;
            }
        }
        Command::Mv { path, new_name } => {
            let (parent_path, name) = split_path(&path)?;
            let parent = fs.resolve(parent_path).await?;
            fs.rename(&parent, name, &parent, &new_name).await?;
        }
        Command::Follow { name } => {
            let artists = fs.resolve("/Artists").await?;
            fs.mkdir(&artists, &name).await?;
        }
        Command::Unfollow { name } => {
            let artists = fs.resolve("/Artists").await?;
            fs.unlink(&artists, &name).await?;
        }
    }
    Ok(())
}

async fn cat(fs: &CatalogFs, path: &str) -> Result<()> {
    let node = fs.resolve(path).await?;
    if let Node::Directory(_) = node {
        anyhow::bail!("{} is a directory", path);
    }

    let handle = fs.open(&node)?;
    let mut stdout = tokio::io::stdout();
    let mut offset = 0u64;
    let started = std::time::Instant::now();

    let copied: Result<()> = async {
        loop {
            let chunk = fs
                .read(&handle, offset, READ_CHUNK)
                .await
                .with_context(|| format!("reading {} at {}", path, offset))?;
            if chunk.is_empty() {
                break;
            }
            offset += chunk.len() as u64;
            stdout.write_all(&chunk).await?;
        }
        stdout.flush().await?;
        Ok(())
    }
    .await;

    fs.release(handle)?;
    copied?;
    info!(
        "✅ {} bytes in {}",
        offset,
        humantime::format_duration(Duration::from_secs(started.elapsed().as_secs()))
    );
    Ok(())
}
