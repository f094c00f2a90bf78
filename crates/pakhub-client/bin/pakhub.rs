//! pakhub command-line client.
//!
//! Thin wrapper around the pakhub-client library: list, download, upload,
//! and delete patches on a pakhub server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pakhub_client::PatchClient;
use pakhub_protocol::{Patch, PatchKey, Revision};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "pakhub", about = "Patch distribution hub client", version)]
struct Cli {
    /// Server hostname
    #[arg(long, env = "PAKHUB_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, env = "PAKHUB_PORT", default_value_t = 1555)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every patch the server holds
    List,
    /// Download the patches for a platform and revision
    Download {
        /// Platform name
        platform: String,
        /// Build revision
        revision: Revision,
        /// Directory to write the patch files into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Upload a single file as a patch
    UploadFile {
        /// Platform name
        platform: String,
        /// Build revision
        revision: Revision,
        /// Patch file to upload
        file: PathBuf,
    },
    /// Upload every regular file in a directory as patches
    UploadDir {
        /// Platform name
        platform: String,
        /// Build revision
        revision: Revision,
        /// Directory of patch files
        dir: PathBuf,
    },
    /// Delete the patches for a platform and revision
    Delete {
        /// Platform name
        platform: String,
        /// Build revision
        revision: Revision,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let client = PatchClient::new(cli.host, cli.port);

    match cli.command {
        Command::List => {
            let patches = client.list().await?;
            if patches.is_empty() {
                println!("no patches stored");
            }
            for meta in patches {
                println!("{} {} ({} bytes)", meta.key, meta.name, meta.size);
            }
        }
        Command::Download {
            platform,
            revision,
            out,
        } => {
            let patches = client.download(&platform, revision).await?;
            if patches.is_empty() {
                println!("no patches for {platform}/{revision}");
                return Ok(());
            }
            fs::create_dir_all(&out)
                .with_context(|| format!("creating output directory {}", out.display()))?;
            for patch in patches {
                let path = out.join(&patch.name);
                fs::write(&path, &patch.data)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("wrote {} ({} bytes)", path.display(), patch.size());
            }
        }
        Command::UploadFile {
            platform,
            revision,
            file,
        } => {
            let patch = load_patch(&file)?;
            let stored = client
                .upload(PatchKey::new(platform, revision), vec![patch])
                .await?;
            print_summaries("uploaded", &stored);
        }
        Command::UploadDir {
            platform,
            revision,
            dir,
        } => {
            let patches = load_patch_dir(&dir)?;
            anyhow::ensure!(!patches.is_empty(), "no files found in {}", dir.display());
            let stored = client
                .upload(PatchKey::new(platform, revision), patches)
                .await?;
            print_summaries("uploaded", &stored);
        }
        Command::Delete { platform, revision } => {
            let removed = client.delete(&platform, revision).await?;
            if removed.is_empty() {
                println!("nothing to delete for {platform}/{revision}");
            } else {
                print_summaries("deleted", &removed);
            }
        }
    }

    Ok(())
}

fn load_patch(file: &Path) -> Result<Patch> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", file.display()))?;
    let data = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    Ok(Patch::new(name, data))
}

fn load_patch_dir(dir: &Path) -> Result<Vec<Patch>> {
    let mut patches = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading directory {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() {
            patches.push(load_patch(&path)?);
        }
    }
    patches.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(patches)
}

fn print_summaries(verb: &str, summaries: &[pakhub_protocol::PatchSummary]) {
    for summary in summaries {
        println!("{verb} {} ({} bytes)", summary.name, summary.size);
    }
}
