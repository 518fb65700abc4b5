// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use remotefs_core::{FsConfig, HostFsConnectionProvider, RemoteFileSystem, WriteMode, WriteOptions};
use remotefs_logging::CliLoggingArgs;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run file operations through the remotefs command layer against a served directory"
)]
struct Cli {
    /// Local directory served as the remote root
    #[arg(long, env = "REMOTEFS_ROOT")]
    root: PathBuf,

    /// TOML file with filesystem settings (working-dir, default-encoding, default-media-type)
    #[arg(long, env = "REMOTEFS_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    logging: CliLoggingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a file to stdout
    Cat {
        path: String,
        /// Hold the advisory lock while streaming
        #[arg(long)]
        lock: bool,
    },
    /// Write stdin (or --input) to a file
    Put {
        path: String,
        #[arg(long, value_enum, default_value_t = WriteMode::Overwrite)]
        mode: WriteMode,
        /// Hold the advisory lock while writing
        #[arg(long)]
        lock: bool,
        /// Create missing parent directories
        #[arg(long)]
        create_parents: bool,
        /// Encoding label recorded with the write
        #[arg(long)]
        encoding: Option<String>,
        /// Read content from this local file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// List a directory, one entry per line
    Ls { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Delete a file or directory tree
    Rm { path: String },
    /// Rename a file or directory
    Mv {
        from: String,
        to: String,
        /// Replace an existing target
        #[arg(long)]
        overwrite: bool,
    },
    /// Print the attributes of a path as JSON
    Stat { path: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.logging.clone().init("remotefs")?;

    let config = match &cli.config {
        Some(path) => FsConfig::load(path)?,
        None => FsConfig::default(),
    };
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("invalid root directory {:?}", cli.root))?;
    tracing::debug!(root = %root.display(), "serving directory");

    let fs = RemoteFileSystem::new(HostFsConnectionProvider::new(root), config);
    run(&fs, cli.command)
}

fn run(fs: &RemoteFileSystem<HostFsConnectionProvider>, command: Command) -> Result<()> {
    match command {
        Command::Cat { path, lock } => {
            let mut result = fs.read(&path, lock)?;
            let mut stdout = io::stdout().lock();
            io::copy(&mut result.stream, &mut stdout)
                .with_context(|| format!("reading {}", result.attributes.path()))?;
            result.stream.close()?;
            stdout.flush()?;
        }
        Command::Put {
            path,
            mode,
            lock,
            create_parents,
            encoding,
            input,
        } => {
            let mut content: Box<dyn Read> = match input {
                Some(file) => Box::new(
                    File::open(&file).with_context(|| format!("opening input {:?}", file))?,
                ),
                None => Box::new(io::stdin().lock()),
            };
            let options = WriteOptions {
                mode,
                lock,
                create_parent_directories: create_parents,
                encoding,
            };
            let written = fs.write(&path, &mut content, &options)?;
            tracing::info!(path = %path, bytes = written, "wrote file");
        }
        Command::Ls { path } => {
            for entry in fs.list(&path)? {
                let marker = if entry.is_directory() {
                    'd'
                } else if entry.is_symbolic_link() {
                    'l'
                } else {
                    '-'
                };
                println!(
                    "{}\t{}\t{}\t{}",
                    marker,
                    entry.size(),
                    entry.timestamp().to_rfc3339(),
                    entry.name()
                );
            }
        }
        Command::Mkdir { path } => fs.mkdir(&path)?,
        Command::Rm { path } => fs.delete(&path)?,
        Command::Mv {
            from,
            to,
            overwrite,
        } => fs.rename(&from, &to, overwrite)?,
        Command::Stat { path } => {
            let attributes = fs.stat(&path)?;
            println!("{}", serde_json::to_string_pretty(&attributes)?);
        }
    }
    Ok(())
}
