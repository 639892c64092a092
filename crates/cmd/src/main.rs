// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::Result;
use blobfs::UploadOptions;
use clap::{Parser, Subcommand};

use cmd::commands;
use cmd::common::ClientContext;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "blobfs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $BLOBFS_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bind the connection to this container; "" addresses containers by path
    #[arg(long, global = true)]
    container: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// Download an object
    Get {
        remote: String,
        /// Local file or directory; stdout when omitted
        local: Option<PathBuf>,
        /// Delete the object after downloading it
        #[arg(long)]
        delete_after: bool,
    },
    /// Upload a local file
    Put {
        local: PathBuf,
        /// Remote path; defaults to the local file name
        remote: Option<String>,
        /// Pick a numbered name instead of overwriting
        #[arg(long)]
        unique: bool,
        /// Append to an append object
        #[arg(long)]
        append: bool,
        /// Remove the local file after a successful upload
        #[arg(long)]
        delete_source: bool,
    },
    /// Delete objects
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Create a directory or container
    Mkdir { path: String },
    /// Remove an empty directory or a container
    Rmdir { path: String },
    /// Show attributes
    Stat { path: String },
}

#[allow(clippy::print_stdout)]
fn print_line(line: &str) {
    println!("{line}");
}

#[tokio::main]
async fn main() -> Result<()> {
    diagnostics::init_diagnostics();

    let cli = Cli::parse();
    let context = ClientContext::new(cli.config, cli.container);
    let client = context.open_client()?;

    match cli.command {
        Commands::Ls { path } => commands::list_command(&client, &path, print_line).await,
        Commands::Get {
            remote,
            local,
            delete_after,
        } => {
            commands::get_command(&client, &remote, local.as_deref(), delete_after, print_line)
                .await
        }
        Commands::Put {
            local,
            remote,
            unique,
            append,
            delete_source,
        } => {
            let options = UploadOptions {
                unique,
                append,
                delete_source,
            };
            commands::put_command(&client, &local, remote.as_deref(), options, print_line).await
        }
        Commands::Rm { paths } => commands::delete_command(&client, &paths, print_line).await,
        Commands::Mkdir { path } => commands::mkdir_command(&client, &path, print_line).await,
        Commands::Rmdir { path } => commands::rmdir_command(&client, &path, print_line).await,
        Commands::Stat { path } => commands::stat_command(&client, &path, print_line).await,
    }
}
