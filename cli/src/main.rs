//! pdfsift CLI - PDF text and metadata extraction tool

mod server;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use pdfsift::render::{to_json, to_json_without_pages};
use pdfsift::JsonFormat;

use server::ServerConfig;

#[derive(Parser)]
#[command(name = "pdfsift")]
#[command(version)]
#[command(about = "Extract page text and metadata from PDF files as JSON", long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE", required = true)]
    input: Option<PathBuf>,

    /// Omit per-page text (show metadata and warnings only)
    #[arg(long)]
    no_pages: bool,

    /// Output compact JSON
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP extraction service
    Serve {
        /// Address to listen on
        #[arg(long, env = "PDFSIFT_BIND", default_value = server::DEFAULT_BIND)]
        bind: String,

        /// Largest accepted upload, in MiB
        #[arg(long, env = "PDFSIFT_MAX_UPLOAD_MB", default_value_t = 50)]
        max_upload_mb: usize,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Serve {
            bind,
            max_upload_mb,
        }) => cmd_serve(ServerConfig::new(bind).with_max_upload_mb(max_upload_mb)),
        None => match cli.input {
            Some(input) => cmd_extract(&input, cli.no_pages, cli.compact),
            None => Err("no input file given".into()),
        },
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_extract(input: &Path, no_pages: bool, compact: bool) -> Result<(), Box<dyn std::error::Error>> {
    let result = pdfsift::parse_file(input)?;
    for warning in &result.warnings {
        log::warn!("{}", warning);
    }

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };
    let json = if no_pages {
        to_json_without_pages(&result, format)?
    } else {
        to_json(&result, format)?
    };
    println!("{}", json);
    Ok(())
}

fn cmd_serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::serve(config))?;
    Ok(())
}
