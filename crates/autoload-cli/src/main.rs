//! Autoload command-line tool
//!
//! Inspects and exercises autoload configuration from the shell:
//! resolving class identifiers, dumping the effective mappings, scanning
//! source trees for namespaces, and generating module snapshots.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::{discover, dump, generate, resolve};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autoload")]
#[command(about = "Class-name-to-file autoload resolver", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (JSON or TOML)
    #[arg(short, long, global = true, default_value = "autoload.toml")]
    config: PathBuf,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output: auto, always, never
    #[arg(long, global = true, value_name = "WHEN")]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve class identifiers to files
    Resolve {
        /// Fully-qualified class identifiers
        #[arg(required = true)]
        classes: Vec<String>,
        /// List every candidate file probed
        #[arg(long)]
        candidates: bool,
        /// Include the resolved files and report the load outcome
        #[arg(long)]
        load: bool,
    },

    /// Show the effective class map, namespaces and bootstrap files
    Dump {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Scan a directory for namespaces and classes
    Discover {
        /// Directory to scan
        #[arg(default_value = ".")]
        directory: PathBuf,
        /// Register the whole directory under this namespace
        #[arg(long)]
        namespace: Option<String>,
        /// List discovered classes
        #[arg(long)]
        classes: bool,
        /// Only scan the top level
        #[arg(long)]
        no_recursive: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Generate a module snapshot
    Generate {
        /// Directory holding one subdirectory per module
        #[arg(long, default_value = "modules")]
        modules_dir: PathBuf,
        /// Snapshot file to write
        #[arg(short, long, default_value = "bootstrap/cache/autoload.json")]
        output: PathBuf,
        /// Regenerate even if up to date
        #[arg(short, long)]
        force: bool,
        /// Copy the snapshot here after generation
        #[arg(long, value_name = "PATH")]
        publish: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let color = output::resolve_color_choice(cli.color.as_deref());

    let result = match cli.command {
        Commands::Resolve {
            classes,
            candidates,
            load,
        } => resolve::execute(
            &cli.config,
            &classes,
            resolve::ResolveOptions { candidates, load },
            color,
        ),

        Commands::Dump { json } => dump::execute(&cli.config, json, color),

        Commands::Discover {
            directory,
            namespace,
            classes,
            no_recursive,
            json,
        } => discover::execute(
            &directory,
            discover::DiscoverOptions {
                namespace,
                classes,
                recursive: !no_recursive,
                json,
            },
            color,
        ),

        Commands::Generate {
            modules_dir,
            output,
            force,
            publish,
        } => generate::execute(&modules_dir, &output, force, publish.as_deref(), color),
    };

    if let Err(e) = result {
        let mut out = output::StyledOutput::new(color);
        out.error("error");
        out.eprintln(&format!(": {:#}", e));
        std::process::exit(1);
    }
}
