//! Vue Lynx command-line driver
//!
//! Partitions an application's modules into Lynx thread layers, injects
//! entry bootstrap code, packs build output into bundle artifacts and
//! serves them to devices.

mod commands;
mod output;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter
const LOG_ENV: &str = "VUE_LYNX_LOG";

#[derive(Parser)]
#[command(name = "vue-lynx")]
#[command(about = "Dual-thread bundling for Vue on Lynx", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Colored output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the thread layer of every module
    Plan {
        /// Build configuration
        #[arg(short, long, default_value = "vue-lynx.toml")]
        config: PathBuf,
        /// Project root to scan
        #[arg(long)]
        root: Option<PathBuf>,
        /// Module globs, relative to the root
        #[arg(short, long)]
        pattern: Vec<String>,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Prepend the runtime bootstrap to an entry module
    Glue {
        /// Entry module
        file: PathBuf,
        /// Entry name passed to the runtime
        #[arg(short, long)]
        entry: String,
        /// Layer the entry runs on
        #[arg(short, long, default_value = "main-thread")]
        layer: String,
        /// First-screen sync timing: immediately or afterReady
        #[arg(long, default_value = "afterReady")]
        timing: String,
        /// Rewrite the file instead of printing
        #[arg(short, long)]
        in_place: bool,
    },

    /// Assemble bundle artifacts from build output
    Pack {
        /// Build configuration
        #[arg(short, long, default_value = "vue-lynx.toml")]
        config: PathBuf,
        /// Only pack this artifact
        #[arg(short, long)]
        artifact: Option<String>,
        /// Write a JSON sidecar next to each artifact
        #[arg(long)]
        manifest: bool,
        /// Do not keep a backup of replaced artifacts
        #[arg(long)]
        no_backup: bool,
        /// Re-pack whenever an input chunk changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Decode an artifact and print its header
    Inspect {
        /// Artifact file
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve artifacts over HTTP for device testing
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = vue_lynx_pack::DEFAULT_PORT)]
        port: u16,
        /// Directory of artifacts
        #[arg(short, long, default_value = "dist")]
        dir: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut out = output::StyledOutput::new(output::resolve_color_choice(cli.color.as_deref()));

    let result = match cli.command {
        Commands::Plan {
            config,
            root,
            pattern,
            json,
        } => commands::plan::execute(&mut out, &config, root, pattern, json),
        Commands::Glue {
            file,
            entry,
            layer,
            timing,
            in_place,
        } => commands::glue::execute(&mut out, &file, &entry, &layer, &timing, in_place),
        Commands::Pack {
            config,
            artifact,
            manifest,
            no_backup,
            watch,
        } => {
            let options = vue_lynx_pack::PackOptions {
                only: artifact,
                write_manifest: manifest,
                no_backup,
            };
            commands::pack::execute(&mut out, &config, &options, watch)
        }
        Commands::Inspect { file, json } => commands::inspect::execute(&mut out, &file, json),
        Commands::Serve { port, dir } => commands::serve::execute(&mut out, port, dir),
    };

    if let Err(e) = result {
        out.error_line(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}
