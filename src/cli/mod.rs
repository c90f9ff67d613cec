//! CLI commands

mod inspect;
mod serve;

pub use inspect::{inspect, possible_input_tensors, possible_output_tensors};
pub use serve::{resolve_config, serve};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// graphserve - Serve computation graphs as an HTTP API
#[derive(Parser)]
#[command(name = "graphserve")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve a model with the JSON handler
    Serve {
        /// Model path: .graph file, directory containing one, or checkpoint directory
        #[arg(long, short)]
        model: Option<PathBuf>,

        /// Input tensor names, comma separated
        #[arg(long, short, value_delimiter = ',')]
        inputs: Vec<String>,

        /// Output tensor names, comma separated
        #[arg(long, short, value_delimiter = ',')]
        outputs: Vec<String>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Requests carry the batch dimension themselves
        #[arg(long)]
        batch: bool,

        /// YAML or JSON config file; flags override its values
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Print likely input and output tensors of a model
    Inspect {
        /// Model path
        model: PathBuf,
    },
}
