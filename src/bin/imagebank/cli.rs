use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI для ImageBank: кэш банков изображений на диске
#[derive(Parser, Debug)]
#[command(name = "imagebank", version, about = "ImageBank CLI")]
pub struct Cli {
    /// Directory holding image_banks.json (overrides IMAGEBANK_USER_DIR)
    #[arg(long, global = true)]
    pub user_dir: Option<PathBuf>,
    /// Parent of the default cache (overrides IMAGEBANK_OUTPUT_DIR)
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Create the cache registry if absent and print the configured caches
    Init,
    /// List caches with their root and encoder
    Caches {
        #[arg(long)]
        json: bool,
    },
    /// List valid banks of a cache
    List {
        #[arg(long, default_value = "default")]
        cache: String,
        #[arg(long)]
        json: bool,
    },
    /// Bank validity / lazy status
    Check {
        #[arg(long, default_value = "default")]
        cache: String,
        #[arg(long)]
        bank_name: String,
        #[arg(long)]
        bank_id: String,
        /// Treat --bank-id as a JSON document (structured id)
        #[arg(long)]
        structured: bool,
    },
    /// Print the fingerprint (directory name) of a bank id
    Fingerprint {
        #[arg(long)]
        bank_id: String,
        #[arg(long)]
        structured: bool,
    },
    /// Write image files (same size) as the frames of a bank
    Put {
        #[arg(long, default_value = "default")]
        cache: String,
        #[arg(long)]
        bank_name: String,
        #[arg(long)]
        bank_id: String,
        #[arg(long)]
        structured: bool,
        /// Selected frame (negative counts from the end)
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        index: i64,
        #[arg(long, num_args = 1.., required = true)]
        images: Vec<PathBuf>,
    },
    /// Read a bank and export its frames as PNG files
    Get {
        #[arg(long, default_value = "default")]
        cache: String,
        #[arg(long)]
        bank_name: String,
        #[arg(long)]
        bank_id: String,
        #[arg(long)]
        structured: bool,
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        index: i64,
        /// Output directory for <i>.png
        #[arg(long)]
        out: PathBuf,
    },
    /// Configuration, caches and metrics. --json prints one JSON object.
    Status {
        #[arg(long)]
        json: bool,
    },
}
