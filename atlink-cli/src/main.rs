mod commands;

use std::path::PathBuf;

use atlink_core::{AtlinkConfig, ReferenceEncoding};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "atlink", version, about = "Inspect CLI output and @ context references")]
struct Args {
    /// Config file (defaults to ~/.atlink/config.json)
    #[arg(long, global = true, env = "ATLINK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode newline-delimited CLI output into normalized JSON messages
    Parse {
        /// Input file; stdin when omitted or "-"
        file: Option<PathBuf>,

        /// Print only the session summary
        #[arg(long)]
        summary_only: bool,
    },

    /// Show the @ query under the cursor
    Detect {
        text: String,

        /// Byte offset of the cursor (defaults to end of text)
        #[arg(long)]
        cursor: Option<usize>,
    },

    /// Rank files under a directory against a query
    Search {
        query: String,

        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Maximum rows (overrides max_results from config)
        #[arg(long)]
        max: Option<usize>,

        /// Include hidden files
        #[arg(long)]
        hidden: bool,
    },

    /// Complete the @ query in TEXT with a file from ROOT and print the new text
    Pick {
        text: String,

        #[arg(long)]
        cursor: Option<usize>,

        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Row to pick from the ranked results
        #[arg(long, default_value_t = 0)]
        choose: usize,

        #[arg(long, value_enum)]
        encoding: Option<EncodingArg>,
    },

    /// Rewrite inline references in TEXT to display form
    Refs { text: String },

    /// Print the effective configuration
    Config {
        /// Write the current settings (defaults if no file exists) to disk
        #[arg(long)]
        init: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    Markdown,
    Bare,
}

impl From<EncodingArg> for ReferenceEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Markdown => ReferenceEncoding::Markdown,
            EncodingArg::Bare => ReferenceEncoding::Bare,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to ~/.atlink/atlink.log so stdout stays machine-readable
    {
        let log_dir = AtlinkConfig::data_dir();
        std::fs::create_dir_all(&log_dir).ok();
        let log_file = std::fs::File::create(log_dir.join("atlink.log"))?;

        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::try_from_env("ATLINK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(log_file)
            .with_ansi(false)
            .init();
    }

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(AtlinkConfig::config_path);
    let config = AtlinkConfig::load_from(&config_path)?;

    match args.command {
        Command::Parse { file, summary_only } => commands::parse(file, summary_only),
        Command::Detect { text, cursor } => commands::detect(&text, cursor),
        Command::Search {
            query,
            root,
            max,
            hidden,
        } => {
            let mut config = config;
            if let Some(max) = max {
                config.max_results = max;
            }
            if hidden {
                config.index_ignore_hidden = false;
            }
            commands::search(&query, &root, &config).await
        }
        Command::Pick {
            text,
            cursor,
            root,
            choose,
            encoding,
        } => {
            let mut config = config;
            if let Some(encoding) = encoding {
                config.reference_encoding = encoding.into();
            }
            commands::pick(&text, cursor, &root, choose, &config).await
        }
        Command::Refs { text } => commands::refs(&text),
        Command::Config { init } => commands::config(&config, &config_path, init),
    }
}
