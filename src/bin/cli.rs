//! Fedsearch CLI
//!
//! Command-line client of a fedsearch (or compatible) server:
//! - Run searches and print records as JSON lines
//! - Count matches
//! - List directories
//! - Print a default config file

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

use fedsearch::config::{generate_default_config, LoggingConfig};
use fedsearch::peer::{PeerBackend, PeerOptions, DEFAULT_SERVER_URL};
use fedsearch::search::{Backend, Event, Options, SearchConfig};

#[derive(Parser)]
#[command(name = "fedsearch-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client of a search federation server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Server URL
    #[arg(long, default_value = DEFAULT_SERVER_URL, global = true)]
    pub server_url: String,

    /// Authorization token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Wire format (msgpack, json)
    #[arg(long, default_value = "msgpack", global = true)]
    pub format: String,

    /// Ask the server not to fan out to its own peers
    #[arg(long, global = true)]
    pub local: bool,

    /// Log level
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,
}

#[derive(clap::Args)]
pub struct QueryArgs {
    /// Search expression
    query: String,
    /// Input files (repeatable)
    #[arg(short, long = "file")]
    files: Vec<String>,
    /// Case insensitive matching
    #[arg(short = 'i', long)]
    ignore_case: bool,
    /// Fuzziness distance
    #[arg(long, default_value = "0")]
    fuzziness: u32,
    /// Bytes of context around each match
    #[arg(long, default_value = "0")]
    surrounding: u32,
    /// Search packet captures
    #[arg(long)]
    pcap: bool,
}

impl QueryArgs {
    fn config(&self) -> SearchConfig {
        let mut cfg = SearchConfig::new(self.query.as_str(), self.files.iter().map(String::as_str));
        cfg.case_sensitive = !self.ignore_case;
        cfg.fuzziness = self.fuzziness;
        cfg.surrounding = self.surrounding;
        cfg
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search and print matching records
    Search {
        #[command(flatten)]
        query: QueryArgs,
        /// Maximum number of records (0 for no limit)
        #[arg(short, long, default_value = "0")]
        limit: u64,
        /// Print locators only
        #[arg(long)]
        no_data: bool,
    },

    /// Count matches
    Count {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// List a directory
    Files {
        /// Directory path
        #[arg(default_value = "/")]
        dir: String,
        /// Include hidden entries
        #[arg(long)]
        hidden: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    fedsearch::init_logging(&LoggingConfig {
        level: cli.log_level.clone(),
        ..Default::default()
    });

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)?;
                eprintln!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let peer = connect(&cli)?;

    match &cli.command {
        Commands::Search { query, limit, no_data } => {
            let mut cfg = query.config().limit(*limit);
            cfg.report_data = !no_data;
            let result = if query.pcap { peer.pcap_search(&cfg)? } else { peer.search(&cfg)? };
            print_result(result).await?;
        }

        Commands::Count { query } => {
            let cfg = query.config();
            let result = if query.pcap {
                peer.pcap_search(&cfg.count_only())?
            } else {
                peer.count(&cfg)?
            };
            print_result(result).await?;
        }

        Commands::Files { dir, hidden } => {
            let info = peer.files(dir, *hidden).await?;
            println!("{}", info.dir_path);
            for name in &info.dirs {
                println!("  {}/", name);
            }
            for name in &info.files {
                println!("  {}", name);
            }
            for name in &info.catalogs {
                println!("  {} (catalog)", name);
            }
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

fn connect(cli: &Cli) -> Result<PeerBackend, Box<dyn std::error::Error>> {
    let mut opts = Options::new();
    opts.insert("server-url".into(), json!(cli.server_url));
    opts.insert("format".into(), json!(cli.format));
    opts.insert("local-only".into(), json!(cli.local));
    if let Some(token) = &cli.token {
        opts.insert("auth-token".into(), Value::String(token.clone()));
    }

    Ok(PeerBackend::new(PeerOptions::from_options(&opts)?)?)
}

async fn print_result(mut result: fedsearch::ResultReceiver) -> Result<(), Box<dyn std::error::Error>> {
    let mut failed = false;

    while let Some(event) = result.next_event().await {
        match event {
            Event::Record(rec) => println!("{}", serde_json::to_string(&rec)?),
            Event::Error(err) => {
                failed = true;
                eprintln!("error: {}", err);
            }
        }
    }
    result.done().await;

    match result.stat() {
        Some(stat) => eprintln!("{}", stat),
        None => eprintln!(
            "{} records, {} errors",
            result.records_reported(),
            result.errors_reported()
        ),
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
