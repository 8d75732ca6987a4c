use clap::{Parser, Subcommand};
use singleton_assistant::{AnswerEntry, AppConfig, Assistant, EntryKind};
use singleton_retriever::{FileOutcome, StoreStats};
use std::path::PathBuf;
use std::process;
use tracing::Level;

/// Index local folders and ask questions about their files.
#[derive(Parser, Debug)]
#[command(name = "singleton", author, version, about, long_about = None)]
struct Args {
    /// Config file; must exist when given
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the databases, overriding the config file
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Route a query: search, or a command such as "stats" or "folder: x"
    Ask {
        #[arg(required = true)]
        query: Vec<String>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Index a directory tree or a single file
    Index {
        path: PathBuf,
        /// Only index the top level of a directory
        #[arg(long)]
        no_recursive: bool,
    },
    /// Keep a directory indexed until Ctrl-C
    Watch { root: PathBuf },
    /// Show index statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Find chunks similar to a text by embedding
    Similar {
        #[arg(required = true)]
        text: Vec<String>,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Show recent searches
    History {
        /// Maximum number of entries
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

const SUMMARY_CHARS: usize = 300;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn print_entry(entry: &AnswerEntry, format: &OutputFormat) {
    println!("{}", entry.title);
    if let Some(path) = &entry.path {
        match entry.score {
            Some(score) => println!("  {path} (score {score})"),
            None => println!("  {path}"),
        }
    }
    let text = match format {
        OutputFormat::Summary if entry.kind == EntryKind::FileResult => {
            let mut head: String = entry.text.chars().take(SUMMARY_CHARS).collect();
            if entry.text.chars().count() > SUMMARY_CHARS {
                head.push_str("...");
            }
            head
        }
        _ => entry.text.clone(),
    };
    println!("{text}\n");
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = AppConfig::load(args.config.as_deref(), args.data_dir.as_deref())?;
    let assistant = Assistant::open(config).await?;

    match args.command {
        Commands::Ask { query, format } => {
            let query = query.join(" ");
            let entries = assistant.orchestrator.answer(&query).await;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    print_entry(entry, &format);
                }
            }
        }
        Commands::Index { path, no_recursive } => {
            if path.is_dir() {
                let summary = assistant.indexer.index_tree(&path, !no_recursive).await?;
                println!(
                    "Indexed {}: {} files seen, {} indexed, {} unchanged, {} skipped, {} failed, {} chunks in {:.2}s",
                    summary.root.display(),
                    summary.files_seen,
                    summary.indexed,
                    summary.unchanged,
                    summary.skipped,
                    summary.failed,
                    summary.chunks_written,
                    summary.elapsed.as_secs_f64()
                );
            } else {
                let path = tokio::fs::canonicalize(&path).await?;
                match assistant.indexer.index_file(&path).await? {
                    FileOutcome::Indexed { chunks, vectors } => {
                        println!("Indexed {}: {chunks} chunks, {vectors} vectors", path.display())
                    }
                    FileOutcome::Unchanged => println!("Unchanged: {}", path.display()),
                    FileOutcome::Skipped(reason) => {
                        println!("Skipped {}: {:?}", path.display(), reason)
                    }
                }
            }
        }
        Commands::Watch { root } => {
            let mut watcher = assistant.watcher();
            watcher.start(&root).await?;
            println!("Watching {} (Ctrl-C to stop)", root.display());
            tokio::signal::ctrl_c().await?;
            watcher.stop().await;
        }
        Commands::Stats { format } => {
            let stats = StoreStats::collect(&assistant.stores).await;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", stats.render());
                let status = assistant.orchestrator.responder().status().await;
                println!("\n{}", status.line());
            }
        }
        Commands::Similar { text, limit } => {
            let matches = assistant.engine.similar(&text.join(" "), limit).await?;
            if matches.is_empty() {
                println!("No similar chunks found.");
            }
            for m in matches {
                let preview: String = m.text.chars().take(120).collect();
                println!("{:.3}  {}  [{}]\n       {}", m.score, m.path, m.chunk_id, preview);
            }
        }
        Commands::History { limit } => {
            for entry in assistant.engine.recent_searches(limit).await? {
                println!(
                    "{}  [{}]  {:?} ({} results)",
                    entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.search_type,
                    entry.query,
                    entry.results_count
                );
            }
        }
    }

    Ok(())
}
