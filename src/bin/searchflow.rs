//! CLI binary for searchflow.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use futures_util::StreamExt;
use searchflow::output::{self, OutputFormat};
use searchflow::{AppConfig, HealthStatus, PipelineEvent, QueryOptions, SearchPipeline};
use tracing_subscriber::EnvFilter;

/// Answer questions from live web search, with citations.
#[derive(Parser)]
#[command(name = "searchflow", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Ignore cached answers.
    #[arg(long)]
    no_cache: bool,

    /// Never split comparison questions into sub-queries.
    #[arg(long)]
    no_decompose: bool,

    /// List scored sources without generating an answer.
    #[arg(long, conflicts_with = "research")]
    sources_only: bool,

    /// Maximum sources listed with --sources-only.
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Research the question as a topic, exploring up to DEPTH queries (1-5).
    #[arg(long, value_name = "DEPTH")]
    research: Option<usize>,

    /// Print progress and answer tokens as they are produced.
    #[arg(long, conflicts_with_all = ["sources_only", "research"])]
    stream: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    init_config: bool,

    /// Check SearXNG reachability and print a health report.
    #[arg(long, conflicts_with = "init_config")]
    health: bool,

    /// Print cache statistics to stderr after answering.
    #[arg(long)]
    cache_stats: bool,

    /// The question to answer.
    #[arg(required_unless_present_any = ["init_config", "health"])]
    question: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for JSON output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("searchflow=info,searchflow_search=info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(AppConfig::default_config_path);

    let config = if config_path.exists() {
        AppConfig::from_file(&config_path)?
    } else if cli.config.is_some() {
        anyhow::bail!("config file not found: {}", config_path.display());
    } else {
        AppConfig::default()
    };

    if cli.init_config {
        config.save_to_file(&config_path)?;
        eprintln!("wrote {}", config_path.display());
        return Ok(());
    }

    let pipeline = SearchPipeline::from_config(&config)?;
    if cli.health {
        let report = pipeline.health().await;
        println!("{}", output::to_pretty_json(&report)?);
        if report.status != HealthStatus::Healthy {
            anyhow::bail!("searxng unreachable at {}", config.search.searxng_url);
        }
        return Ok(());
    }

    let question = cli.question.join(" ");
    let options = QueryOptions {
        skip_cache: cli.no_cache,
        no_decompose: cli.no_decompose,
    };
    let text_chars = config.pipeline.source_text_chars;

    let rendered = if cli.sources_only {
        let report = pipeline.sources(&question, cli.limit).await?;
        match cli.format {
            OutputFormat::Json => output::to_pretty_json(&report)?,
            OutputFormat::Markdown | OutputFormat::Text => output::render_sources_markdown(&report),
        }
    } else if let Some(depth) = cli.research {
        let report = pipeline.research(&question, depth).await?;
        match cli.format {
            OutputFormat::Json => output::to_pretty_json(&report)?,
            OutputFormat::Markdown | OutputFormat::Text => output::render_research_markdown(&report),
        }
    } else if cli.stream {
        run_stream(&pipeline, &question, options, cli.format).await?;
        return report_cache(&pipeline, cli.cache_stats).await;
    } else {
        let result = pipeline.answer_with(&question, options).await?;
        match cli.format {
            OutputFormat::Json => output::render_json(&result, text_chars)?,
            OutputFormat::Markdown => output::render_markdown(&result),
            OutputFormat::Text => output::render_text(&result),
        }
    };

    println!("{rendered}");
    report_cache(&pipeline, cli.cache_stats).await
}

async fn report_cache(pipeline: &SearchPipeline, enabled: bool) -> anyhow::Result<()> {
    if enabled {
        let stats = pipeline.cache_stats().await;
        eprintln!(
            "cache: {} hits, {} misses, {} entries ({:.0}% hit rate)",
            stats.hits,
            stats.misses,
            stats.entries,
            stats.hit_rate() * 100.0
        );
    }
    Ok(())
}

/// Print events as they arrive: one JSON object per line for `json`,
/// otherwise status on stderr and answer text on stdout.
async fn run_stream(
    pipeline: &SearchPipeline,
    question: &str,
    options: QueryOptions,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    let mut events = std::pin::pin!(pipeline.answer_stream(question, options));

    while let Some(event) = events.next().await {
        if format == OutputFormat::Json {
            writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
            continue;
        }
        match event {
            PipelineEvent::Status { message, .. } => eprintln!("{message}"),
            PipelineEvent::Token { content } => {
                write!(stdout, "{content}")?;
                stdout.flush()?;
            }
            PipelineEvent::Done { result } => {
                writeln!(stdout)?;
                if format == OutputFormat::Markdown {
                    for (i, source) in result.sources.iter().enumerate() {
                        writeln!(stdout, "{}. <{}>", i + 1, source.url)?;
                    }
                }
                writeln!(stdout, "\nConfidence: {:.2}", result.confidence)?;
            }
            PipelineEvent::Error { message } => anyhow::bail!(message),
        }
    }
    Ok(())
}
