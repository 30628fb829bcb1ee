//! finops-retrieval - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use finops_retrieval::{
    build_pipeline,
    cli::{Args, Commands, Verbosity},
    evaluation::{load_judgments, EvaluationResult, RetrievalEvaluator},
    integration::{QueryHandler, QueryRequest, QueryResponse},
    telemetry::RetrievalTelemetry,
    Config,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter
const LOG_ENV: &str = "FINOPS_LOG";

/// Structured logs to stderr; stdout is reserved for results
fn init_tracing(filter: &str, json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let verbosity = args.verbosity();

    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    init_tracing(&verbosity.log_filter(&config.logging.level), config.logging.json);
    debug!(verbosity = verbosity.as_str(), config = ?args.config, "configuration loaded");

    match &args.command {
        Commands::Query {
            text,
            top_k,
            no_rerank,
            providers,
            json,
        } => {
            let request = QueryRequest {
                query: text.clone(),
                top_k: top_k.unwrap_or(config.retrieval.default_top_k),
                use_reranking: config.retrieval.use_reranking && !no_rerank,
                provider_filter: (!providers.is_empty()).then(|| providers.clone()),
            };
            run_query(&config, request, *json, verbosity).await?;
        }
        Commands::Evaluate { file, json } => {
            run_evaluate(&config, file, *json, verbosity).await?;
        }
        Commands::Doctor => {
            run_doctor(&config).await?;
        }
        Commands::Config { init } => {
            show_config(&args, &config, *init)?;
        }
    }

    Ok(())
}

async fn run_query(
    config: &Config,
    request: QueryRequest,
    json: bool,
    verbosity: Verbosity,
) -> Result<()> {
    let telemetry = RetrievalTelemetry::new();
    let pipeline = build_pipeline(config)
        .await
        .context("Failed to initialize retrieval pipeline")?
        .with_telemetry(telemetry.clone());
    let handler = QueryHandler::new(Arc::new(pipeline));

    let response = handler.handle(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
        if matches!(verbosity, Verbosity::Verbose | Verbosity::VeryVerbose) {
            telemetry.display_summary();
        }
    }

    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

fn print_response(response: &QueryResponse) {
    println!("\n{} {}", "Query:".bold(), response.query);
    println!(
        "{} result(s) in {:.2} ms\n",
        response.total_results, response.processing_time_ms
    );

    if response.results.is_empty() {
        println!("{}", "No results.".yellow());
        return;
    }

    for (i, result) in response.results.iter().enumerate() {
        println!("{}", format!("Result {}", i + 1).cyan().bold());
        println!("  Source:   {}", result.source);
        println!("  Provider: {}", result.provider.green());
        match result.rerank_score {
            Some(score) => println!("  Rerank:   {:.4}", score),
            None => println!("  Score:    {:.4}", result.confidence_score),
        }
        println!("  Preview:  {}", preview(&result.content, 200));
        println!("  URL:      {}", result.url.dimmed());
        println!();
    }
}

async fn run_evaluate(config: &Config, file: &Path, json: bool, verbosity: Verbosity) -> Result<()> {
    let judgments = load_judgments(file)
        .with_context(|| format!("Failed to load judgments from {}", file.display()))?;

    let pipeline = build_pipeline(config)
        .await
        .context("Failed to initialize retrieval pipeline")?;
    let evaluator = RetrievalEvaluator::with_config(Arc::new(pipeline), &config.evaluation)?;

    let pb = if verbosity.show_progress() && !json {
        let pb = ProgressBar::new(judgments.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let progress = pb.clone();
    let recall_k = evaluator.recall_k();
    let mrr_window = evaluator.mrr_window();
    let result = evaluator
        .evaluate_with_progress(&judgments, move |idx, q| {
            progress.println(format!(
                "Query {}: {}\n  Recall@{}: {:.3}\n  MRR@{}: {:.3}\n",
                idx + 1,
                q.query,
                recall_k,
                q.recall,
                mrr_window,
                q.mrr
            ));
            progress.inc(1);
        })
        .await?;
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result, mrr_window);
    }

    Ok(())
}

fn print_summary(result: &EvaluationResult, mrr_window: usize) {
    println!("{}", "-".repeat(60));
    println!("{}", "EVALUATION SUMMARY".bold());
    println!("{}", "-".repeat(60));
    println!("Average Recall@{}: {:.3}", result.recall_k, result.avg_recall_at_k);
    println!("Average MRR@{}:    {:.3}", mrr_window, result.avg_mrr);
    println!("Queries Evaluated: {}", result.num_queries);
    println!("{}", "-".repeat(60));
}

async fn run_doctor(config: &Config) -> Result<()> {
    println!("\n{}\n", "finops-retrieval doctor".bold());
    println!("  Embedding: {:?} ({})", config.embedding.backend, config.embedding.model);
    println!("  Store:     {:?} ({})", config.store.backend, config.store.url);
    println!("  Reranker:  {:?} ({})", config.reranker.backend, config.reranker.model);
    println!("  Collection: {}\n", config.store.collection);

    let pipeline = match build_pipeline(config).await {
        Ok(pipeline) => {
            println!("{} pipeline initialized", "✓".green());
            pipeline
        }
        Err(err) => {
            println!("{} pipeline initialization failed: {}", "✗".red(), err);
            std::process::exit(1);
        }
    };

    let pipeline = Arc::new(pipeline);
    let handler = QueryHandler::new(pipeline.clone());
    let health = handler.health().await;
    match health.indexed_chunks {
        Some(count) => println!("{} collection reachable ({} chunks)", "✓".green(), count),
        None => println!("{} collection unreachable", "✗".red()),
    }

    let mut ready = health.pipeline_ready;
    if ready {
        match pipeline.check_dimensions().await {
            Ok(()) => println!("{} embedding dimensions match the collection", "✓".green()),
            Err(err) => {
                println!("{} {}", "✗".red(), err);
                ready = false;
            }
        }

        match handler.stats().await {
            Ok(stats) => {
                let providers = if stats.providers.is_empty() {
                    "none tagged".to_string()
                } else {
                    stats.providers.join(", ")
                };
                println!("\n  Chunks:     {}", stats.total_chunks);
                println!("  Providers:  {}", providers);
                println!(
                    "  Embedding:  {} ({} dims)",
                    stats.embedding_model, stats.embedding_dimension
                );
                println!("  Reranker:   {}", stats.reranker_model);
                println!("  Store:      {}", stats.vector_db_type);
            }
            Err(err) => println!("{} stats unavailable: {}", "!".yellow(), err),
        }
    }
    println!("\nStatus: {}", if ready { health.status.as_str() } else { "degraded" });

    std::process::exit(if ready { 0 } else { 1 });
}

fn show_config(args: &Args, config: &Config, init: bool) -> Result<()> {
    let path: Option<PathBuf> = args.config.clone().or_else(Config::default_path);

    if init {
        let path = path.context("Could not determine a config path; pass --config")?;
        if path.exists() {
            println!("{} {} already exists", "!".yellow(), path.display());
        } else {
            Config::default().save(&path)?;
            println!("{} wrote default configuration to {}", "✓".green(), path.display());
        }
        return Ok(());
    }

    if let Some(path) = &path {
        let state = if path.exists() { "" } else { " (not found, using defaults)" };
        println!("# {}{}", path.display(), state);
    }
    let mut shown = config.clone();
    for key in [
        &mut shown.embedding.api_key,
        &mut shown.store.api_key,
        &mut shown.reranker.api_key,
    ] {
        if key.is_some() {
            *key = Some("***".to_string());
        }
    }
    println!("{}", toml::to_string_pretty(&shown)?);

    Ok(())
}
