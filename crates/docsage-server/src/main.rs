//! DocSage: question answering over PDF text and images.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod diagnose;
mod routes;
mod state;

use docsage_core::DocSageConfig;
use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("DOCSAGE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn print_help() {
    println!("DocSage: multimodal PDF question answering");
    println!();
    println!("Usage: docsage [command]");
    println!();
    println!("Commands:");
    println!("  (none) | serve           Start the HTTP server");
    println!("  ingest <pdf>             Index a PDF's text and images");
    println!("  ask <question>           Answer a question from indexed documents");
    println!("  diagnose [data-dir]      Check model, store and API key setup");
    println!("  help                     Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("serve");

    match command {
        "--help" | "-h" | "help" => {
            print_help();
            return Ok(());
        }
        "diagnose" | "--diagnose" => {
            let data_dir = args.get(2).map(PathBuf::from).unwrap_or_else(resolve_data_dir);
            let config = DocSageConfig::from_env(&data_dir)?;
            let embedder = docsage_infer::create_embedder(&config.data_paths.models, config.embedding_dim);
            let report = diagnose::run(&config, embedder);
            diagnose::print_report(&report);
            std::process::exit(if report.is_healthy() { 0 } else { 1 });
        }
        "serve" | "ingest" | "ask" => {}
        other => {
            eprintln!("Unknown command: {}. Use 'docsage help' for usage.", other);
            std::process::exit(1);
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = DocSageConfig::from_env(&data_dir)?;
    let port = config.port;
    let embedder = docsage_infer::create_embedder(&config.data_paths.models, config.embedding_dim);
    let state = Arc::new(
        AppState::new(config, embedder).map_err(|e| anyhow::anyhow!("Failed to open index: {}", e))?,
    );
    if let Some(warning) = state.credential_warning() {
        warn!("{}; ingestion and questions will fail until a key is set", warning);
    }

    match command {
        "ingest" => {
            let Some(path) = args.get(2) else {
                eprintln!("Usage: docsage ingest <pdf>");
                std::process::exit(1);
            };
            let report = state.ingest_file(&PathBuf::from(path)).await?;
            println!(
                "Indexed {} units from {} ({} text, {} image)",
                report.units, report.source, report.text_units, report.image_units
            );
        }
        "ask" => {
            let question = args[2..].join(" ");
            if question.trim().is_empty() {
                eprintln!("Usage: docsage ask <question>");
                std::process::exit(1);
            }
            let answer = state.ask(&question).await?;
            println!("{}", answer.text);
            if !answer.sources.is_empty() {
                println!();
                println!("Sources:");
                for doc in &answer.sources {
                    println!(
                        "  {}. {} page {} (score {:.3})",
                        doc.rank,
                        doc.source().unwrap_or("Unknown"),
                        doc.metadata
                            .get("page")
                            .map(|p| p.to_string())
                            .unwrap_or_else(|| "?".into()),
                        doc.score
                    );
                }
            }
        }
        _ => {
            let app = routes::build_router(state);
            let addr = format!("0.0.0.0:{}", port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("DocSage server listening on {}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
