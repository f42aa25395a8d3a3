use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use colored::Colorize;
use dotenv::dotenv;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::net::TcpListener;

use graphrag_agent::agent::{GraphKnowledgeBase, Grader, SelfRagAgent};
use graphrag_agent::api;
use graphrag_agent::commands::{pipeline, CommandHandler};
use graphrag_agent::config::{AgentConfig, EmbeddingConfig, GraphConfig, VectorDbConfig};
use graphrag_agent::graph::GraphStore;
use graphrag_agent::providers::embeddings::EmbeddingClient;
use graphrag_agent::providers::provider_from_env;
use graphrag_agent::retrieval::{GraphRetriever, HybridRetriever, VectorStore};

#[derive(Parser, Debug)]
#[command(author, version, about = "PDF-to-knowledge-graph pipeline with a self-correcting retrieval agent", long_about = None)]
struct Args {
    /// Model backend: deepseek or ollama
    #[arg(long, global = true, default_value = "deepseek")]
    provider: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert PDFs under data/raw into markdown
    Convert,
    /// Split converted markdown into hierarchical chunks
    Split,
    /// Load chunks into the graph as document/section/chunk nodes
    BuildStructure,
    /// Extract entities and relations from unprocessed chunks
    BuildEntities,
    /// Embed chunks and fill both vector indexes
    BuildVectors,
    /// Run structure, entity, and vector builds in order
    BuildAll,
    /// Print graph node and relation counts
    Stats,
    /// Answer one question and exit
    Ask {
        question: String,
        /// Retrieval engine: hybrid or graph
        #[arg(long, default_value = "hybrid")]
        engine: String,
    },
    /// Interactive chat with the self-correcting agent
    Chat,
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    colored::control::set_override(true);
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Command::Convert => pipeline::convert().await,
        Command::Split => pipeline::split().await,
        Command::BuildStructure => pipeline::build_structure().await,
        Command::BuildEntities => pipeline::build_entities(&args.provider).await,
        Command::BuildVectors => pipeline::build_vectors().await,
        Command::BuildAll => pipeline::build_all(&args.provider).await,
        Command::Stats => pipeline::stats().await,
        Command::Ask { question, engine } => {
            pipeline::ask(&args.provider, &question, &engine).await
        }
        Command::Chat => run_chat(&args.provider).await,
        Command::Serve { port } => run_server(&args.provider, port).await,
    }
}

async fn run_chat(provider_name: &str) -> anyhow::Result<()> {
    let mut handler = CommandHandler::new(provider_name).await?;

    // Show initial help menu
    if let Err(e) = handler.handle_command("help").await {
        println!("{}", e.red());
    }

    let mut rl = Editor::<(), DefaultHistory>::new()?;

    loop {
        match rl.readline("👤 ") {
            Ok(line) => {
                let input = line.trim();
                if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
                    println!("👋 Goodbye!");
                    break;
                }
                let _ = rl.add_history_entry(input);

                if let Err(e) = handler.handle_command(input).await {
                    println!("{}", e.red());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}

async fn run_server(provider_name: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    println!("Starting API server on {}", addr);

    let graph_config = GraphConfig::from_env()?;
    let store = GraphStore::connect(&graph_config).await?;
    let agent_config = AgentConfig::from_env();
    let provider = provider_from_env(provider_name)?;

    let grader = if agent_config.llm_grading {
        Grader::with_model(provider.clone_box())
    } else {
        Grader::lenient()
    };
    let retriever = GraphRetriever::new(store.clone());
    let knowledge =
        GraphKnowledgeBase::new(retriever.clone(), agent_config.retrieval_limit as i64);
    let agent = SelfRagAgent::new(provider.clone_box(), Box::new(knowledge), grader, &agent_config);

    let embedder = EmbeddingClient::new(EmbeddingConfig::from_env()?);
    let vectors = VectorStore::connect(&VectorDbConfig::from_env()?).await?;
    let hybrid = HybridRetriever::new(vectors, store, embedder);

    let app = api::create_api(agent, hybrid, retriever, provider).await;

    let listener = TcpListener::bind(&addr).await?;
    println!("Server successfully bound to {}", addr);
    println!("Ready to accept connections!");

    axum::serve(listener, app).await?;
    Ok(())
}
