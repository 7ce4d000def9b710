//! # Grounded Chat CLI (`grounded-chat`)
//!
//! Runs the chat server and offers a few commands for checking a
//! deployment's credentials and retrieval quality from the terminal.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `grounded-chat serve` | Start the HTTP server |
//! | `grounded-chat ask "<message>"` | Run one message through the full pipeline |
//! | `grounded-chat retrieve "<message>"` | Show the chunks and context for a message |
//! | `grounded-chat config` | Print the effective configuration |
//!
//! Credentials come from the environment (`OPENAI_API_KEY`, `SUPABASE_URL`,
//! `SUPABASE_KEY`); a `.env` file in the working directory is loaded first.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use grounded_chat::config::{self, Config};
use grounded_chat::pipeline::ChatPipeline;
use grounded_chat::server;

/// Grounded Chat: a retrieval-augmented chat endpoint.
#[derive(Parser)]
#[command(
    name = "grounded-chat",
    about = "Grounded Chat — answer questions with context retrieved from a vector store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Optional: when the file does not exist, built-in defaults apply.
    #[arg(long, global = true, default_value = "./config/chat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` (the `PORT` environment variable overrides
    /// the port) and serves `POST /api/chat` and `GET /health`.
    Serve,

    /// Answer one message and print the reply.
    Ask {
        /// The question to answer.
        message: String,
    },

    /// Embed and retrieve only; print ranked chunks and the assembled context.
    Retrieve {
        /// The text to search for.
        message: String,
    },

    /// Print the effective configuration. Secrets are shown as set/unset.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask { message } => {
            let pipeline = ChatPipeline::from_config(&cfg)?;
            let reply = pipeline.answer(&message).await?;
            println!("{}", reply.reply);
        }
        Commands::Retrieve { message } => {
            let pipeline = ChatPipeline::from_config(&cfg)?;
            let retrieval = pipeline.retrieve(&message).await?;
            if retrieval.chunks.is_empty() {
                println!("No chunks above threshold {}.", cfg.retrieval.match_threshold);
            }
            for (rank, chunk) in retrieval.chunks.iter().enumerate() {
                println!("{}. [{:.3}] {}", rank + 1, chunk.similarity, chunk.content);
            }
            println!();
            println!(
                "Assembled context ({} chars):",
                retrieval.context.chars().count()
            );
            println!("{}", retrieval.context);
        }
        Commands::Config => {
            print_config(&cfg);
        }
    }

    Ok(())
}

fn print_config(cfg: &Config) {
    let secret = |name: &str| {
        if std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false) {
            "set"
        } else {
            "unset"
        }
    };

    println!("server.bind                  {}", cfg.server.bind);
    println!("server.request_timeout_secs  {}", cfg.server.request_timeout_secs);
    println!("embedding.model              {}", cfg.embedding.model);
    println!("embedding.base_url           {}", cfg.embedding.base_url);
    println!(
        "retrieval.url                {}",
        cfg.retrieval.url.as_deref().unwrap_or("(unset)")
    );
    println!("retrieval.function           {}", cfg.retrieval.function);
    println!("retrieval.match_threshold    {}", cfg.retrieval.match_threshold);
    println!("retrieval.match_count        {}", cfg.retrieval.match_count);
    println!("context.budget_chars         {}", cfg.context.budget_chars);
    println!("context.separator            {:?}", cfg.context.separator);
    println!("generation.model             {}", cfg.generation.model);
    println!("generation.base_url          {}", cfg.generation.base_url);
    println!("OPENAI_API_KEY               {}", secret("OPENAI_API_KEY"));
    println!("SUPABASE_KEY                 {}", secret("SUPABASE_KEY"));
}
