//! chim - command-line client for the chim completion proxy
//!
//! Sends a prompt through the [`Chat`] adapter, either waiting for the whole
//! answer or printing fragments as they stream in.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chim::chat::{self, Chat, ChatRequest, Event, Message, ModelType};
use chim::config::{Config, KeySource};
use chim::Chim;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chim")]
#[command(about = "Chat with the chim OpenAI-compatible completion proxy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question and print the complete answer
    Ask(PromptArgs),

    /// Ask a question and print the answer as it streams in
    Stream(PromptArgs),

    /// List known models and the token budget chim offers for each
    Models,

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct PromptArgs {
    /// Path to configuration file (defaults plus CHIM_KEY when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model to ask
    #[arg(short, long, default_value = "gpt-3.5-turbo")]
    model: ModelType,

    /// Optional system prompt
    #[arg(short, long)]
    system: Option<String>,

    /// The user prompt
    prompt: String,
}

impl PromptArgs {
    fn request(&self) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(Message::system(system.as_str()));
        }
        messages.push(Message::user(self.prompt.as_str()));
        ChatRequest::new(self.model, messages)
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<(Config, KeySource)> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Config::from_env().context("building default config"),
    }
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("chim={}", default_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ask(args) => {
            let (config, _) = load_config(args.config.as_ref())?;
            init_tracing(&config.logging.level);
            let chim = Chim::new(config.provider)?;

            let response = chim.ask(&args.request()).await;
            println!("{}", response.content);
            if let Some(error) = response.error {
                anyhow::bail!(error);
            }
            Ok(())
        }

        Commands::Stream(args) => {
            let (config, _) = load_config(args.config.as_ref())?;
            init_tracing(&config.logging.level);
            let chim = Chim::new(config.provider)?;

            let request = args.request();
            let (tx, mut rx) = chat::channel();
            let producer = tokio::spawn(async move { chim.ask_stream(&request, tx).await });

            let mut stdout = std::io::stdout();
            let mut failure = None;
            while let Some(event) = rx.recv().await {
                match event {
                    Event::Message { content } => {
                        stdout.write_all(content.as_bytes())?;
                        stdout.flush()?;
                    }
                    Event::Done => {}
                    Event::Error { error } => failure = Some(error),
                }
            }
            println!();
            producer.await?;

            match failure {
                Some(error) => anyhow::bail!(error),
                None => Ok(()),
            }
        }

        Commands::Models => {
            let chim = Chim::new(Default::default())?;
            for model in ModelType::ALL {
                match chim.support(model) {
                    0 => println!("{:<20} unsupported", model),
                    budget => println!("{:<20} {}", model, budget),
                }
            }
            Ok(())
        }

        Commands::Check { config } => {
            let (config, key_source) = load_config(config.as_ref())?;
            init_tracing(&config.logging.level);
            tracing::info!(
                base_url = %config.provider.base_url,
                proxy = ?config.provider.proxy,
                key_source = %key_source,
                "Configuration is valid"
            );
            println!("endpoint:   {}", config.provider.completions_url());
            println!("api key:    {}", key_source);
            Ok(())
        }
    }
}
