use anyhow::Context;
use clap::Parser;
use std::io::{IsTerminal, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vibeswitch::formatting::{persona, LlamaCliBackend};
use vibeswitch::models::{ModelDownloader, ModelRegistry};
use vibeswitch::{AppConfig, VibeSwitch};

/// Closing the generation gap, one cringe text at a time.
#[derive(Parser, Debug)]
#[command(name = "vibeswitch", version, about)]
struct Args {
    /// Target persona key (see --list-personas)
    #[arg(short, long)]
    persona: Option<String>,

    /// Config file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the available personas and exit
    #[arg(long)]
    list_personas: bool,

    /// Print the known models and whether they are downloaded, then exit
    #[arg(long)]
    list_models: bool,

    /// Delete the configured model's local file and exit
    #[arg(long)]
    remove_model: bool,

    /// Text to rewrite; read from stdin when omitted
    text: Option<String>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_input(text: Option<String>) -> anyhow::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprintln!("Type a sentence or paste text, then press Ctrl-D:");
    }
    let mut buf = String::new();
    stdin.read_to_string(&mut buf).context("Failed to read stdin")?;
    Ok(buf)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    if args.list_personas {
        for p in persona::all() {
            println!("{:<16} {:<12} {}", p.key, p.short_name(), p.description);
        }
        return Ok(());
    }

    let config_path = match args.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::load(&config_path)?;

    if args.list_models {
        let registry = ModelRegistry::new(config.models_dir()?);
        for model in registry.list_models() {
            let present = if model.local_path().is_file() { "downloaded" } else { "-" };
            println!("{:<28} {:<11} {}", model.id, present, model.local_path().display());
        }
        return Ok(());
    }

    if args.remove_model {
        let descriptor = config.model_descriptor()?;
        ModelDownloader::new(config.http_timeout())?
            .remove_model(&descriptor)
            .await?;
        eprintln!("Removed {}", descriptor.local_path().display());
        return Ok(());
    }

    let persona_key = args.persona.unwrap_or_else(|| config.default_persona.clone());
    let text = read_input(args.text)?;

    let backend = LlamaCliBackend::new(config.llama_cli_path.clone())?;
    let app = VibeSwitch::from_config(&config, backend)?;

    let outcome = app
        .run(&text, &persona_key, |progress| {
            eprint!("\rDownloading model... {:>3}%", progress);
            let _ = std::io::stderr().flush();
            if progress == 100 {
                eprintln!();
            }
        })
        .await;

    app.close().await;

    match outcome {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
