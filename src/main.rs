use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use crossbeam_channel::RecvTimeoutError;
use facetalk::audio::wav::read_segment;
use facetalk::cli::{Cli, Commands, ConfigAction, status_timeout};
use facetalk::config::Config;
use facetalk::delivery::{AudioReceiver, AudioStreamClient, LoggingPlayer, check_status};
use facetalk::pipeline::{
    PipelineCoordinator, PipelineEvent, PipelineHandle, Stage, SynthesisStage,
};
use facetalk::text::SentenceSplitter;
use owo_colors::OwoColorize;
use std::io::BufRead;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Run { ref inputs } => {
            let config = load_effective_config(&cli)?;
            run_conversation(config, inputs, cli.quiet)?;
        }
        Commands::Speak { ref text } => {
            let config = load_effective_config(&cli)?;
            speak(config, text, cli.quiet)?;
        }
        Commands::Serve {
            ref host,
            port,
            attempts,
        } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(serve(host, port, attempts, cli.quiet))?;
        }
        Commands::Status { timeout } => {
            let config = load_effective_config(&cli)?;
            let status = check_status(&config.delivery.status_url, status_timeout(timeout))?;
            if status.is_connected() {
                println!("{} {}", config.delivery.status_url, status.green());
            } else {
                eprintln!("{} {}", config.delivery.status_url, status.red());
                std::process::exit(1);
            }
        }
        Commands::Config { ref action } => {
            handle_config_command(action, &cli)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "facetalk", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Log level comes from `-q`/`-v` unless `RUST_LOG` is set.
fn init_tracing(quiet: bool, verbose: u8) {
    let default = match (quiet, verbose) {
        (true, _) => "facetalk=warn",
        (false, 0) => "facetalk=info",
        (false, 1) => "facetalk=debug",
        (false, _) => "facetalk=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/facetalk/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

/// Configuration with command-line overrides applied and validated.
fn load_effective_config(cli: &Cli) -> Result<Config> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(mode) = cli.mode {
        config.delivery.mode = mode;
    }
    if let Some(url) = &cli.url {
        config.delivery.url = url.clone();
    }
    if let Some(delay) = cli.chunk_delay {
        config.delivery.chunk_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    }
    config.validate()?;
    Ok(config)
}

fn run_conversation(config: Config, inputs: &[std::path::PathBuf], quiet: bool) -> Result<()> {
    let handle = PipelineCoordinator::from_config(config)?.start()?;

    let outcome = if inputs.is_empty() {
        converse_from_stdin(&handle, quiet)
    } else {
        converse_from_files(&handle, inputs, quiet)
    };

    handle.stop();
    outcome
}

fn converse_from_files(
    handle: &PipelineHandle,
    inputs: &[std::path::PathBuf],
    quiet: bool,
) -> Result<()> {
    for path in inputs {
        let segment = read_segment(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if handle.submit_audio(segment) {
            wait_for_turn(handle, quiet);
        }
    }
    Ok(())
}

fn converse_from_stdin(handle: &PipelineHandle, quiet: bool) -> Result<()> {
    if !quiet {
        eprintln!("{}", "Type a message, one per line (Ctrl+D to quit)".dimmed());
    }
    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        if handle.submit_text(&line) {
            wait_for_turn(handle, quiet);
        }
    }
    Ok(())
}

/// Prints pipeline events until the turn has been spoken, has failed, or the
/// pipeline has gone quiet (silent audio produces no events at all).
fn wait_for_turn(handle: &PipelineHandle, quiet: bool) {
    let events = handle.events();
    let mut idle_checks = 0;
    loop {
        match events.recv_timeout(std::time::Duration::from_millis(200)) {
            Ok(event) => {
                idle_checks = 0;
                let done = matches!(event, PipelineEvent::Spoken(_) | PipelineEvent::Failed { .. });
                render_event(&event, quiet);
                if done {
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if handle.is_idle() {
                    idle_checks += 1;
                    if idle_checks >= 2 {
                        return;
                    }
                } else {
                    idle_checks = 0;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn render_event(event: &PipelineEvent, quiet: bool) {
    match event {
        PipelineEvent::Failed { stage, message } => {
            eprintln!("{}", format!("{} failed: {}", stage, message).red());
        }
        _ if quiet => {}
        PipelineEvent::Transcript(text) => println!("{} {}", "you:".dimmed(), text),
        PipelineEvent::Response(text) => println!("{} {}", "assistant:".green(), text),
        PipelineEvent::Spoken(spoken) => {
            tracing::debug!(utterances = spoken.utterances, "reply delivered");
        }
    }
}

fn speak(config: Config, text: &str, quiet: bool) -> Result<()> {
    let synthesizer = facetalk::tts::build_synthesizer(&config.synthesis)?;
    let splitter = SentenceSplitter::new(config.synthesis.splitter)?;
    let client = AudioStreamClient::from_config(&config.delivery)?;
    let mut stage = SynthesisStage::new(synthesizer, splitter, client, &config.synthesis.language);

    let spoken = stage
        .process(text.to_string())
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    stage.shutdown();

    if !quiet && let Some(spoken) = spoken {
        println!(
            "{} {} utterance(s) to {}",
            "Delivered".green(),
            spoken.utterances,
            config.delivery.url
        );
    }
    Ok(())
}

async fn serve(host: &str, port: u16, attempts: u16, quiet: bool) -> Result<()> {
    let receiver = AudioReceiver::bind(host, port, attempts).await?;
    let addr = receiver.local_addr()?;
    if !quiet {
        println!("Listening on {} (Ctrl+C to stop)", addr.green());
    }

    let shutdown = receiver.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
        }
        shutdown.cancel();
    });

    receiver.serve(LoggingPlayer::default()).await?;
    Ok(())
}

fn handle_config_command(action: &ConfigAction, cli: &Cli) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_effective_config(cli)?;
            print!("{}", config.to_display_toml()?);
        }
        ConfigAction::Path => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
