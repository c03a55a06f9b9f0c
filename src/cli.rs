//! Command-line interface for facetalk
//!
//! Provides argument parsing using clap derive macros.

use crate::defaults;
use crate::delivery::client::DeliveryMode;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Talk to a language model through a 3D face
#[derive(Parser, Debug)]
#[command(
    name = "facetalk",
    version,
    about = "Talk to a language model through a 3D face"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug logs, -vv: trace logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Delivery mode override (single-push, streamed)
    #[arg(long, global = true, value_name = "MODE")]
    pub mode: Option<DeliveryMode>,

    /// Animation service address override (host:port)
    #[arg(long, global = true, value_name = "ADDR")]
    pub url: Option<String>,

    /// Pause between streamed chunks. Examples: 40ms, 0.1s
    #[arg(long, global = true, value_name = "DURATION", value_parser = parse_duration)]
    pub chunk_delay: Option<Duration>,
}

/// Parse a duration string.
///
/// Bare numbers are milliseconds; anything else goes through `humantime`
/// (`40ms`, `1s`, `1s 500ms`).
/// Timeout for the `status` check, falling back to the built-in default.
pub fn status_timeout(timeout: Option<Duration>) -> Duration {
    timeout.unwrap_or(Duration::from_secs(defaults::STATUS_TIMEOUT_SECS))
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the conversation pipeline
    ///
    /// With WAV files, each file is one user utterance. Without, every line
    /// read from stdin is one user utterance.
    Run {
        /// 16-bit PCM WAV files to feed as user speech
        #[arg(value_name = "WAV")]
        inputs: Vec<PathBuf>,
    },

    /// Synthesize TEXT and deliver it to the animation service
    Speak {
        /// Text to speak
        text: String,
    },

    /// Receive delivered audio and log each session (stand-in animation service)
    Serve {
        /// Interface to listen on
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// First port to try
        #[arg(long, short = 'p', default_value_t = crate::defaults::RECEIVER_PORT)]
        port: u16,

        /// How many successive ports to try while the requested one is busy
        #[arg(long, default_value_t = crate::defaults::RECEIVER_PORT_ATTEMPTS)]
        attempts: u16,
    },

    /// Check whether the animation service is reachable
    Status {
        /// Request timeout [default: 3s]. Examples: 3s, 500ms
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        timeout: Option<Duration>,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_without_inputs_reads_stdin() {
        let cli = Cli::try_parse_from(["facetalk", "run"]).unwrap();
        match cli.command {
            Commands::Run { inputs } => assert!(inputs.is_empty()),
            _ => panic!("Expected Run command"),
        }
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
        assert!(cli.mode.is_none());
    }

    #[test]
    fn test_run_with_wav_inputs() {
        let cli = Cli::try_parse_from(["facetalk", "run", "a.wav", "b.wav"]).unwrap();
        match cli.command {
            Commands::Run { inputs } => {
                assert_eq!(inputs, vec![PathBuf::from("a.wav"), PathBuf::from("b.wav")]);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_command_is_required() {
        assert!(Cli::try_parse_from(["facetalk"]).is_err());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["facetalk", "-vv", "status"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_global_options_after_command() {
        let cli = Cli::try_parse_from([
            "facetalk",
            "speak",
            "Hello.",
            "--mode",
            "streamed",
            "--url",
            "localhost:6000",
            "--config",
            "/tmp/facetalk.toml",
        ])
        .unwrap();
        assert_eq!(cli.mode, Some(DeliveryMode::Streamed));
        assert_eq!(cli.url.as_deref(), Some("localhost:6000"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/facetalk.toml")));
        match cli.command {
            Commands::Speak { text } => assert_eq!(text, "Hello."),
            _ => panic!("Expected Speak command"),
        }
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        assert!(Cli::try_parse_from(["facetalk", "--mode", "shout", "status"]).is_err());
    }

    #[test]
    fn test_chunk_delay_formats() {
        let cli = Cli::try_parse_from(["facetalk", "--chunk-delay", "40", "status"]).unwrap();
        assert_eq!(cli.chunk_delay, Some(Duration::from_millis(40)));

        let cli = Cli::try_parse_from(["facetalk", "--chunk-delay", "1s 500ms", "status"]).unwrap();
        assert_eq!(cli.chunk_delay, Some(Duration::from_millis(1500)));

        assert!(Cli::try_parse_from(["facetalk", "--chunk-delay", "soon", "status"]).is_err());
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["facetalk", "serve"]).unwrap();
        match cli.command {
            Commands::Serve {
                host,
                port,
                attempts,
            } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, crate::defaults::RECEIVER_PORT);
                assert_eq!(attempts, crate::defaults::RECEIVER_PORT_ATTEMPTS);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_status_timeout() {
        let cli = Cli::try_parse_from(["facetalk", "status", "--timeout", "500ms"]).unwrap();
        match cli.command {
            Commands::Status { timeout } => {
                assert_eq!(status_timeout(timeout), Duration::from_millis(500))
            }
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_status_timeout_default() {
        let cli = Cli::try_parse_from(["facetalk", "status"]).unwrap();
        match cli.command {
            Commands::Status { timeout } => {
                assert_eq!(timeout, None);
                assert_eq!(status_timeout(timeout), Duration::from_secs(3));
            }
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_config_requires_action() {
        assert!(Cli::try_parse_from(["facetalk", "config"]).is_err());
        let cli = Cli::try_parse_from(["facetalk", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["facetalk", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }
}
