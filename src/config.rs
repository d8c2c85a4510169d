use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::inference::{ClientConfig, SegmentMode};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "image2text")]
#[command(about = "Upload an image, get back the text in it")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    // Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    // Inference API base URL
    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = "https://api.anthropic.com", global = true)]
    pub api_base_url: String,

    // Model used for transcription
    #[arg(long, default_value = "claude-3-sonnet-20240229", global = true)]
    pub model: String,

    // Max output tokens per call
    #[arg(long, default_value_t = 1000, global = true)]
    pub max_tokens: u32,

    // Rate limit max calls per window
    #[arg(long, default_value_t = 5, global = true)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 1800, global = true)]
    pub rate_window: u64,

    // Inference request timeout in seconds
    #[arg(long, default_value_t = 60, global = true)]
    pub request_timeout: u64,

    // Return every ★ segment instead of only the first
    #[arg(long, global = true)]
    pub all_segments: bool,

    // Interface to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0", global = true)]
    pub host: String,

    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080, global = true)]
    pub port: u16,

    // Largest accepted upload in megabytes
    #[arg(long, default_value_t = 10, global = true)]
    pub max_upload_mb: usize,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    // Run the web UI (default)
    Serve,
    // Transcribe a single image file and print the result
    Extract {
        // Path to a .jpg, .jpeg or .png file
        path: PathBuf,
    },
}

impl Args {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }

    // Fails fast when the credential is missing or a limit makes no sense
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        if self.request_timeout == 0 {
            return Err(ConfigError::Zero("--request-timeout"));
        }

        Ok(ClientConfig {
            api_key: api_key.to_string(),
            base_url: self.api_base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.request_timeout),
            segments: if self.all_segments { SegmentMode::All } else { SegmentMode::First },
        })
    }

    pub fn rate_window(&self) -> Result<Duration, ConfigError> {
        if self.rate_limit == 0 {
            return Err(ConfigError::Zero("--rate-limit"));
        }
        if self.rate_window == 0 {
            return Err(ConfigError::Zero("--rate-window"));
        }
        Ok(Duration::from_secs(self.rate_window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_original_quota() {
        let args = parse(&["image2text", "--api-key", "k"]);
        assert!(args.command.is_none());
        assert_eq!(args.rate_limit, 5);
        assert_eq!(args.rate_window().unwrap(), Duration::from_secs(1800));

        let cfg = args.client_config().unwrap();
        assert_eq!(cfg.model, "claude-3-sonnet-20240229");
        assert_eq!(cfg.max_tokens, 1000);
        assert_eq!(cfg.segments, SegmentMode::First);
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let mut args = parse(&["image2text", "--api-key", "  "]);
        assert!(matches!(args.client_config(), Err(ConfigError::MissingApiKey)));
        args.api_key = None;
        assert!(matches!(args.client_config(), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn extract_subcommand_takes_path() {
        let args = parse(&["image2text", "extract", "sign.png", "--all-segments", "--api-key", "k"]);
        match &args.command {
            Some(Command::Extract { path }) => assert_eq!(*path, PathBuf::from("sign.png")),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(args.client_config().unwrap().segments, SegmentMode::All);
    }

    #[test]
    fn serve_flags() {
        let args = parse(&["image2text", "serve", "--port", "9000", "--max-upload-mb", "2"]);
        assert_eq!(args.command, Some(Command::Serve));
        assert_eq!(args.port, 9000);
        assert_eq!(args.max_upload_bytes(), 2 * 1024 * 1024);

        // accepted before the subcommand too, and with no subcommand at all
        assert_eq!(parse(&["image2text", "--port", "9001", "serve"]).port, 9001);
        assert_eq!(parse(&["image2text", "-p", "9002"]).port, 9002);
    }

    #[test]
    fn default_serve_reads_host_and_port_from_env() {
        // SAFETY: no other test reads HOST, and the ones that check the port pass it explicitly
        unsafe {
            std::env::set_var("PORT", "9123");
            std::env::set_var("HOST", "127.0.0.1");
        }
        let args = parse(&["image2text", "--api-key", "k"]);
        assert!(args.command.is_none());
        assert_eq!(args.port, 9123);
        assert_eq!(args.host, "127.0.0.1");
    }

    #[test]
    fn zero_window_is_rejected() {
        let args = parse(&["image2text", "--rate-window", "0"]);
        assert!(matches!(args.rate_window(), Err(ConfigError::Zero("--rate-window"))));
    }
}
