use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kampe_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use secrecy::ExposeSecret;

#[derive(Debug, Parser)]
#[command(
    name = "kampe",
    about = "Policy-gated Telegram relay for the kampe chat backend",
    after_help = "Examples:\n  kampe\n  kampe --config config/kampe.toml run\n  kampe config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a TOML config file (default: kampe.toml, config/kampe.toml)")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override backend.base_url")]
    pub backend_url: Option<String>,
    #[arg(long, global = true, help = "Override server.health_check_port")]
    pub health_port: Option<u16>,
    #[arg(long, global = true, help = "Override logging.level")]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    #[command(about = "Start polling Telegram and relaying to the backend (default)")]
    Run,
    #[command(about = "Print the effective configuration with the bot token redacted")]
    Config,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                backend_url: self.backend_url.clone(),
                health_check_port: self.health_port,
                log_level: self.log_level.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn render_config(config: &AppConfig) -> String {
    let lines = [
        "effective config (precedence: overrides > env > file > default):".to_owned(),
        render_line("backend.base_url", &config.backend.base_url),
        render_line("backend.timeout_secs", &config.backend.timeout_secs.to_string()),
        render_line("telegram.bot_token", &redact_token(config.telegram.bot_token.expose_secret())),
        render_line("telegram.api_base_url", &config.telegram.api_base_url),
        render_line("telegram.poll_timeout_secs", &config.telegram.poll_timeout_secs.to_string()),
        render_line("policy.url", &config.policy.url),
        render_line("server.bind_address", &config.server.bind_address),
        render_line("server.health_check_port", &config.server.health_check_port.to_string()),
        render_line("logging.level", &config.logging.level),
        render_line("logging.format", &format!("{:?}", config.logging.format).to_lowercase()),
    ];
    lines.join("\n")
}

fn render_line(key: &str, value: &str) -> String {
    format!("- {key} = {value}")
}

/// Keeps the public bot id, hides the secret half.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_owned();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_owned()
}
