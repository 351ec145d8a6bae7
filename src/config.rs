//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.qualitygate.toml` files, and reading credentials from the environment.

use crate::models::ToolSpec;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".qualitygate.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Analysis tools, run and reported in this order.
    #[serde(default = "default_tools")]
    pub tools: Vec<ToolSpec>,

    /// Narrative generation settings.
    #[serde(default)]
    pub ai: AiConfig,

    /// Mail settings.
    #[serde(default)]
    pub mail: MailConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            tools: default_tools(),
            ai: AiConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Working directory for every tool and for git queries.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// Where the analysis report is persisted, relative to the project root.
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,

    /// Number of tools run at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            report_path: default_report_path(),
            concurrency: default_concurrency(),
            verbose: false,
        }
    }
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_report_path() -> PathBuf {
    PathBuf::from("tools/.last_analysis.log")
}

fn default_concurrency() -> usize {
    1
}

fn default_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "Compilation (syntaxe)",
            &["python3", "-m", "compileall", "-q", "app"],
        )
        .with_install_hint("installez Python 3 et vérifiez que 'python3' est dans le PATH"),
        ToolSpec::new(
            "Black (formatage)",
            &["python3", "-m", "black", "--check", "--diff", "app"],
        )
        .with_install_hint("pip install black"),
        ToolSpec::new("Flake8 (lint)", &["python3", "-m", "flake8", "app"])
            .with_install_hint("pip install flake8"),
        ToolSpec::new("Mypy (typage strict)", &["python3", "-m", "mypy", "app"])
            .with_install_hint("pip install mypy"),
    ]
}

/// Generative-AI endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Base URL of the Gemini REST API (without trailing slash).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifiers, tried in this order until one answers.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_ai_timeout")]
    pub timeout_seconds: u64,

    /// Number of diff characters sent in the prompt.
    #[serde(default = "default_diff_char_limit")]
    pub diff_char_limit: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            models: default_models(),
            timeout_seconds: default_ai_timeout(),
            diff_char_limit: default_diff_char_limit(),
        }
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1".to_string()
}

fn default_models() -> Vec<String> {
    vec!["gemini-2.5-flash", "gemini-2.0-flash", "gemini-1.5-flash"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_ai_timeout() -> u64 {
    60
}

fn default_diff_char_limit() -> usize {
    3000
}

/// SMTP settings. Credentials come from [`Credentials`], never from the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// SMTP relay host (implicit TLS).
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Timeout for the whole SMTP exchange, in seconds.
    #[serde(default = "default_mail_timeout")]
    pub timeout_seconds: u64,

    /// Project name shown in the mail subject.
    #[serde(default = "default_project_name")]
    pub project_name: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            timeout_seconds: default_mail_timeout(),
            project_name: default_project_name(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_mail_timeout() -> u64 {
    30
}

fn default_project_name() -> String {
    "Smart CV Generator".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings and only
    /// override values they explicitly provide.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref root) = args.project_root {
            self.general.project_root = root.clone();
        }
        if let Some(ref report_path) = args.report_path {
            self.general.report_path = report_path.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if !args.model.is_empty() {
            self.ai.models = args.model.clone();
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Absolute-or-relative path of the persisted report.
    pub fn report_file(&self) -> PathBuf {
        self.general.project_root.join(&self.general.report_path)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Secrets read once from the environment at start-up.
///
/// Each missing value disables only the feature that needs it.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Sender address, also the fallback recipient.
    pub sender_email: Option<String>,
    /// SMTP application password.
    pub mail_password: Option<String>,
    /// Gemini API key.
    pub api_key: Option<String>,
}

impl Credentials {
    pub const SENDER_EMAIL: &'static str = "SENDER_EMAIL";
    pub const MAIL_PASSWORD: &'static str = "GEMINI_APP_PASSWORD";
    pub const API_KEY: &'static str = "GEMINI_API_KEY";

    /// Reads credentials from the process environment, after sourcing `.env`.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds credentials from an arbitrary key lookup. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            sender_email: read(Self::SENDER_EMAIL),
            mail_password: read(Self::MAIL_PASSWORD),
            api_key: read(Self::API_KEY),
        }
    }

    /// Sender address and password, when both are set.
    pub fn smtp_login(&self) -> Option<(&str, &str)> {
        match (&self.sender_email, &self.mail_password) {
            (Some(sender), Some(password)) => Some((sender.as_str(), password.as_str())),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "<set>");
        f.debug_struct("Credentials")
            .field("sender_email", &self.sender_email)
            .field("mail_password", &mask(&self.mail_password))
            .field("api_key", &mask(&self.api_key))
            .finish()
    }
}
