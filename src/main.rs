//! QualityGate - analyzers, AI narrative and mail for every commit
//!
//! A CLI meant for git hooks and CI jobs: it runs the configured analysis
//! tools, persists a text report, asks Gemini to narrate it against the
//! current diff and mails the committer.
//!
//! Exit codes:
//!   0 - Every analysis tool passed
//!   1 - At least one tool failed, or invalid arguments/configuration

mod analysis;
mod cli;
mod config;
mod models;
mod narrative;
mod notify;
mod repo;
mod report;

use anyhow::{Context, Result};
use chrono::Local;
use cli::Args;
use config::{Config, Credentials, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Report, RunStatus};
use narrative::{GeminiClient, GenerativeBackend, NarrativeGenerator};
use notify::{Delivery, Notifier, SmtpMailer};
use repo::GitContext;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config comes first so `verbose = true` in the file reaches the logger
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(effective_level(&args, &config));

    info!("QualityGate v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match source {
        ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
        ConfigSource::Defaults => debug!("No config file found, using defaults"),
        ConfigSource::Invalid(reason) => warn!("Failed to load config: {}", reason),
    }

    let credentials = Credentials::from_env();
    debug!("Credentials: {:?}", credentials);

    let exit_code = run_pipeline(&args, &config, &credentials).await;
    std::process::exit(exit_code);
}

/// Handle --init-config: generate a default .qualitygate.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize tools, models, report path and mail settings.");
    Ok(())
}

/// Where the configuration came from, logged once logging is up.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    Invalid(String),
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` that cannot be loaded is fatal; a broken default
/// file only falls back to defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::File(PathBuf::from(CONFIG_FILE_NAME)))),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => Ok((Config::default(), ConfigSource::Invalid(format!("{:#}", e)))),
    }
}

/// Log level from CLI flags, with the config file able to turn on verbose.
fn effective_level(args: &Args, config: &Config) -> Level {
    if args.quiet {
        Level::ERROR
    } else if config.general.verbose {
        Level::DEBUG
    } else {
        args.log_level()
    }
}

/// Initialize logging. `RUST_LOG` overrides the computed filter.
fn init_logging(level: Level) {
    let dependencies = if level == Level::ERROR { "error" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},qualitygate={}",
            dependencies,
            level.as_str().to_lowercase()
        ))
    });

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the whole pipeline and return the process exit code.
async fn run_pipeline(args: &Args, config: &Config, credentials: &Credentials) -> i32 {
    let project_root = &config.general.project_root;
    let report_path = config.report_file();
    info!("Run origin: {}", args.origin);

    // Step 1: Analysis (or the verdict given on the command line)
    let (status, unpersisted) = if args.notify_only {
        let status = args.status.unwrap_or_default();
        println!("📨 Notify-only run, status: {}", status);
        (status, None)
    } else {
        let report = run_analysis(args, config).await;
        let rendered = report::render_report(&report);

        let unpersisted = match report::write_report(&rendered, &report_path) {
            Ok(()) => {
                println!("💾 Report saved: {}", report_path.display());
                None
            }
            Err(e) => {
                error!("{:#}", e);
                eprintln!("⚠️  Could not write report: {:#}", e);
                Some(rendered)
            }
        };

        print_summary(&report);
        (report.status(), unpersisted)
    };

    if args.no_notify {
        debug!("--no-notify: skipping git context, narrative and mail");
        return status.exit_code();
    }

    // Step 2: Gather what the narrative needs
    println!("\n📝 Preparing report ({})...", args.origin);
    let report_text = unpersisted.unwrap_or_else(|| report::read_report(&report_path));
    let git = GitContext::collect(project_root);

    // Step 3: AI narrative
    let generator = narrative_generator(args, config, credentials);
    let narrative = generator
        .generate(&report_text, &git.diff, &git.changed_files)
        .await;
    if narrative.is_generated() {
        println!("🤖 AI narrative ready");
    }

    // Step 4: Mail
    let notifier = notifier(config, credentials);
    match notifier
        .notify(status, narrative.html(), git.committer_email.as_deref())
        .await
    {
        Delivery::Sent { recipient } => println!("✅ Mail sent to {}", recipient),
        Delivery::Skipped(reason) => println!("⏭️  Mail skipped ({})", reason),
        Delivery::Failed { recipient, reason } => {
            eprintln!("⚠️  Mail to {} failed: {}", recipient, reason)
        }
    }

    status.exit_code()
}

/// Run every configured tool with a progress bar.
async fn run_analysis(args: &Args, config: &Config) -> Report {
    let tools = &config.tools;
    println!(
        "🔬 Running {} analysis tools in {}",
        tools.len(),
        config.general.project_root.display()
    );

    let progress = (!args.quiet).then(|| tool_progress_bar(tools.len() as u64));

    let report = analysis::analyze(
        Local::now().naive_local(),
        tools,
        &config.general.project_root,
        config.general.concurrency,
        progress.as_ref(),
    )
    .await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    for section in &report.sections {
        let mark = if section.success { "✅" } else { "❌" };
        println!(
            "   {} {} — {}",
            mark,
            section.name,
            report::generator::status_label(section.success)
        );
    }

    report
}

fn tool_progress_bar(len: u64) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");

    let pb = ProgressBar::new(len).with_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn print_summary(report: &Report) {
    println!("\n📊 Analysis Summary:");
    println!("   Tools run: {}", report.sections.len());
    match report.status() {
        RunStatus::Success => println!("   ✅ {}", report::generator::CLEAN_SUMMARY),
        RunStatus::Failure => {
            println!("   Failed: {}", report.failed_tools().join(", "));
            println!("   ⛔ {}", report::generator::ISSUES_SUMMARY);
        }
    }
}

/// Narrative generator, with a backend only when AI is enabled and keyed.
fn narrative_generator(args: &Args, config: &Config, credentials: &Credentials) -> NarrativeGenerator {
    let backend: Option<Box<dyn GenerativeBackend>> = match credentials.api_key {
        _ if args.no_ai => {
            info!("--no-ai: AI narrative disabled");
            None
        }
        None => None,
        Some(ref key) => match GeminiClient::new(&config.ai, key.clone()) {
            Ok(client) => Some(Box::new(client)),
            Err(e) => {
                warn!("Could not create Gemini client: {}", e);
                None
            }
        },
    };

    NarrativeGenerator::new(backend, &config.ai)
}

/// Notifier, with an SMTP transport only when credentials are present.
fn notifier(config: &Config, credentials: &Credentials) -> Notifier {
    let Some((sender, password)) = credentials.smtp_login() else {
        return Notifier::disabled();
    };

    match SmtpMailer::new(&config.mail, sender, password) {
        Ok(mailer) => Notifier::new(
            Some(Box::new(mailer)),
            Some(sender.to_string()),
            config.mail.project_name.clone(),
        ),
        Err(e) => {
            warn!("Could not create SMTP transport: {}", e);
            Notifier::disabled()
        }
    }
}
