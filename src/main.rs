use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mashup::backend::NativeBackend;
use mashup::cli::{Cli, Commands, CreateArgs};
use mashup::config::Config;
use mashup::delivery::{is_valid_email, MailjetClient, Sender};
use mashup::utils::{format_duration, format_file_size, ToolPaths};
use mashup::{package, MashupError, MashupPipeline};

/// Exit status after Ctrl-C, as a shell reports SIGINT
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "mashup=debug" } else { "mashup=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!("{:?}", e);
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Create(args) => create(args, cli.quiet).await,
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Edit it to change tool paths, timeouts and email settings.");
                println!("Run `mashup config --show` to print the values in effect.");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tools => {
            let config = Config::load().await?;
            let tools = ToolPaths::detect(&config.tools).await;

            println!("External tools:");
            print_tool("yt-dlp", tools.yt_dlp.as_deref());
            print_tool("ffmpeg", tools.ffmpeg.as_deref());

            let backend = if tools.ffmpeg.is_some() {
                "ffmpeg"
            } else {
                NativeBackend::NAME
            };
            println!("Audio backend: {}", style(backend).cyan());

            Ok(if tools.yt_dlp.is_some() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn create(args: CreateArgs, quiet: bool) -> Result<ExitCode> {
    // Bad input never costs a network round trip
    if let Err(e) = args.validate() {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        return Ok(ExitCode::FAILURE);
    }

    let config = Config::load().await?;
    let tools = ToolPaths::detect(&config.tools).await;

    let missing = tools.missing();
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
    }

    let mailer = match &args.email {
        Some(_) => Some(mailer_for(&args, &config)?),
        None => None,
    };

    let pipeline = MashupPipeline::new(&config, &tools, quiet)?;
    let request = args.to_request();
    let started = Instant::now();

    println!("Starting mashup for {}...", style(&request.subject).bold());

    // Dropping the pipeline future on Ctrl-C sweeps the workspace and kills children
    let outcome = tokio::select! {
        outcome = pipeline.run(&request) => outcome,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nStopped.");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    let result = match outcome {
        Ok(result) => result,
        Err(MashupError::StageExhausted(stage)) => {
            eprintln!("{} {}", style("Error:").red().bold(), stage.failure_message());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    if !result.success {
        eprintln!("{}", style("Failed to merge.").red().bold());
        return Ok(ExitCode::FAILURE);
    }

    let size = fs_err::metadata(&result.output_path)
        .map(|m| m.len())
        .unwrap_or(0);
    println!(
        "Created mashup: {} ({}, {} clips, {} backend)",
        result.output_path.display(),
        format_file_size(size),
        result.counts.trimmed,
        result.backend
    );

    if let Some(archive) = args.archive_path() {
        package::zip_output(&result.output_path, &archive)?;
        println!("Archive saved to: {}", archive.display());

        if let (Some(mailer), Some(to)) = (&mailer, &args.email) {
            let sent = mailer
                .send(to, &config.delivery.subject, &config.delivery.body, &archive)
                .await;

            // Files made only for the email go away whether or not it was sent
            if args.zip.is_none() {
                remove_quietly(&archive);
            }
            if !args.keep {
                remove_quietly(&result.output_path);
            }

            sent?;
            println!("{}", style("Mashup sent successfully!").green());
        }
    }

    println!(
        "\n{} ({})",
        style("Done! Enjoy your mashup.").green().bold(),
        format_duration(started.elapsed().as_secs_f64())
    );
    Ok(ExitCode::SUCCESS)
}

/// Resolve Mailjet credentials and sender; flags and env win over the config file
fn mailer_for(args: &CreateArgs, config: &Config) -> Result<MailjetClient> {
    let public_key = args
        .mailjet_public_key
        .clone()
        .context("MJ_APIKEY_PUBLIC is not set")?;
    let private_key = args
        .mailjet_private_key
        .clone()
        .context("MJ_APIKEY_PRIVATE is not set")?;

    let email = args
        .sender_email
        .clone()
        .or_else(|| config.delivery.sender_email.clone())
        .context("No sender address: set SENDER_EMAIL or delivery.sender_email")?;
    if !is_valid_email(&email) {
        anyhow::bail!("Invalid sender address: {}", email);
    }
    let name = args
        .sender_name
        .clone()
        .or_else(|| config.delivery.sender_name.clone());

    Ok(MailjetClient::new(
        config.delivery.mailjet_endpoint.as_str(),
        public_key,
        private_key,
        Sender { email, name },
    ))
}

fn print_tool(name: &str, path: Option<&Path>) {
    match path {
        Some(path) => println!("  {} {}: {}", style("✓").green(), name, path.display()),
        None => println!("  {} {}: not found", style("✗").red(), name),
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs_err::remove_file(path) {
        tracing::warn!("{}", e);
    }
}
