use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use console::style;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use vttc::conversion_api::{run, ConversionRequest, RunOutcome, RunSettings};
use vttc::prompts::{self, Prompter};
use vttc_core::logging::{init_logging, LogConfig};
use vttc_core::{print_summary_report, QualityTier, WorkerLimits};

#[derive(Parser)]
#[command(name = "vttc")]
#[command(version, about = "Batch convert a folder of images, videos and audio into one format", long_about = None)]
struct Cli {
    /// Folder to convert; results go to <FOLDER>/output
    #[arg(short, long, env = "VTTC_INPUT", value_name = "FOLDER")]
    input: Option<PathBuf>,

    /// Target format: webp, png, avif, jpg, jpeg, jfif, webm, mp4, mp3, ogg
    #[arg(short, long, env = "VTTC_FORMAT")]
    format: Option<String>,

    /// Quality tier: high, mid or low
    #[arg(short, long, env = "VTTC_QUALITY")]
    quality: Option<QualityTier>,

    /// Concurrent image conversions (default: available cores)
    #[arg(long, env = "VTTC_IMAGE_WORKERS")]
    image_workers: Option<usize>,

    /// Concurrent ffmpeg transcodes (default: 1 or 2 depending on cores)
    #[arg(long, env = "VTTC_TRANSCODE_WORKERS")]
    transcode_workers: Option<usize>,

    /// ffmpeg executable
    #[arg(long, env = "VTTC_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Print a JSON summary instead of the report
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,

    /// Never prompt; use defaults for a missing folder or quality
    #[arg(short = 'y', long)]
    yes: bool,
}

enum Choices {
    Ready(ConversionRequest),
    Cancelled,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let console_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let _ = init_logging(
        "vttc",
        LogConfig::default().with_console_level(console_level),
    );

    match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Run aborted");
            eprintln!("{} {:#}", style("❌ Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode> {
    prompts::install_interrupt_handler().context("Failed to install Ctrl-C handler")?;

    let request = match collect_choices(&cli)? {
        Choices::Ready(request) => request,
        Choices::Cancelled => return Ok(ExitCode::SUCCESS),
    };

    let mut limits = WorkerLimits::detect();
    if let Some(n) = cli.image_workers {
        limits = limits.with_image(n);
    }
    if let Some(n) = cli.transcode_workers {
        limits = limits.with_transcode(n);
    }
    let settings = RunSettings {
        limits,
        ffmpeg: cli.ffmpeg.clone(),
        show_progress: !cli.json,
    };

    tracing::info!(
        input = %request.input.display(),
        format = %request.format,
        quality = %request.quality,
        image_workers = limits.image,
        transcode_workers = limits.transcode,
        "Starting vttc"
    );

    let outcome = run(&request, &settings)?;
    let failed = outcome.has_failures();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&json_summary(&outcome))?);
    } else {
        print_outcome(&outcome);
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Fill in anything the command line left out, prompting unless `--yes`.
fn collect_choices(cli: &Cli) -> Result<Choices> {
    let all_given = cli.input.is_some() && cli.format.is_some() && cli.quality.is_some();

    if cli.yes || all_given {
        let Some(format) = cli.format.clone() else {
            Cli::command()
                .error(
                    ErrorKind::MissingRequiredArgument,
                    "--format is required with --yes",
                )
                .exit();
        };
        return Ok(Choices::Ready(ConversionRequest {
            input: cli
                .input
                .clone()
                .unwrap_or_else(|| prompts::parse_folder("")),
            format,
            quality: cli.quality.unwrap_or(QualityTier::Mid),
        }));
    }

    let mut prompter = Prompter::stdio();
    prompter.intro()?;

    let input = match &cli.input {
        Some(input) => input.clone(),
        None => match prompter.ask_folder()? {
            Some(input) => input,
            None => return cancel(&mut prompter),
        },
    };
    let format = match &cli.format {
        Some(format) => format.clone(),
        None => match prompter.ask_format()? {
            Some(format) => format.to_string(),
            None => return cancel(&mut prompter),
        },
    };
    let quality = match cli.quality {
        Some(quality) => quality,
        None => match prompter.ask_quality()? {
            Some(quality) => quality,
            None => return cancel(&mut prompter),
        },
    };

    Ok(Choices::Ready(ConversionRequest {
        input,
        format,
        quality,
    }))
}

fn cancel<R: std::io::BufRead, W: std::io::Write>(
    prompter: &mut Prompter<R, W>,
) -> Result<Choices> {
    prompter.cancelled()?;
    tracing::info!("Cancelled at prompt");
    Ok(Choices::Cancelled)
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::UnknownFormat(e) => {
            eprintln!("{} {}", style("⚠️").yellow(), e);
        }
        RunOutcome::NoCompatibleFiles { input, issues } => {
            println!("No compatible files found in {}", input.display());
            for issue in issues {
                eprintln!("   {}", style(issue).yellow());
            }
        }
        RunOutcome::Completed {
            plan,
            result,
            issues,
            elapsed,
        } => {
            print_summary_report(result, issues, *elapsed, plan.target_format());
        }
    }
}

fn json_summary(outcome: &RunOutcome) -> serde_json::Value {
    match outcome {
        RunOutcome::UnknownFormat(e) => json!({
            "status": "unknown_format",
            "error": e.to_string(),
        }),
        RunOutcome::NoCompatibleFiles { input, issues } => json!({
            "status": "no_compatible_files",
            "input": input,
            "issues": issues.iter().map(|i| i.to_string()).collect::<Vec<_>>(),
        }),
        RunOutcome::Completed {
            plan,
            result,
            issues,
            elapsed,
        } => json!({
            "status": if result.has_failures() { "completed_with_failures" } else { "completed" },
            "plan": plan,
            "result": result,
            "issues": issues.iter().map(|i| i.to_string()).collect::<Vec<_>>(),
            "elapsed_secs": elapsed.as_secs_f64(),
        }),
    }
}
