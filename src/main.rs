//! OpenMobile - autonomous Android automation
//!
//! Command-line entry point: runs one goal, or reads goals from stdin.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use openmobile::adb::{AdbCapture, AdbConnection, AdbDevice};
use openmobile::agent::{ConsoleReporter, ControlLoop, LoopOutcome, ProgressReporter};
use openmobile::device::CaptureProvider;
use openmobile::model::{ElementLocator, ModelClient};
use openmobile::vision::normalize;
use openmobile::AppSettings;

#[derive(Parser, Debug)]
#[command(name = "openmobile", version, about = "Autonomous Android agent driven by a vision-language model")]
struct Cli {
    /// Goal to pursue; without it, goals are read from stdin
    #[arg(short, long)]
    goal: Option<String>,

    /// Model that decides each step
    #[arg(long)]
    model: Option<String>,

    /// Model used by --locate
    #[arg(long)]
    vision_model: Option<String>,

    /// Model API flavor: ollama or openai
    #[arg(long)]
    api: Option<String>,

    /// Model API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Model API key
    #[arg(long)]
    api_key: Option<String>,

    /// ADB device serial
    #[arg(short, long)]
    device: Option<String>,

    /// Maximum steps per goal
    #[arg(long)]
    max_steps: Option<u32>,

    /// Pause after each action, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Directory for screenshots attached to reports
    #[arg(long)]
    screenshots_dir: Option<String>,

    /// Find a UI element on the current screen and print its coordinates
    #[arg(long, value_name = "QUERY")]
    locate: Option<String>,

    /// Print the device screen resolution
    #[arg(long)]
    resolution: bool,

    /// List connected devices
    #[arg(long)]
    list_devices: bool,

    /// Connect to a device over TCP/IP (host[:port])
    #[arg(long, value_name = "ADDR")]
    connect: Option<String>,

    /// Save the effective settings and exit
    #[arg(long)]
    save_settings: bool,
}

impl Cli {
    fn apply(&self, settings: &mut AppSettings) {
        let overrides = [
            (&self.model, &mut settings.model_name),
            (&self.vision_model, &mut settings.vision_model_name),
            (&self.api, &mut settings.api),
            (&self.base_url, &mut settings.base_url),
            (&self.api_key, &mut settings.api_key),
            (&self.device, &mut settings.device_id),
            (&self.screenshots_dir, &mut settings.screenshots_dir),
        ];
        for (flag, field) in overrides {
            if let Some(value) = flag {
                *field = value.clone();
            }
        }
        if let Some(n) = self.max_steps {
            settings.max_steps = n;
        }
        if let Some(ms) = self.settle_ms {
            settings.settle_delay_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries progress reports
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = AppSettings::load();
    settings.apply_env();
    cli.apply(&mut settings);

    if cli.save_settings {
        let path = settings.save()?;
        println!("Settings saved to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let mut conn = AdbConnection::new();
    if let Some(id) = settings.device() {
        conn = conn.with_device_id(id);
    }

    if cli.list_devices {
        let devices = conn.list_devices().context("listing devices")?;
        if devices.is_empty() {
            println!("No devices connected.");
        }
        for d in devices {
            println!(
                "{}\t{}\t{:?}\t{}",
                d.device_id,
                d.status,
                d.connection_type,
                d.model.as_deref().unwrap_or("-")
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(address) = &cli.connect {
        let output = conn.connect(address).context("adb connect")?;
        println!("{}", output.trim());
        return Ok(ExitCode::SUCCESS);
    }

    let capture = AdbCapture::new(conn.clone());

    if cli.resolution {
        println!("{}", capture.resolution()?);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(query) = &cli.locate {
        return locate(&settings, &capture, query).await;
    }

    let policy = ModelClient::new(settings.model_config()?)?;
    let device = AdbDevice::new(conn).with_text_mode(settings.text_input_mode());
    let control = ControlLoop::new(
        Arc::new(capture),
        Arc::new(device),
        Arc::new(policy),
        settings.loop_config(),
    );

    let mut reporter = ConsoleReporter::new();
    if let Some(dir) = settings.screenshots_dir() {
        reporter = reporter.with_screenshots_dir(dir);
    }

    println!("OpenMobile");
    println!("==================================================");
    println!("Model: {} @ {} ({})", settings.model_name, settings.base_url, settings.api);
    if let Some(id) = settings.device() {
        println!("Device: {}", id);
    }
    println!("Max steps: {}", settings.max_steps);
    println!("==================================================\n");

    if let Some(goal) = &cli.goal {
        let outcome = run_goal(&control, goal, &reporter, settings.max_steps).await;
        println!("\nResult: {}", outcome);
        return Ok(if outcome.is_finished() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    println!("Interactive mode. Type a goal and press Enter.");
    println!("Ctrl-C stops the running goal. Type 'quit' or 'exit' to leave.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let goal = line.trim();
        if goal.is_empty() {
            continue;
        }
        if matches!(goal.to_lowercase().as_str(), "quit" | "exit" | "q") {
            println!("Goodbye!");
            break;
        }

        let outcome = run_goal(&control, goal, &reporter, settings.max_steps).await;
        println!("\nResult: {}\n", outcome);
    }

    Ok(ExitCode::SUCCESS)
}

/// Run one goal; Ctrl-C cancels it.
async fn run_goal(
    control: &ControlLoop,
    goal: &str,
    reporter: &dyn ProgressReporter,
    max_steps: u32,
) -> LoopOutcome {
    let token = CancellationToken::new();
    let control = control.clone().with_cancellation(token.clone());
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            token.cancel();
        }
    });

    let outcome = control.run(goal, reporter, max_steps).await;
    watcher.abort();
    outcome
}

async fn locate(
    settings: &AppSettings,
    capture: &AdbCapture,
    query: &str,
) -> anyhow::Result<ExitCode> {
    let resolution = capture.resolution()?;
    let raw = capture.screenshot()?;
    let image = normalize(&raw, settings.max_image_dimension, settings.image_quality)?;

    let locator = ElementLocator::new(ModelClient::new(settings.vision_model_config()?)?);
    let point = locator.locate(query, &image, resolution).await?;
    println!("{},{}", point.x, point.y);
    Ok(ExitCode::SUCCESS)
}
