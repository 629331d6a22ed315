use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use water_strip_analyzer::capture::{CameraFacing, FileCamera, PermissionState, StreamProbe};
use water_strip_analyzer::config::config::{API_KEY_ENV, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use water_strip_analyzer::config::{AnalyzerConfig, Settings};
use water_strip_analyzer::error::classify;
use water_strip_analyzer::presenter::StalePolicy;
use water_strip_analyzer::processing::ImageNormalizer;
use water_strip_analyzer::session::{AnalysisSession, CaptureOutcome};
use water_strip_analyzer::{HasRecoverySuggestion, StripError};

/// Read a water test strip photo with a vision model:
/// - pH, ammonia, nitrite and nitrate from one shot
/// - the photo is shrunk to a bounded JPEG before upload
#[derive(Parser, Debug)]
#[command(name = "strip")]
#[command(about = "🧪 Read water test strips with a vision-capable model")]
#[command(long_about = "Capture a photo of a water test strip, send it to a hosted multimodal model,
and print the pH, ammonia, nitrite and nitrate readings it reports.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a strip photo and print the readings
    Analyze(AnalyzeArgs),
    /// Write the normalized JPEG that would be uploaded, without calling the model
    Normalize(NormalizeArgs),
    /// Manage the stored API key
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
        /// Settings file (defaults to $STRIP_SETTINGS or the user config dir)
        #[arg(long, global = true)]
        settings: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Photo seen by the back camera
    photo: PathBuf,

    /// Photo seen by the front camera
    #[arg(long)]
    front: Option<PathBuf>,

    /// Camera to fire
    #[arg(long, value_enum, default_value_t = CameraFacing::Back)]
    facing: CameraFacing,

    /// How camera access is probed
    #[arg(long, value_enum, default_value_t = ProbeKind::Native)]
    probe: ProbeKind,

    /// Chat completions endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Vision model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// API key (overrides OPENAI_API_KEY and the settings file)
    #[arg(long)]
    api_key: Option<String>,

    /// Width the photo is reduced to before upload
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// JPEG quality of the upload (1-100)
    #[arg(long, default_value_t = 70)]
    quality: u8,

    /// Request timeout: 30s, 2m, or 0 to wait forever
    #[arg(long, default_value = "60s")]
    timeout: String,

    /// Clear previous readings while a new analysis runs
    #[arg(long)]
    hide_stale: bool,

    /// Print readings as JSON
    #[arg(long)]
    json: bool,

    /// Settings file (defaults to $STRIP_SETTINGS or the user config dir)
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    /// Photo to normalize
    photo: PathBuf,

    /// Where to write the JPEG
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 70)]
    quality: u8,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Store the API key
    SetKey { key: String },
    /// Show the settings file location and the masked key
    Show,
    /// Remove the stored API key
    ClearKey,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProbeKind {
    /// Ask for access directly
    Native,
    /// Prove access by opening and releasing a stream
    Stream,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => analyze(args).await,
        Command::Normalize(args) => normalize(args),
        Command::Settings { action, settings } => manage_settings(action, settings),
    }
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let api_key = resolve_credential(args.api_key, std::env::var(API_KEY_ENV).ok(), args.settings)?;

    let config = AnalyzerConfig {
        endpoint: args.endpoint,
        model: args.model,
        api_key,
        target_width: args.width,
        jpeg_quality: args.quality,
        timeout: parse_timeout(&args.timeout)?,
        stale_policy: if args.hide_stale {
            StalePolicy::HideWhileAnalyzing
        } else {
            StalePolicy::KeepVisible
        },
    };
    config.validate().map_err(with_hint)?;

    let mut camera = FileCamera::new(&args.photo)?;
    if let Some(front) = args.front {
        camera = camera.with_front(front);
    }
    let mut session = match args.probe {
        ProbeKind::Native => AnalysisSession::from_config(&config, camera.probe(), camera),
        ProbeKind::Stream => AnalysisSession::from_config(&config, StreamProbe::new(camera.probe()), camera),
    }
    .map_err(with_hint)?;

    let mut access = session.start().await;
    if access == PermissionState::Denied && session.retry_available() {
        access = session.retry_permission().await;
    }
    if access != PermissionState::Granted {
        bail!("no access to camera: cannot read {}", args.photo.display());
    }

    if args.facing != session.facing() {
        session.toggle_facing();
    }
    if !session.is_ready() {
        bail!("shutter is not ready");
    }

    match session.capture().await {
        CaptureOutcome::Displayed(readings) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&readings)?);
            } else if let Some(panel) = session.presenter().render() {
                print!("{}", panel);
            }
            Ok(())
        }
        CaptureOutcome::Failed(kind) => bail!("no readings ({}); ready for another capture", kind),
        other => bail!("capture did not run: {:?}", other),
    }
}

fn normalize(args: NormalizeArgs) -> Result<()> {
    let image = ImageNormalizer::new(args.width, args.quality)
        .normalize_path(&args.photo)
        .with_context(|| format!("normalizing {}", args.photo.display()))?;

    let jpeg = image.jpeg_bytes()?;
    if let Some(out) = &args.out {
        std::fs::write(out, &jpeg).with_context(|| format!("writing {}", out.display()))?;
        println!("Wrote {}", out.display());
    }
    println!(
        "{}x{} JPEG, {} bytes ({} bytes as base64)",
        image.width,
        image.height,
        jpeg.len(),
        image.encoded.len()
    );
    Ok(())
}

fn manage_settings(action: SettingsAction, path: Option<PathBuf>) -> Result<()> {
    let path = settings_path(path)?;
    apply_settings(action, &path)
}

fn apply_settings(action: SettingsAction, path: &Path) -> Result<()> {
    match action {
        SettingsAction::SetKey { key } => {
            if key.trim().is_empty() {
                bail!("API key must not be empty");
            }
            let mut settings = load_for_update(path);
            settings.api_key = Some(key.trim().to_string());
            settings.save(path)?;
            println!("API key saved to {}", path.display());
        }
        SettingsAction::Show => {
            let settings = Settings::load(path)?;
            println!("Settings file: {}", path.display());
            match settings.masked_key() {
                Some(masked) => println!("API key: {}", masked),
                None => println!("API key: <not set>"),
            }
        }
        SettingsAction::ClearKey => {
            let mut settings = load_for_update(path);
            settings.api_key = None;
            settings.save(path)?;
            println!("API key removed from {}", path.display());
        }
    }
    Ok(())
}

/// Settings about to be rewritten. An unreadable file is replaced rather than
/// blocking the command that repairs it.
fn load_for_update(path: &Path) -> Settings {
    Settings::load(path).unwrap_or_else(|e| {
        warn!(error = %e, "settings file unreadable; overwriting with defaults");
        Settings::default()
    })
}

/// Flag, then environment, then the settings file. The file is only read when
/// neither of the first two supplies a key.
fn resolve_credential(
    explicit: Option<String>,
    env_value: Option<String>,
    settings: Option<PathBuf>,
) -> Result<Option<String>> {
    if let Some(key) = AnalyzerConfig::resolve_api_key(explicit, env_value, &Settings::default()) {
        return Ok(Some(key));
    }
    let settings = Settings::load(&settings_path(settings)?)?;
    Ok(AnalyzerConfig::resolve_api_key(None, None, &settings))
}

/// Attach the recovery suggestion to errors only the user can fix.
fn with_hint(error: StripError) -> anyhow::Error {
    match error.recovery_suggestion() {
        Some(hint) if classify::requires_user_intervention(&error) => {
            anyhow::anyhow!("{}\nhint: {}", error, hint)
        }
        _ => error.into(),
    }
}

fn settings_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(Settings::default_path()?),
    }
}

/// Parse timeout string like "30s", "2m", "1h" ("0" disables the timeout)
fn parse_timeout(timeout: &str) -> Result<Option<Duration>> {
    let seconds = parse_duration(timeout)?;
    Ok((seconds > 0).then(|| Duration::from_secs(seconds)))
}

/// Parse duration string like "30s", "2m", "1h" into seconds
fn parse_duration(duration: &str) -> Result<u64> {
    if let Ok(seconds) = duration.parse::<u64>() {
        return Ok(seconds);
    }

    let split = match duration.char_indices().last() {
        Some((index, _)) if index > 0 => index,
        _ => return Err(anyhow::anyhow!("Invalid duration format: {}", duration)),
    };

    let (num_str, unit) = duration.split_at(split);
    let num: u64 = num_str.parse().map_err(|_| anyhow::anyhow!("Invalid number in duration: {}", num_str))?;

    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => return Err(anyhow::anyhow!("Invalid duration unit: {}. Use 's' for seconds, 'm' for minutes, 'h' for hours", unit)),
    };
    num.checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Duration too large: {}", duration))
}
