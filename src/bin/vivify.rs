use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

use vivify::{
    config::API_KEY_ENV, Animator, CutoutImage, GenerateOptions, MotionSpec, ProgressSink,
    RemoteConfig,
};

#[derive(Parser, Debug)]
#[command(name = "vivify", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the motion preset catalog as JSON.
    Presets,
    /// Check whether animation generation is configured.
    Support,
    /// Animate a cutout PNG into a looping GIF (requires `ffmpeg` on PATH).
    Animate(AnimateArgs),
}

#[derive(Parser, Debug)]
struct AnimateArgs {
    /// Input cutout PNG (straight alpha).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output GIF path.
    #[arg(long)]
    out: PathBuf,

    /// Also write an APNG to this path.
    #[arg(long)]
    apng: Option<PathBuf>,

    /// Catalog preset to animate with.
    #[arg(long, conflicts_with = "prompt")]
    preset: Option<String>,

    /// Custom motion prompt.
    #[arg(long)]
    prompt: Option<String>,

    /// Frame count for custom prompts (defaults to the duration cap).
    #[arg(long)]
    frames: Option<u32>,

    /// Playback frame rate.
    #[arg(long, default_value_t = 16)]
    fps: u32,

    /// GIF loop count, 0 means forever.
    #[arg(long, default_value_t = 0)]
    loops: u16,

    /// Trim the generated clip to this many seconds.
    #[arg(long, default_value_t = 4.0)]
    max_duration: f64,

    /// Upload the cutout as-is and skip chroma keying.
    #[arg(long)]
    no_chroma_key: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "vivify=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Presets => cmd_presets(),
        Command::Support => cmd_support(),
        Command::Animate(args) => cmd_animate(args).await,
    }
}

fn cmd_presets() -> anyhow::Result<()> {
    let presets = vivify::presets::static_presets();
    println!("{}", serde_json::to_string_pretty(&presets)?);
    Ok(())
}

fn cmd_support() -> anyhow::Result<()> {
    if RemoteConfig::key_in_env() {
        eprintln!("animation generation is available ({API_KEY_ENV} is set)");
        Ok(())
    } else {
        anyhow::bail!("{API_KEY_ENV} is not set; animation generation is unavailable")
    }
}

async fn cmd_animate(args: AnimateArgs) -> anyhow::Result<()> {
    let motion = match (&args.preset, &args.prompt) {
        (Some(name), None) => MotionSpec::Preset { name: name.clone() },
        (None, Some(prompt)) => MotionSpec::Custom {
            prompt: prompt.clone(),
            num_frames: args.frames,
        },
        _ => anyhow::bail!("either --preset or --prompt is required"),
    };
    let options = GenerateOptions {
        fps: args.fps,
        loops: args.loops,
        max_duration_secs: args.max_duration,
        use_chroma_key: !args.no_chroma_key,
    };

    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read cutout '{}'", args.in_path.display()))?;
    let cutout = CutoutImage::from_png(&bytes)?;

    let animator = Animator::from_env()?;
    let (progress, mut events) = ProgressSink::channel();
    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            eprintln!("[{:>3}%] {}", event.percent, event.message);
        }
    });

    let animation = animator.generate(&cutout, &motion, &options, &progress).await;
    drop(progress);
    let _ = reporter.await;
    let animation = animation?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &animation.gif)
        .with_context(|| format!("write gif '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());

    if let Some(apng_path) = &args.apng {
        std::fs::write(apng_path, &animation.apng)
            .with_context(|| format!("write apng '{}'", apng_path.display()))?;
        eprintln!("wrote {}", apng_path.display());
    }
    Ok(())
}
