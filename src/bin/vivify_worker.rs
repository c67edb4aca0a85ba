use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

fn main() -> anyhow::Result<()> {
    // stdout carries the reply protocol; logging must stay on stderr.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "vivify=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    vivify::worker::service::run(&mut stdin.lock(), &mut stdout.lock())?;
    Ok(())
}
