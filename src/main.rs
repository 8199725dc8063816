//! `sbar` entry point (spec §6 "Process"): connects to the Wayland
//! display, binds the required globals, then hands off to the IO loop.
//! The only accepted command-line argument is `--version`; every other
//! configuration input arrives over stdin once the loop is running.

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt().compact().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter("info").compact().init();
    }

    if std::env::args().nth(1).as_deref() == Some("--version") {
        println!("sbar {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let locale_is_utf8 = std::env::var("LANG")
        .map(|l| l.to_lowercase().contains("utf-8") || l.to_lowercase().contains("utf8"))
        .unwrap_or(true); // no LANG set at all is not our call to make fatal.
    if !locale_is_utf8 {
        anyhow::bail!(sbar::error::FatalEnvironmentError::NonUtf8Locale);
    }

    sbar::io_loop::install_signal_handlers();

    let (renderer, queue) = sbar::Renderer::connect().context("connecting to the Wayland display")?;
    let conn = renderer.conn.clone();

    sbar::io_loop::run(renderer, queue, conn);
    Ok(())
}
