use std::{fs::OpenOptions, path::Path, sync::Mutex};

use tracing_subscriber::{fmt, fmt::writer::MakeWriterExt, EnvFilter};

use crate::Result;

/// Initialize logging/tracing for the bot.
///
/// Lines always go to stdout; when `log_file` is given they are also appended there.
pub fn init(service_name: &str, log_file: Option<&Path>) -> Result<()> {
    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,foodbot=info,foodbot_core=info,foodbot_reddit=info,foodbot_telegram=info,{}=info",
            service_name.replace('-', "_")
        ))
    });

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(std::io::stdout.and(Mutex::new(file)))
                .init();
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(true)
                .init();
        }
    }

    Ok(())
}
