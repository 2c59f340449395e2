//! Logging setup.
//!
//! On the sensor, events go to a daily JSON file for later analysis and to
//! plain stdout for journald. At a desk, stdout is pretty-printed.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Non-blocking writers stop once their guard drops.
static GUARDS: OnceLock<Vec<WorkerGuard>> = OnceLock::new();

/// Directives appended to the base level. BlueZ property chatter and
/// connection-level HTTP events drown out sightings otherwise.
const QUIET_DEPENDENCIES: &str = "bluer=warn,hyper=warn,h2=warn";

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the base level is
/// `PRESENCE_LOG_LEVEL` (default `info`) with noisy dependencies capped at
/// `warn`.
///
/// # Errors
///
/// Returns an error if the filter does not parse or the log directory
/// cannot be created.
pub fn init(is_production: bool) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level =
                std::env::var("PRESENCE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            EnvFilter::try_new(default_directives(&level))?
        }
    };

    let mut guards = Vec::with_capacity(2);
    let (stdout, guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(guard);

    let layers = if is_production {
        let dir = log_directory();
        std::fs::create_dir_all(&dir)?;
        let (file, guard) = tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::DAILY,
            &dir,
            "presence",
        ));
        guards.push(guard);

        vec![
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(stdout)
                .with_ansi(false)
                .boxed(),
        ]
    } else {
        vec![tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(stdout)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .boxed()]
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .init();
    let _ = GUARDS.set(guards);
    Ok(())
}

fn default_directives(level: &str) -> String {
    format!("{level},{QUIET_DEPENDENCIES}")
}

/// `/var/log/presence` on Linux, the platform data directory elsewhere.
fn log_directory() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/presence")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "presence")
            .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_is_named_for_presence() {
        let dir = log_directory();
        assert!(dir.to_string_lossy().contains("presence") || dir.ends_with("logs"));
    }

    #[test]
    fn test_default_directives_parse() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("bluer=warn"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
