use crate::config::Config;
use crate::storage::global_data_dir;
use std::fs::{self, File, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "TODOBOARD_LOG";

/// Logs go to `todoboard.log` in the data directory; the terminal belongs
/// to the UI. `TODOBOARD_LOG` overrides the configured filter. Returns
/// `false` when a global subscriber was already installed; that one stays.
pub fn init(config: &Config) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false);
    let result = match open_log_file() {
        Some(file) => builder.with_writer(Mutex::new(file)).try_init(),
        None => builder.with_writer(std::io::sink).try_init(),
    };
    match result {
        Ok(()) => true,
        Err(_) => false,
    }
}

fn open_log_file() -> Option<File> {
    let dir = global_data_dir().ok()?;
    fs::create_dir_all(&dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("todoboard.log"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_keeps_the_installed_subscriber() {
        let config = Config::default();
        init(&config);
        assert!(!init(&config));
    }
}
