use std::fs::File;
use std::path::PathBuf;
use ti_app::AppResult;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

/// Install the global subscriber: compact stderr output, plus a plain-text
/// file with thread ids when `log_file` is given.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> AppResult<()> {
    let level_filter = if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(level_filter)
        .with(stderr_layer);

    if let Some(path) = log_file {
        let file = File::create(&path)?;
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);
        subscriber.with(file_layer).init();
    } else {
        subscriber.init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritable_log_file_is_an_io_error() {
        let dir = std::env::temp_dir().join(format!("ti_cli_log_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        // A directory cannot be opened as a log file.
        let err = setup_logging(0, false, Some(dir.clone())).unwrap_err();
        assert_eq!(err.kind(), ti_core::ErrorKind::Io);
        std::fs::remove_dir_all(&dir).ok();
    }
}
