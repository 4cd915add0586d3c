use anyhow::Result;
use chrono::{Local, TimeZone};
use log::{LevelFilter, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// Utility helpers for the binary: logging setup and console I/O.

pub struct SimpleLogger {
    log_file: Option<Mutex<std::fs::File>>,
}

impl SimpleLogger {
    pub fn new(log_file_path: Option<&str>) -> Result<Self> {
        let log_file = match log_file_path {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Mutex::new(file))
            }
            None => None,
        };

        Ok(SimpleLogger { log_file })
    }

    fn render(record: &Record) -> String {
        format!(
            "[{}] {} [{}:{}] {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    }
}

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = Self::render(record);
        match &self.log_file {
            Some(file) => {
                let mut file = file.lock().unwrap();
                let _ = file.write_all(line.as_bytes());
            }
            None => print!("{}", line),
        }
    }

    fn flush(&self) {
        match &self.log_file {
            Some(file) => {
                let _ = file.lock().unwrap().flush();
            }
            None => {
                let _ = std::io::stdout().flush();
            }
        }
    }
}

/// Read a line of input from stdin, trimming whitespace
pub fn read_line() -> Result<String> {
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub fn setup_logging(log_file: Option<&str>, level: LevelFilter) -> Result<()> {
    let logger = SimpleLogger::new(log_file)?;
    log::set_boxed_logger(Box::new(logger)).map(|()| log::set_max_level(level))?;

    log::info!("Logging initialized at level: {}", level);
    log::info!("App version: {}", env!("CARGO_PKG_VERSION"));

    Ok(())
}

/// Render an epoch-millisecond timestamp in local time for display.
pub fn format_time(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("@{}", timestamp_ms),
    }
}
