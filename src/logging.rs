use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Simple file logger for sensor runtime debugging.
///
/// Timestamps are UTC so log lines correlate with event context times,
/// which are UTC as well.
pub struct FileLogger {
    file: Arc<Mutex<std::fs::File>>,
}

impl FileLogger {
    /// Create a new file logger
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Open `<directory>/<sensor>.log`, creating the directory if needed
    pub fn for_sensor(directory: impl AsRef<Path>, sensor_name: &str) -> std::io::Result<Self> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;
        Self::new(directory.join(format!("{}.log", sensor_name)))
    }

    /// Log a message
    pub fn log(&self, message: impl AsRef<str>) {
        self.write_line(None, message.as_ref());
    }

    /// Log with a specific level
    pub fn log_level(&self, level: &str, message: impl AsRef<str>) {
        self.write_line(Some(level), message.as_ref());
    }

    fn write_line(&self, level: Option<&str>, message: &str) {
        if let Ok(mut file) = self.file.lock() {
            let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let _ = match level {
                Some(level) => writeln!(file, "[{}] [{}] {}", timestamp, level, message),
                None => writeln!(file, "[{}] {}", timestamp, message),
            };
        }
    }
}

impl Clone for FileLogger {
    fn clone(&self) -> Self {
        Self {
            file: Arc::clone(&self.file),
        }
    }
}
