use crate::dp_trace;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend printing to standard error.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleLogger {
    max_level: LevelFilter,
}

impl ConsoleLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    /// Install as the global logger. Call once per process.
    ///
    /// # Errors
    /// Fails if another logger was installed first.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        log::set_logger(Box::leak(Box::new(self)))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        dp_trace!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}
