use log::{Level, Metadata, SetLoggerError};

struct SimpleLogger {
  level: Level,
}

impl log::Log for SimpleLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= self.level
  }
  fn log(&self, rec: &log::Record) {
    if !self.enabled(rec.metadata()) {
      return;
    }
    println!(
      "[{}] {}:{} {}",
      rec.level(),
      rec.file().unwrap_or("unknown file"),
      rec.line().unwrap_or(0),
      rec.args()
    );
  }
  fn flush(&self) {}
}

/// Installs the process-wide logger. An explicit `level` wins over the
/// `NES_LOG` environment variable; both default to `Info`.
pub fn init(level: Option<Level>) -> Result<(), SetLoggerError> {
  let level = level
    .or_else(|| {
      std::env::var("NES_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
    })
    .unwrap_or(Level::Info);
  log::set_boxed_logger(Box::new(SimpleLogger { level }))
    .map(|()| log::set_max_level(level.to_level_filter()))
}
