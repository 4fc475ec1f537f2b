use alloc::format;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, set_logger, set_max_level};
use spin::Once;

/// Output device for log lines. Each record is delivered as exactly one line.
pub trait Console: Sync {
    fn write_line(&self, line: &str);
}

static CONSOLE: Once<&'static dyn Console> = Once::new();

pub struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(console) = CONSOLE.get() else {
            return;
        };
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 37,  // White
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        console.write_line(&format!(
            "\u{1B}[{}m[{:}] {}\u{1B}[0m",
            color,
            record.level(),
            record.args(),
        ));
    }

    fn flush(&self) {}
}

/// Install [Logger] writing to `console`. Only the first call in a process takes effect.
pub fn init(console: &'static dyn Console, level: LevelFilter) -> Result<(), SetLoggerError> {
    static LOGGER: Logger = Logger;
    CONSOLE.call_once(|| console);
    set_logger(&LOGGER)?;
    set_max_level(level);
    Ok(())
}

/// Improved debug macro,
/// only compiled in debug mode.
#[macro_export]
macro_rules! debug_ex {
    // debug_ex!(target: "my_target", "a {} event", "log")
    (target: $target:expr, $($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            log::log!(target: $target, log::Level::Debug, $($arg)+)
        }
    };

    // debug_ex!("a {} event", "log")
    ($($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            log::log!(log::Level::Debug, $($arg)+)
        }
    }
}

/// Log on behalf of a device: the line is prefixed with the device name.
#[macro_export]
macro_rules! dev_log {
    ($level: expr, $dev: expr, $($arg:tt)+) => {
        log::log!($level, "{}: {}", $dev.name(), format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! dev_err {
    ($dev: expr, $($arg:tt)+) => { $crate::dev_log!(log::Level::Error, $dev, $($arg)+) };
}

#[macro_export]
macro_rules! dev_warn {
    ($dev: expr, $($arg:tt)+) => { $crate::dev_log!(log::Level::Warn, $dev, $($arg)+) };
}

#[macro_export]
macro_rules! dev_info {
    ($dev: expr, $($arg:tt)+) => { $crate::dev_log!(log::Level::Info, $dev, $($arg)+) };
}

#[macro_export]
macro_rules! dev_dbg {
    ($dev: expr, $($arg:tt)+) => { $crate::dev_log!(log::Level::Debug, $dev, $($arg)+) };
}
