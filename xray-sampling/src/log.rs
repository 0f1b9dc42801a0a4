// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Logging of the sampler.
//!
//! Every sampler owns an `Arc<dyn Logger>` given at construction, and logs through the
//! `xray_*!` macros which take that logger as first argument.
//!
//! ```
//! use std::sync::Arc;
//! use xray_sampling::log::{ConsoleLogger, LevelFilter, Logger};
//!
//! let logger: Arc<dyn Logger> = Arc::new(ConsoleLogger::new(LevelFilter::Warn));
//! xray_sampling::xray_warn!(logger, "collector unreachable: {}", "connection refused");
//! ```

use std::{
    fmt::{self, Display},
    str::FromStr,
    sync::atomic::{AtomicUsize, Ordering},
};

#[repr(usize)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[non_exhaustive]
/// The level at which the library will log
pub enum LevelFilter {
    Off,
    #[default]
    Error,
    Warn,
    Info,
    Debug,
}

impl LevelFilter {
    fn from_usize(value: usize) -> Self {
        match value {
            0 => LevelFilter::Off,
            1 => LevelFilter::Error,
            2 => LevelFilter::Warn,
            3 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }
}

impl FromStr for LevelFilter {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("debug") {
            Ok(LevelFilter::Debug)
        } else if s.eq_ignore_ascii_case("info") {
            Ok(LevelFilter::Info)
        } else if s.eq_ignore_ascii_case("warn") {
            Ok(LevelFilter::Warn)
        } else if s.eq_ignore_ascii_case("error") {
            Ok(LevelFilter::Error)
        } else if s.eq_ignore_ascii_case("off") {
            Ok(LevelFilter::Off)
        } else {
            Err("log level filter should be one of DEBUG, INFO, WARN, ERROR, OFF")
        }
    }
}

impl Display for LevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filter = match self {
            LevelFilter::Debug => "DEBUG",
            LevelFilter::Info => "INFO",
            LevelFilter::Warn => "WARN",
            LevelFilter::Error => "ERROR",
            LevelFilter::Off => "OFF",
        };

        write!(f, "{filter}")
    }
}

#[repr(usize)]
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Level {
    Error = 1, // this value must match with LevelFilter::Error
    Warn,
    Info,
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };

        write!(f, "{level}")
    }
}

impl PartialEq<LevelFilter> for Level {
    #[inline]
    fn eq(&self, other: &LevelFilter) -> bool {
        (*self as usize) == (*other as usize)
    }
}

impl PartialOrd<LevelFilter> for Level {
    #[inline]
    fn partial_cmp(&self, other: &LevelFilter) -> Option<std::cmp::Ordering> {
        Some((*self as usize).cmp(&(*other as usize)))
    }
}

/// Destination of the sampler's logs
pub trait Logger: Send + Sync {
    fn enabled(&self, level: Level) -> bool;

    fn log(&self, level: Level, args: fmt::Arguments<'_>, file: &str, line: u32);
}

/// Writes logs to stdout, errors to stderr
#[derive(Debug)]
pub struct ConsoleLogger {
    max_level: AtomicUsize,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new(LevelFilter::default())
    }
}

impl ConsoleLogger {
    pub fn new(max_level: LevelFilter) -> Self {
        ConsoleLogger {
            max_level: AtomicUsize::new(max_level as usize),
        }
    }

    pub fn set_max_level(&self, level: LevelFilter) {
        self.max_level.store(level as usize, Ordering::Relaxed)
    }

    pub fn max_level(&self) -> LevelFilter {
        LevelFilter::from_usize(self.max_level.load(Ordering::Relaxed))
    }
}

impl Logger for ConsoleLogger {
    fn enabled(&self, level: Level) -> bool {
        level <= self.max_level()
    }

    fn log(&self, level: Level, args: fmt::Arguments<'_>, file: &str, line: u32) {
        if level == LevelFilter::Error {
            eprintln!("\x1b[91m{level}\x1b[0m {file}:{line} - {args}");
        } else {
            println!("\x1b[93m{level}\x1b[0m {file}:{line} - {args}");
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn enabled(&self, _level: Level) -> bool {
        false
    }

    fn log(&self, _level: Level, _args: fmt::Arguments<'_>, _file: &str, _line: u32) {}
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_logger {
    //! Captures logs for assertions
    //!
    //! ```ignore
    //! let logger = Arc::new(TestLogger::default());
    //! xray_sampling::xray_debug!(logger, "my log");
    //! assert_eq!(logger.take_logs(), vec![(Level::Debug, "my log".to_string())]);
    //! ```
    use std::sync::Mutex;

    use super::{Level, Logger};

    #[derive(Debug, Default)]
    pub struct TestLogger(Mutex<Vec<(Level, String)>>);

    impl TestLogger {
        pub fn take_logs(&self) -> Vec<(Level, String)> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }

        /// Messages logged at `level`, without consuming them
        pub fn messages(&self, level: Level) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    impl Logger for TestLogger {
        fn enabled(&self, _level: Level) -> bool {
            true
        }

        fn log(&self, level: Level, args: std::fmt::Arguments<'_>, _file: &str, _line: u32) {
            self.0.lock().unwrap().push((level, args.to_string()))
        }
    }
}

#[macro_export]
macro_rules! xray_debug {
    // debug!(logger, "a {} event", "log")
    ($logger:expr, $($arg:tt)+) => {
      $crate::xray_log!($logger, $crate::log::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! xray_info {
  // info!(logger, "a {} event", "log")
  ($logger:expr, $($arg:tt)+) => {
    $crate::xray_log!($logger, $crate::log::Level::Info, $($arg)+)
  };
}

#[macro_export]
macro_rules! xray_warn {
  // warn!(logger, "a {} event", "log")
  ($logger:expr, $($arg:tt)+) => {
    $crate::xray_log!($logger, $crate::log::Level::Warn, $($arg)+)
  };
}

#[macro_export]
macro_rules! xray_error {
  // error!(logger, "a {} event", "log")
  ($logger:expr, $($arg:tt)+) => {
    $crate::xray_log!($logger, $crate::log::Level::Error, $($arg)+)
  };
}

#[macro_export]
macro_rules! xray_log {
    ($logger:expr, $lvl:expr, $($arg:tt)+) => {{
      use $crate::log::Logger as _;
      let logger = &$logger;
      let lvl = $lvl;
      if logger.enabled(lvl) {
        let loc = std::panic::Location::caller();
        logger.log(lvl, format_args!($($arg)+), loc.file(), loc.line());
      }
    }};
}
