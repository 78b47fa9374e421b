// Licensed under the Apache-2.0 license

//! Logging seam shared by the driver modules.
//!
//! Drivers take a `Logger` by value as a type parameter, so a build that does
//! not want logging pays nothing for it: `NoOpLogger` is zero-sized and every
//! call compiles away.

use core::fmt;

/// Severity of a log record
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink for driver diagnostics.
///
/// Implementations are called from interrupt context and must not block or
/// allocate.
pub trait Logger {
    fn log(&self, level: Level, args: fmt::Arguments<'_>);

    fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

/// Logger that discards everything
#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline(always)]
    fn log(&self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Forwards records to the defmt global logger
#[cfg(feature = "defmt")]
#[derive(Copy, Clone, Debug, Default)]
pub struct DefmtLogger;

#[cfg(feature = "defmt")]
impl Logger for DefmtLogger {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let msg = defmt::Display2Format(&args);
        match level {
            Level::Debug => defmt::debug!("{}", msg),
            Level::Info => defmt::info!("{}", msg),
            Level::Warn => defmt::warn!("{}", msg),
            Level::Error => defmt::error!("{}", msg),
        }
    }
}

impl<T: Logger + ?Sized> Logger for &T {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        (**self).log(level, args);
    }
}
