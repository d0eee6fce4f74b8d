//! # Console Logging for Hosted Bring-Up
//!
//! The cookie conversion core only talks to the [`log`] facade. Anything that
//! hosts it (a test harness, a bring-up tool) installs a backend; this crate
//! provides the simplest one that is still useful when diagnosing a failed
//! attach or an init overflow: one `[LEVEL] target: message` line per record
//! on standard error.
//!
//! ```rust,no_run
//! use dp_log::ConsoleLogger;
//! use log::LevelFilter;
//!
//! ConsoleLogger::new(LevelFilter::Debug).init().expect("logger already set");
//! log::info!("cookie conversion ready");
//! ```
//!
//! [`dp_trace!`] writes straight to the sink without going through `log`. With
//! the `enabled` feature (default) turned off both become no-ops.

mod logger;

pub use logger::ConsoleLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod trace_fmt {
    use std::fmt;
    use std::io::Write;

    #[doc(hidden)]
    #[inline]
    pub fn trace_write(args: fmt::Arguments) {
        // Best effort; a closed stderr is not worth failing over.
        let mut err = std::io::stderr().lock();
        let _ = err.write_fmt(args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod trace_fmt {
    use std::fmt;

    #[doc(hidden)]
    #[inline]
    pub fn trace_write(_: fmt::Arguments) {}
}

#[macro_export]
macro_rules! dp_trace {
    ($($arg:tt)*) => {{
        $crate::trace_fmt::trace_write(::core::format_args!($($arg)*));
    }};
}
