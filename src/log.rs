//! Logging macros.
//!
//! Each level-named macro forwards to the `log` crate's macro of the same
//! name when the `log` cargo feature is enabled. In builds without it, the
//! arguments are still type-checked but nothing is emitted.
//!
//! Code running in interrupt context must not log at all; only task-context
//! paths use these macros.

#[cfg(feature = "log")]
macro_rules! error {
    ($($t:tt)*) => { log::error!($($t)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! error {
    ($($t:tt)*) => {{ let _ = format_args!($($t)*); }};
}

#[cfg(feature = "log")]
macro_rules! warn {
    ($($t:tt)*) => { log::warn!($($t)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($t:tt)*) => {{ let _ = format_args!($($t)*); }};
}

#[cfg(feature = "log")]
macro_rules! info {
    ($($t:tt)*) => { log::info!($($t)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! info {
    ($($t:tt)*) => {{ let _ = format_args!($($t)*); }};
}

#[cfg(feature = "log")]
macro_rules! debug {
    ($($t:tt)*) => { log::debug!($($t)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($t:tt)*) => {{ let _ = format_args!($($t)*); }};
}

#[cfg(feature = "log")]
macro_rules! trace {
    ($($t:tt)*) => { log::trace!($($t)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($t:tt)*) => {{ let _ = format_args!($($t)*); }};
}
