//! Logging macros for scan cycles.
//!
//! Every line is tagged with the cycle id so the capture, recognition and save steps of
//! one tap can be followed in interleaved output. Output is gated by a module-level flag:
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{cycle_info, cycle_warn};
//!
//! cycle_info!(cycle_id, "captured {}", path.display());
//! ```

#[macro_export]
macro_rules! cycle_debug {
    ($cycle:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!("[scan {}] {}", $cycle, format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! cycle_info {
    ($cycle:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!("[scan {}] {}", $cycle, format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! cycle_warn {
    ($cycle:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!("[scan {}] {}", $cycle, format_args!($($arg)*));
        }
    };
}

/// Failures inside a cycle are absorbed, so this is the only trace they leave.
#[macro_export]
macro_rules! cycle_error {
    ($cycle:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!("[scan {}] {}", $cycle, format_args!($($arg)*));
        }
    };
}
