//! Conditional logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! The choreography modules (menu, questions, pointer) log every step of their
//! animation scripts, which is noisy once a flow is known to work. Each of
//! them declares the flag and routes its logging through these macros:
//!
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info, log_warn, log_error};
//!
//! log_info!("questions flow opened");
//! ```

/// Conditional info logging. The calling module must define `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Conditional debug logging. The calling module must define `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Conditional warn logging. The calling module must define `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Conditional error logging. The calling module must define `ENABLE_LOGS`.
///
/// Errors on the fallback paths (a menu that had to be forced visible, a
/// failed remote save) are always worth seeing, so most modules keep the flag
/// on and only silence it while bisecting a noisy flow.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
