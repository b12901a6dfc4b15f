//! Output macros for user-facing messages.
//!
//! Every macro takes anything that implements `Display` (normally a
//! [`Message`](super::Message)). In debug mode, enabled by `MVZ_DEBUG` or
//! `RUST_LOG`, the text becomes a `tracing` event at the matching level so
//! it interleaves with the engine's own structured events. Otherwise it is
//! printed plainly, errors to stderr.
//!
//! ```rust,no_run
//! use mvz_updater::libs::messages::Message;
//! use mvz_updater::{msg_info, msg_success};
//!
//! msg_info!(Message::CheckingForUpdates("github".into()));
//! msg_success!(Message::ConfigSaved, true);
//! ```

use std::sync::OnceLock;

static DEBUG_MODE: OnceLock<bool> = OnceLock::new();

/// Whether messages are routed to `tracing`. Resolved once per process.
#[doc(hidden)]
pub fn is_debug_mode() -> bool {
    *DEBUG_MODE.get_or_init(|| std::env::var_os("MVZ_DEBUG").is_some() || std::env::var_os("RUST_LOG").is_some())
}

#[doc(hidden)]
#[macro_export]
macro_rules! __msg_route {
    ($level:ident, $print:ident, $prefix:literal, $msg:expr, $spaced:expr) => {{
        let text = if $spaced {
            format!("\n{}{}\n", $prefix, $msg)
        } else {
            format!("{}{}", $prefix, $msg)
        };
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::$level!("{}", text);
        } else {
            $print!("{}", text);
        }
    }};
}

/// Plain message. Pass `true` as a second argument to surround it with
/// blank lines.
#[macro_export]
macro_rules! msg_print {
    ($msg:expr) => {
        $crate::__msg_route!(info, println, "", $msg, false)
    };
    ($msg:expr, true) => {
        $crate::__msg_route!(info, println, "", $msg, true)
    };
}

#[macro_export]
macro_rules! msg_success {
    ($msg:expr) => {
        $crate::__msg_route!(info, println, "✅ ", $msg, false)
    };
    ($msg:expr, true) => {
        $crate::__msg_route!(info, println, "✅ ", $msg, true)
    };
}

#[macro_export]
macro_rules! msg_info {
    ($msg:expr) => {
        $crate::__msg_route!(info, println, "ℹ️ ", $msg, false)
    };
    ($msg:expr, true) => {
        $crate::__msg_route!(info, println, "ℹ️ ", $msg, true)
    };
}

#[macro_export]
macro_rules! msg_warning {
    ($msg:expr) => {
        $crate::__msg_route!(warn, println, "⚠️ ", $msg, false)
    };
    ($msg:expr, true) => {
        $crate::__msg_route!(warn, println, "⚠️ ", $msg, true)
    };
}

/// Error message; goes to stderr outside debug mode.
#[macro_export]
macro_rules! msg_error {
    ($msg:expr) => {
        $crate::__msg_route!(error, eprintln, "❌ ", $msg, false)
    };
    ($msg:expr, true) => {
        $crate::__msg_route!(error, eprintln, "❌ ", $msg, true)
    };
}

/// Builds an `anyhow::Error` from a message.
#[macro_export]
macro_rules! msg_error_anyhow {
    ($msg:expr) => {
        anyhow::anyhow!("❌ {}", $msg)
    };
}

/// Returns early with an `anyhow::Error` built from a message.
#[macro_export]
macro_rules! msg_bail_anyhow {
    ($msg:expr) => {
        anyhow::bail!("❌ {}", $msg)
    };
}
