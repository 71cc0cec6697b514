//! Process-wide log and panic reporting.
//!
//! Libraries only emit `tracing` events; binaries and tests call [`install`]
//! once to get them on stderr.

use std::panic::{self, PanicHookInfo};
use std::sync::Once;
use std::thread;

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Filter used when neither the caller nor `RUST_LOG` names one.
pub const DEFAULT_FILTER: &str = "info";

// ============================================================================
// Global State
// ============================================================================

static PANIC_HOOK_INSTALLED: Once = Once::new();
static TRACING_INSTALLED: Once = Once::new();

// ============================================================================
// Installation
// ============================================================================

/// Installs the stderr subscriber and the panic hook (idempotent).
///
/// `filter` is an [`EnvFilter`] directive such as `"trellis_core=debug"`. It
/// wins over `RUST_LOG`, which wins over [`DEFAULT_FILTER`]. An unparsable
/// directive falls back to the default.
pub fn install(filter: Option<&str>) {
    TRACING_INSTALLED.call_once(|| {
        let filter = filter
            .and_then(|directive| EnvFilter::try_new(directive).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

        let console = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(filter);

        if tracing_subscriber::registry().with(console).try_init().is_err() {
            eprintln!("trellis: a global tracing subscriber is already installed");
        }
    });
    install_panic_hook();
}

/// Routes panics through `tracing` before the previous hook runs (idempotent).
pub fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(info);
            previous(info);
        }));
    });
}

// ============================================================================
// Panic Reporting
// ============================================================================

fn log_panic(info: &PanicHookInfo<'_>) {
    let message = panic_message(info);
    let thread = thread::current().name().unwrap_or("unnamed").to_owned();
    let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));

    tracing::error!(
        target: "trellis::panic",
        message = %message,
        thread = %thread,
        location = location.as_deref().unwrap_or("unknown")
    );
}

fn panic_message(info: &PanicHookInfo<'_>) -> String {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
