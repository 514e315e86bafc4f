//! Telemetry logic.
//! Support tracing and metrics.

use metrics::Unit;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install a formatted tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `info`. Does nothing if a global
/// subscriber is already set.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Describe every metric recorded by the service.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "auth_events_total",
        Unit::Count,
        "Authentication events by kind and outcome."
    );
    metrics::describe_counter!(
        "notifications_failed_total",
        Unit::Count,
        "Notifications that could not be handed to the notifier."
    );
}

/// Authentication event, used as metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Signup,
    Signin,
    Refresh,
    ConfirmEmail,
    PasswordReset,
    Signout,
}

impl Event {
    fn as_str(&self) -> &'static str {
        match self {
            Event::Signup => "signup",
            Event::Signin => "signin",
            Event::Refresh => "refresh",
            Event::ConfirmEmail => "confirm_email",
            Event::PasswordReset => "password_reset",
            Event::Signout => "signout",
        }
    }
}

/// Count one authentication event.
pub fn record<T, E>(event: Event, result: &Result<T, E>) {
    let outcome = if result.is_ok() { "success" } else { "failure" };
    let labels = [("event", event.as_str()), ("outcome", outcome)];
    metrics::counter!("auth_events_total", &labels).increment(1);
}

pub(crate) fn record_notification_failure() {
    metrics::counter!("notifications_failed_total").increment(1);
}
