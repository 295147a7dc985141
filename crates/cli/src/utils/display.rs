//! Display helpers for terminal output

use std::fmt::Write as _;

use cardlink_apdu_core::{AuthenticationStatus, Response};
use cardlink_transport_pcsc::{CardStatus, CardStatusEvent};
use colored::Colorize;

/// Format a success message
pub fn success(message: &str) -> String {
    format!("✅ {}", message.green().bold())
}

/// Format a warning message
pub fn warning(message: &str) -> String {
    format!("⚠️  {}", message.yellow().bold())
}

/// Format a key-value section
pub fn key_value_box(title: &str, items: Vec<(&str, String)>) -> String {
    let mut result = format!("{}", title.bold().underline());

    for (key, value) in items {
        let _ = write!(result, "\n  {}: {}", key.bold(), value);
    }

    result
}

/// Format a card response with its status word
pub fn response(response: &Response) -> String {
    let Some(status) = response.status() else {
        return warning(&format!(
            "Invalid response frame: {}",
            hex::encode_upper(response.raw())
        ));
    };

    let status_text = format!("{status}");
    let status_text = if status.is_success() {
        status_text.green()
    } else if status.is_warning() {
        status_text.yellow()
    } else {
        status_text.red()
    };

    let payload = if response.payload().is_empty() {
        "(empty)".dimmed().to_string()
    } else {
        hex::encode_upper(response.payload())
    };

    key_value_box(
        "Response",
        vec![("Data", payload), ("Status", status_text.to_string())],
    )
}

/// Format a PIN verification outcome
pub fn authentication(status: AuthenticationStatus) -> String {
    match status {
        AuthenticationStatus::Success => success(&status.to_string()),
        AuthenticationStatus::IncorrectPin(_) => warning(&status.to_string()),
        AuthenticationStatus::PinBlocked | AuthenticationStatus::Failure => {
            format!("❌ {}", status.to_string().red().bold())
        }
    }
}

/// Format a card insertion or removal
pub fn card_event(event: &CardStatusEvent) -> String {
    let status = match event.status {
        CardStatus::Inserted => event.status.to_string().green(),
        CardStatus::Ejected => event.status.to_string().yellow(),
    };
    format!("{}: {}", event.reader.bold(), status)
}
