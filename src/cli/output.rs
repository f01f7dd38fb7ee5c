use colored::Colorize;
use serde::Serialize;

use crate::error::NpauthError;
use crate::oauth::{TokenRecord, TokenState};

/// Masked form of a secret, enough to tell tokens apart.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenView<'a> {
    user_identity: &'a str,
    access_token: &'a str,
    token_type: &'a str,
    scope: &'a str,
    expires_at: String,
}

pub fn print_token(record: &TokenRecord, json_mode: bool) {
    if json_mode {
        let view = TokenView {
            user_identity: &record.user_identity,
            access_token: &record.access_token,
            token_type: &record.token_type,
            scope: &record.scope,
            expires_at: record.expires_at.to_rfc3339(),
        };
        println!("{}", serde_json::to_string_pretty(&view).unwrap_or_default());
    } else {
        println!("{}", record.access_token);
    }
}

pub fn print_status(user: &str, state: TokenState, json_mode: bool, is_tty: bool) {
    if json_mode {
        let json = serde_json::json!({ "user": user, "state": state });
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        return;
    }
    let label = state.as_str();
    let label = if is_tty {
        match state {
            TokenState::Valid => label.green().bold().to_string(),
            TokenState::Expired => label.yellow().bold().to_string(),
            TokenState::Unauthorized => label.red().bold().to_string(),
        }
    } else {
        label.to_string()
    };
    println!("{user}: {label}");
}

pub fn print_stored(record: &TokenRecord, json_mode: bool) {
    if json_mode {
        let json = serde_json::json!({
            "user": record.user_identity,
            "expiresAt": record.expires_at.to_rfc3339(),
            "accessToken": mask_secret(&record.access_token),
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
    } else {
        println!(
            "Authorized {} (token {}, expires {})",
            record.user_identity,
            mask_secret(&record.access_token),
            record.expires_at.to_rfc3339()
        );
    }
}

pub fn print_message(key: &str, message: &str, json_mode: bool) {
    if json_mode {
        let mut obj = serde_json::Map::new();
        obj.insert(key.to_string(), serde_json::Value::String(message.to_string()));
        println!("{}", serde_json::to_string_pretty(&obj).unwrap_or_default());
    } else {
        println!("{message}");
    }
}

pub fn print_error(err: &NpauthError, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&err.to_json()).unwrap_or_default());
    } else if is_stderr_tty() {
        eprintln!("{}: {}", "Error".red().bold(), err);
    } else {
        eprintln!("Error: {err}");
    }
}

pub fn is_stdout_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdout())
}

fn is_stderr_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_secret_hides_short_values() {
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("12345678"), "****");
    }

    #[test]
    fn mask_secret_keeps_prefix() {
        assert_eq!(mask_secret("BQDx9fake-token-value"), "BQDx****");
    }

    #[test]
    fn print_error_json_mode() {
        let err = NpauthError::TokenNotFound("alice#0001".into());
        print_error(&err, true);
    }

    #[test]
    fn print_error_human_mode() {
        let err = NpauthError::ExchangeFailed("invalid_grant".into());
        print_error(&err, false);
    }

    #[test]
    fn print_status_all_states() {
        for state in [TokenState::Valid, TokenState::Expired, TokenState::Unauthorized] {
            print_status("alice#0001", state, false, true);
            print_status("alice#0001", state, true, false);
        }
    }
}
