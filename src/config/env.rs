use std::iter::Peekable;
use std::str::Chars;

use crate::error::NpauthError;

use super::types::NpauthConfig;

/// Expand environment variable references in a string.
///
/// Supported syntaxes:
/// - `${VAR}` - replaced with env var value; error if unset
/// - `${VAR:-fallback}` - env var value, or fallback if unset or empty
/// - `$env:VAR` - same as `${VAR}`
///
/// A `$` that starts none of these is kept literally.
pub fn expand_env_vars(input: &str) -> Result<String, NpauthError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        if chars.peek() == Some(&'{') {
            chars.next();
            let expr = read_braced(&mut chars)?;
            result.push_str(&resolve_expression(&expr)?);
        } else if chars.clone().take(4).collect::<String>() == "env:" {
            for _ in 0..4 {
                chars.next();
            }
            let name = read_identifier(&mut chars);
            if name.is_empty() {
                return Err(env_error("Empty variable name in $env: reference"));
            }
            result.push_str(&lookup(&name)?);
        } else {
            result.push('$');
        }
    }

    Ok(result)
}

fn read_braced(chars: &mut Peekable<Chars<'_>>) -> Result<String, NpauthError> {
    let mut expr = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            return Ok(expr);
        }
        expr.push(c);
    }
    Err(env_error(&format!("Unclosed variable reference: ${{{expr}")))
}

fn read_identifier(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

fn resolve_expression(expr: &str) -> Result<String, NpauthError> {
    match expr.split_once(":-") {
        Some((name, fallback)) => match std::env::var(name) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(fallback.to_string()),
        },
        None => lookup(expr),
    }
}

fn lookup(name: &str) -> Result<String, NpauthError> {
    std::env::var(name)
        .map_err(|_| env_error(&format!("Environment variable '{name}' is not set")))
}

/// Expand environment variables in every string field that may carry one.
pub fn expand_config(config: &mut NpauthConfig) -> Result<(), NpauthError> {
    let provider = &mut config.provider;
    for field in [
        &mut provider.client_id,
        &mut provider.client_secret,
        &mut provider.redirect_uri,
        &mut provider.authorize_url,
        &mut provider.token_url,
    ] {
        *field = expand_env_vars(field)?;
    }
    for scope in &mut provider.scopes {
        *scope = expand_env_vars(scope)?;
    }

    config.store.directory = expand_env_vars(&config.store.directory)?;
    config.server.bind = expand_env_vars(&config.server.bind)?;
    config.server.home_url = expand_env_vars(&config.server.home_url)?;
    config.bot.api_base = expand_env_vars(&config.bot.api_base)?;
    Ok(())
}

fn env_error(detail: &str) -> NpauthError {
    NpauthError::ConfigError {
        path: std::path::PathBuf::from("<env>"),
        detail: detail.to_string(),
    }
}
