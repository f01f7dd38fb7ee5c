use std::path::{Path, PathBuf};

use crate::error::NpauthError;

use super::env::expand_config;
use super::types::NpauthConfig;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Str,
    StrEscape,
    LineComment,
    BlockComment,
    BlockStar,
}

/// Drop `//` and `/* */` comments outside strings, keeping newlines so serde
/// error positions still point at the right line.
pub fn strip_jsonc_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut state = Scan::Code;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        state = match (state, ch) {
            (Scan::Code, '/') if chars.peek() == Some(&'/') => {
                chars.next();
                Scan::LineComment
            }
            (Scan::Code, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                Scan::BlockComment
            }
            (Scan::Code, '"') => {
                out.push(ch);
                Scan::Str
            }
            (Scan::Code, _) => {
                out.push(ch);
                Scan::Code
            }
            (Scan::Str, '\\') => {
                out.push(ch);
                Scan::StrEscape
            }
            (Scan::Str, '"') => {
                out.push(ch);
                Scan::Code
            }
            (Scan::Str, _) | (Scan::StrEscape, _) => {
                out.push(ch);
                Scan::Str
            }
            (Scan::LineComment, '\n') => {
                out.push(ch);
                Scan::Code
            }
            (Scan::LineComment, _) => Scan::LineComment,
            (Scan::BlockComment | Scan::BlockStar, '\n') => {
                out.push(ch);
                Scan::BlockComment
            }
            (Scan::BlockComment | Scan::BlockStar, '*') => Scan::BlockStar,
            (Scan::BlockStar, '/') => Scan::Code,
            (Scan::BlockComment | Scan::BlockStar, _) => Scan::BlockComment,
        };
    }

    out
}

/// Discover config files in precedence order (highest first).
///
/// 1. `--config` CLI flag
/// 2. `NPAUTH_CONFIG` env var
/// 3. `./config/npauth.json`
/// 4. `~/.npauth/npauth.json`, then `~/.npauth/npauth.jsonc`
pub fn discover_config_files(cli_config: Option<&str>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = cli_config {
        candidates.push(PathBuf::from(path));
    }
    if let Ok(env_path) = std::env::var("NPAUTH_CONFIG") {
        candidates.push(PathBuf::from(env_path));
    }
    candidates.push(PathBuf::from("./config/npauth.json"));
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".npauth").join("npauth.json"));
        candidates.push(home.join(".npauth").join("npauth.jsonc"));
    }

    let mut files = Vec::new();
    for path in candidates {
        if path.exists() && !files.contains(&path) {
            files.push(path);
        }
    }
    files
}

/// Load a single config file, stripping JSONC comments before parsing.
pub fn load_config_file(path: &Path) -> Result<NpauthConfig, NpauthError> {
    let content = std::fs::read_to_string(path).map_err(|e| NpauthError::ConfigError {
        path: path.to_path_buf(),
        detail: format!("Cannot read file: {}", e),
    })?;

    let stripped = strip_jsonc_comments(&content);
    serde_json::from_str::<NpauthConfig>(&stripped).map_err(|e| NpauthError::ConfigError {
        path: path.to_path_buf(),
        detail: format!("Invalid JSON: {}", e),
    })
}

/// Load the highest-precedence config file (or defaults) and expand env vars.
///
/// An explicit `--config` path that does not exist is an error rather than a
/// silent fallback to defaults.
pub fn load_config(cli_config: Option<&str>) -> Result<NpauthConfig, NpauthError> {
    if let Some(path) = cli_config {
        if !Path::new(path).exists() {
            return Err(NpauthError::ConfigError {
                path: PathBuf::from(path),
                detail: "File does not exist".into(),
            });
        }
    }

    let mut config = match discover_config_files(cli_config).first() {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            load_config_file(path)?
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            NpauthConfig::default()
        }
    };

    expand_config(&mut config)?;
    Ok(config)
}
