//! Formatting, filtering and key mapping shared by the commands

use crate::s3_client::ObjectUri;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use glob::Pattern;
use std::io::{self, BufRead, Write};
use std::path::Path;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_optional_datetime(dt: Option<&DateTime<Utc>>) -> String {
    match dt {
        Some(dt) => dt.format(DATETIME_FORMAT).to_string(),
        None => " ".repeat(19),
    }
}

pub fn format_size(bytes: u64, human_readable: bool) -> String {
    match human_readable {
        true => humansize::format_size(bytes, humansize::BINARY),
        false => bytes.to_string(),
    }
}

/// `--include` / `--exclude` glob filter; exclusion wins
#[derive(Debug, Default)]
pub struct KeyFilter {
    include: Option<Pattern>,
    exclude: Option<Pattern>,
}

impl KeyFilter {
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Result<Self> {
        let compile = |glob: &str| {
            Pattern::new(glob).with_context(|| format!("Invalid pattern: {}", glob))
        };
        Ok(Self {
            include: include.map(compile).transpose()?,
            exclude: exclude.map(compile).transpose()?,
        })
    }

    pub fn accepts(&self, key: &str) -> bool {
        if self.exclude.as_ref().is_some_and(|p| p.matches(key)) {
            return false;
        }
        self.include.as_ref().map_or(true, |p| p.matches(key))
    }
}

/// Prompt on stdout; only an explicit yes confirms
pub fn confirm(message: &str) -> bool {
    print!("{} [y/N]: ", message);
    let _ = io::stdout().flush();

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

/// Last segment of a key or local path
pub fn base_name(path: &str) -> &str {
    path.rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(path)
}

/// `name` placed under `prefix`, with exactly one separating slash
pub fn child_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Portion of `key` below `prefix`, without a leading slash
pub fn relative_key<'a>(key: &'a str, prefix: &str) -> &'a str {
    key.strip_prefix(prefix)
        .unwrap_or(key)
        .trim_start_matches('/')
}

/// Destination key for a single file or object copied to `dest`.
///
/// A destination that names a prefix keeps the source's base name.
pub fn target_key(source: &str, dest: &ObjectUri) -> String {
    match &dest.key {
        Some(key) if !dest.is_prefix() => key.clone(),
        _ => child_key(dest.key_or_empty(), base_name(source)),
    }
}

/// Local destination for a single download
pub fn target_path(key: &str, dest: &Path, dest_is_dir: bool) -> std::path::PathBuf {
    if dest_is_dir {
        dest.join(base_name(key))
    } else {
        dest.to_path_buf()
    }
}
