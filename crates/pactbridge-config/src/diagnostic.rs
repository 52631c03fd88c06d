// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment errors into miette reports for the relay's config files.
//!
//! Converts Figment deserialization errors into miette diagnostics that
//! point at the offending key in the TOML file, or name the environment
//! provider the bad value came from.

#![allow(unused_assignments)] // emitted by the miette derive

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a valid key needs before it is offered as a fix.
/// Catches typos like `hots` -> `host` and `send_queeu` -> `send_queue`.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// One problem found while loading `pactbridge.toml` and the environment.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key `deny_unknown_fields` refused.
    #[error("`{key}` is not a recognised key")]
    #[diagnostic(
        code(pactbridge::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// The key as written.
        key: String,
        /// Closest valid key, when one is close enough.
        suggestion: Option<String>,
        /// Comma-separated valid keys for the section.
        valid_keys: String,
        #[label("unknown key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not deserialize into the field's type.
    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(pactbridge::config::invalid_type), help("expected {expected}, set in {origin}"))]
    InvalidType {
        /// Dotted path of the key with the wrong type.
        key: String,
        /// What was found versus what was wanted.
        detail: String,
        expected: String,
        /// Provider that supplied the value (file path or environment).
        origin: String,
        #[label("wrong type")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key with no default that nobody set.
    #[error("`{key}` is required")]
    #[diagnostic(
        code(pactbridge::config::missing_key),
        help("set `{key}` in pactbridge.toml or through the environment")
    )]
    MissingKey {
        /// Dotted path of the missing key.
        key: String,
    },

    /// Well-typed but unusable, e.g. an empty queue name.
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(pactbridge::config::validation))]
    Validation {
        message: String,
    },

    /// Anything figment reports that has no dedicated variant.
    #[error("configuration error: {0}")]
    #[diagnostic(code(pactbridge::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("try `{s}` (section accepts: {valid_keys})"),
        None => format!("section accepts: {valid_keys}"),
    }
}

/// Splits a `figment::Error` into one [`ConfigError`] per underlying failure.
///
/// `toml_sources` holds `(path, content)` pairs for every TOML file that may
/// have contributed, so spans can be resolved against the right file.
pub fn figment_to_config_errors(
    err: figment::Error,
    files: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert_one(&error, files))
        .collect()
}

fn convert_one(error: &figment::Error, files: &[(String, String)]) -> ConfigError {
    let section: Vec<String> = error.path.iter().cloned().collect();

    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let (span, src) = locate(error, &section, field, files);
            ConfigError::UnknownKey {
                key: field.clone(),
                suggestion: suggest_key(field, expected),
                valid_keys: expected.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(field) => ConfigError::MissingKey {
            key: dotted(&section, field),
        },
        Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
            // The last path element is the key itself; its table is the rest.
            let (table, field) = match section.split_last() {
                Some((field, table)) => (table.to_vec(), field.clone()),
                None => (Vec::new(), String::new()),
            };
            let (span, src) = locate(error, &table, &field, files);
            ConfigError::InvalidType {
                key: section.join("."),
                detail: format!("got {actual}, wanted {expected}"),
                expected: expected.to_string(),
                origin: origin(error),
                span,
                src,
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

fn dotted(section: &[String], field: &str) -> String {
    if section.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", section.join("."))
    }
}

/// Human name of the provider that produced the failing value.
fn origin(error: &figment::Error) -> String {
    error
        .metadata
        .as_ref()
        .map(|m| match &m.source {
            Some(figment::Source::File(path)) => path.display().to_string(),
            _ => m.name.to_string(),
        })
        .unwrap_or_else(|| "defaults".to_string())
}

/// Resolve a source span for `field` inside `table` of the file the error came from.
fn locate(
    error: &figment::Error,
    table: &[String],
    field: &str,
    files: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(path)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let path = path.display().to_string();

    let Some((name, content)) = files.iter().find(|(p, _)| *p == path) else {
        return (None, None);
    };

    match find_key_offset(content, table, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Find the byte offset of `field` in TOML content, inside the table named by `path`.
///
/// Only the body of the matching `[table]` is searched: the scan stops at the
/// next table header. Top-level keys are searched before the first header.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let wanted = path.join(".");
    let mut in_table = wanted.is_empty();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let text = line.trim_start();
        let indent = line.len() - text.len();

        if let Some(header) = text.strip_prefix('[') {
            let name = header
                .trim_start_matches('[')
                .split(']')
                .next()
                .unwrap_or_default()
                .trim();
            in_table = name == wanted;
        } else if in_table
            && let Some(after) = text.strip_prefix(field)
            && after.trim_start().starts_with('=')
        {
            return Some(offset + indent);
        }

        offset += line.len();
    }

    None
}

/// Closest entry of `valid_keys` to a mistyped key, if any scores above
/// [`SUGGESTION_THRESHOLD`].
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|&key| (key, strsim::jaro_winkler(unknown, key)))
        .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(key, _)| key.to_string())
}

/// Prints every error to stderr as a miette report.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut report = String::new();
        match handler.render_report(&mut report, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{report}"),
            Err(_) => eprintln!("pactbridge: {error}"),
        }
    }
}
