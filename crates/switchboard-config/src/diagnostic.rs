// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridges figment's deserialization failures into miette diagnostics.
//!
//! A rejected config surfaces as one `ConfigError` per problem, each carrying
//! whatever context could be recovered: a span into the offending TOML file,
//! the keys the section accepts, and a closest-match suggestion scored with
//! Jaro-Winkler similarity.

#![allow(unused_assignments)] // the Diagnostic derive expands to assignments this lint flags

use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Similarity floor below which no correction is offered. 0.75 keeps
/// single-edit typos like `bind_adress` while dropping unrelated keys.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration problem, shaped for terminal rendering.
///
/// Variants hold miette source/span data where it could be recovered, so the
/// graphical handler can underline the exact key in the user's TOML.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key the target section does not accept.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(switchboard::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// The key as written.
        key: String,
        /// Closest accepted key, when one scores above the similarity floor.
        suggestion: Option<String>,
        /// Comma-joined listing of the keys the section accepts.
        valid_keys: String,
        /// Where the key sits in the source file, when resolvable.
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        /// The file the span points into.
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that deserialized to the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(
        code(switchboard::config::invalid_type),
        help("expected {expected}")
    )]
    InvalidType {
        /// Dotted path of the offending key.
        key: String,
        /// What was found versus what was wanted.
        detail: String,
        /// The expected type, for the help line.
        expected: String,
        /// Span of the offending value, when resolvable.
        #[label("value has the wrong type")]
        span: Option<SourceSpan>,
        /// The file the span points into.
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key the schema requires but the merged config lacks.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(switchboard::config::missing_key),
        help("add a `{key}` entry to switchboard.toml")
    )]
    MissingKey {
        /// The absent key.
        key: String,
    },

    /// A value that parsed fine but fails a semantic check.
    #[error("validation error: {message}")]
    #[diagnostic(code(switchboard::config::validation))]
    Validation {
        /// What the check rejected.
        message: String,
    },

    /// Anything figment reports that has no richer mapping.
    #[error("configuration error: {0}")]
    #[diagnostic(code(switchboard::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    if let Some(candidate) = suggestion {
        format!("did you mean `{candidate}`? Valid keys: {valid_keys}")
    } else {
        format!("valid keys: {valid_keys}")
    }
}

/// Convert a `figment::Error` into diagnostics, one per underlying problem.
///
/// Figment aggregates every failure it hit during extraction; each is mapped
/// to the `ConfigError` variant that best fits its kind, falling back to
/// [`ConfigError::Other`] for kinds with no richer shape.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| classify(error, toml_sources))
        .collect()
}

fn classify(error: figment::Error, toml_sources: &[(String, String)]) -> ConfigError {
    use figment::error::Kind;

    match &error.kind {
        Kind::UnknownField(field, accepted) => {
            let (span, src) = locate_key(&error, field, toml_sources).unzip();
            ConfigError::UnknownKey {
                key: field.clone(),
                suggestion: suggest_key(field, accepted),
                valid_keys: accepted.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(field) => ConfigError::MissingKey {
            key: field.to_string(),
        },
        Kind::InvalidType(actual, wanted) => ConfigError::InvalidType {
            key: error.path.join("."),
            detail: format!("found {actual}, expected {wanted}"),
            expected: wanted.to_string(),
            span: None,
            src: None,
        },
        _ => ConfigError::Other(error.to_string()),
    }
}

/// Resolve a span for `field` in whichever loaded TOML file produced `error`.
///
/// Needs the error's metadata to name a source file, that file to be among
/// `toml_sources`, and the key to be findable in its text. Any gap in that
/// chain yields `None` and the diagnostic renders without a span.
fn locate_key(
    error: &figment::Error,
    field: &str,
    toml_sources: &[(String, String)],
) -> Option<(SourceSpan, NamedSource<String>)> {
    let source = error.metadata.as_ref()?.source.as_ref()?;
    let figment::Source::File(path) = source else {
        return None;
    };
    let path = path.display().to_string();

    let (name, content) = toml_sources.iter().find(|(p, _)| *p == path)?;
    let section = error.path.first().map(String::as_str);
    let offset = find_key_offset(content, section, field)?;

    Some((
        SourceSpan::new(offset.into(), field.len()),
        NamedSource::new(name, content.clone()),
    ))
}

/// Byte offset of `field` within `content`, scoped to a section.
///
/// With `section = Some("server")` the search starts after the `[server]`
/// header; with `None` it covers the whole document. A hit must sit at the
/// start of a line (leading whitespace aside) and be followed by `=` or
/// whitespace, so mentions inside comments and values don't count.
pub fn find_key_offset(content: &str, section: Option<&str>, field: &str) -> Option<usize> {
    let base = match section {
        Some(name) => {
            let header = format!("[{name}]");
            content.find(&header)? + header.len()
        }
        None => 0,
    };

    let tail = &content[base..];
    for (pos, _) in tail.match_indices(field) {
        let line_start = tail[..pos].rfind('\n').map_or(0, |nl| nl + 1);
        if !tail[line_start..pos].chars().all(|c| c == ' ' || c == '\t') {
            continue;
        }
        if matches!(tail[pos + field.len()..].chars().next(), Some(' ' | '\t' | '=')) {
            return Some(base + pos);
        }
    }

    None
}

/// Pick the accepted key most similar to `unknown`, if any clears the floor.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, key)| key.to_string())
}

/// Print each error to stderr through miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    let mut report = String::new();
    for error in errors {
        report.clear();
        match handler.render_report(&mut report, error) {
            Ok(()) => eprint!("{report}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
