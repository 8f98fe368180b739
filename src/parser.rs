//! Parses [`Note`]s from source files. A source file is a block of
//! `key: value` header lines, a `---` fence, and a markdown body:
//!
//! ```md
//! title: Hello
//! date: 01 Jan 2024
//! visibility: published
//! ---
//! # Hi
//! ```
//!
//! The body is rendered to sanitized HTML as part of parsing (see
//! [`crate::markdown`]), so a [`Note`] always carries its HTML.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;

use crate::markdown;
use crate::note::{Note, Visibility, DATE_FORMAT};

/// Separates the header block from the markdown body.
pub const FENCE: &str = "---";

/// Reads the file at `path` and parses it. Every failure is annotated with
/// the path of the offending file.
pub fn parse_file(path: &Path) -> Result<Note> {
    let parse = || -> Result<Note> {
        let contents = std::fs::read_to_string(path)?;
        parse(path, &contents)
    };
    parse().map_err(|e| {
        Error::Annotated(format!("parsing note `{}`", path.display()), Box::new(e))
    })
}

/// Parses a single [`Note`] from its source `path` and contents. The path is
/// only used to derive the base name and sequence number; nothing is read
/// from disk.
pub fn parse(path: &Path, input: &str) -> Result<Note> {
    let base_name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| Error::FileName(path.to_owned()))?
        .to_owned();
    let sequence_number = sequence_number(&base_name)
        .ok_or_else(|| Error::FileName(path.to_owned()))?;

    let delimiter = input.find(FENCE).ok_or(Error::MalformedSource)?;
    let header = parse_header(&input[..delimiter])?;
    let body = &input[delimiter + FENCE.len()..];

    Ok(Note {
        path: path.to_owned(),
        base_name,
        sequence_number,
        title: header.title,
        date: header.date,
        visibility: header.visibility,
        markdown: body.to_owned(),
        html: markdown::to_html(body),
        is_index: false,
    })
}

/// The numeric prefix before the first `-` of a base name.
fn sequence_number(base_name: &str) -> Option<u64> {
    let prefix = match base_name.split_once('-') {
        Some((prefix, _)) => prefix,
        None => base_name,
    };
    prefix.parse().ok()
}

struct ParsedHeader {
    title: String,
    date: Option<NaiveDate>,
    visibility: Visibility,
}

fn parse_header(block: &str) -> Result<ParsedHeader> {
    let mut header = ParsedHeader {
        title: String::new(),
        date: None,
        visibility: Visibility::Hidden,
    };

    for (i, line) in block.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            break;
        }

        let (key, value) = line.split_once(':').ok_or_else(|| Error::MalformedHeader {
            line: i + 1,
            text: line.to_owned(),
        })?;
        let value = value.trim();

        match key.trim() {
            "title" => header.title = value.to_owned(),
            "date" => {
                header.date = Some(NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(
                    |err| Error::MalformedDate {
                        value: value.to_owned(),
                        err,
                    },
                )?)
            }
            "visibility" => header.visibility = Visibility::from_header(value),
            key => return Err(Error::UnknownHeaderKey(key.to_owned())),
        }
    }

    Ok(header)
}

/// Represents the result of a [`Note`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Note`].
#[derive(Debug)]
pub enum Error {
    /// Returned when a source file has no `---` header delimiter.
    MalformedSource,

    /// Returned when a header line has no `:` separator. `line` is 1-based.
    MalformedHeader { line: usize, text: String },

    /// Returned for header keys other than `title`, `date` and `visibility`.
    UnknownHeaderKey(String),

    /// Returned when the `date` header doesn't match [`DATE_FORMAT`].
    MalformedDate {
        value: String,
        err: chrono::ParseError,
    },

    /// Returned when a file name has no numeric prefix. Notes are named by
    /// the tool itself, so this means the source directory is corrupt; see
    /// [`Error::is_fatal`].
    FileName(PathBuf),

    /// Returned for I/O errors reading the source file.
    Io(std::io::Error),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl Error {
    /// Reports whether this error indicates a corrupt source directory rather
    /// than a bad note, looking through annotations.
    pub fn is_fatal(&self) -> bool {
        matches!(self.root(), Error::FileName(_))
    }

    /// Strips any annotations and returns the underlying error.
    pub fn root(&self) -> &Error {
        match self {
            Error::Annotated(_, err) => err.root(),
            err => err,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MalformedSource => {
                write!(f, "missing `{}` separator in a file", FENCE)
            }
            Error::MalformedHeader { line, text } => {
                write!(f, "malformed header at line {} ({}): no separator", line, text)
            }
            Error::UnknownHeaderKey(key) => write!(f, "unknown header `{}`", key),
            Error::MalformedDate { value, err } => {
                write!(f, "malformed date `{}`: {}", value, err)
            }
            Error::FileName(path) => write!(
                f,
                "malformed file name `{}`: expected a numeric prefix",
                path.display()
            ),
            Error::Io(err) => err.fmt(f),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MalformedSource => None,
            Error::MalformedHeader { .. } => None,
            Error::UnknownHeaderKey(_) => None,
            Error::MalformedDate { err, .. } => Some(err),
            Error::FileName(_) => None,
            Error::Io(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
