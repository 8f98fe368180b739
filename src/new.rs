//! Creates new note source files, numbered after the existing notes.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::list::{next_sequence_number, Error as ListError};
use crate::note::{Header, Visibility, MARKDOWN_EXTENSION};
use crate::parser::FENCE;

/// Creates `<source_directory>/<NNNN>-<slug>.md` holding a header block for
/// `name` dated `today`, and returns its path. The sequence number follows
/// every existing note, hidden ones included. Existing files are never
/// overwritten.
///
/// `name` becomes the `title` header line verbatim, so it may not contain a
/// line break or the `---` fence.
pub fn create_note(
    source_directory: &Path,
    name: &str,
    visibility: Visibility,
    today: NaiveDate,
) -> Result<PathBuf> {
    let slug = slug::slugify(name);
    if slug.is_empty() || name.contains(FENCE) || name.contains(['\n', '\r']) {
        return Err(Error::InvalidName(name.to_owned()));
    }

    let number = next_sequence_number(source_directory)?;
    let path = source_directory.join(format!("{:04}-{}{}", number, slug, MARKDOWN_EXTENSION));

    let header = Header {
        title: name.trim().to_owned(),
        date: Some(today),
        visibility,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::AlreadyExists => Error::AlreadyExists(path.clone()),
            _ => Error::Io(err),
        })?;
    writeln!(file, "{}", header)?;

    tracing::info!("Created {}", path.display());
    Ok(path)
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for creating a note.
#[derive(Debug)]
pub enum Error {
    /// Returned when the name has nothing usable for a file name, or can't
    /// be written as a header line.
    InvalidName(String),

    /// Returned when the target file is already there.
    AlreadyExists(PathBuf),

    /// Returned when the existing notes can't be listed.
    List(ListError),

    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidName(name) => write!(f, "Invalid note name: `{}`", name),
            Error::AlreadyExists(path) => {
                write!(f, "Note `{}` already exists", path.display())
            }
            Error::List(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidName(_) => None,
            Error::AlreadyExists(_) => None,
            Error::List(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<ListError> for Error {
    fn from(err: ListError) -> Error {
        Error::List(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
