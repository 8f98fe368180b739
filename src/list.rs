//! Lists the notes in a source directory. This is the only way notes are
//! loaded: builds, the `list` command and new-note numbering all walk the
//! source directory from scratch.

use std::fmt;
use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use crate::note::{Note, MARKDOWN_EXTENSION};
use crate::parser::{self, Error as ParseError};

/// Walks `source_directory` and returns the notes visible under
/// `include_private`, ordered by ascending sequence number. Hidden notes are
/// never returned; private notes only when `include_private` is set.
///
/// A single unparseable file fails the whole listing.
pub fn list_notes(source_directory: &Path, include_private: bool) -> Result<Vec<Note>> {
    let mut notes = all_notes(source_directory)?;
    notes.retain(|note| note.visibility.is_listed(include_private));
    Ok(notes)
}

/// Walks `source_directory` and returns every note regardless of
/// visibility, ordered by ascending sequence number. Ties keep walk order,
/// which is by file name.
pub fn all_notes(source_directory: &Path) -> Result<Vec<Note>> {
    let mut notes = Vec::new();
    let walker = WalkDir::new(source_directory)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for result in walker {
        let entry = result?;
        if is_source_file(&entry) {
            notes.push(parser::parse_file(entry.path())?);
        }
    }

    notes.sort_by_key(|note| note.sequence_number);
    Ok(notes)
}

/// The sequence number for a new note: one more than the highest existing
/// number, counting hidden and private notes, or `0` for an empty directory.
pub fn next_sequence_number(source_directory: &Path) -> Result<u64> {
    Ok(all_notes(source_directory)?
        .iter()
        .map(|note| note.sequence_number + 1)
        .max()
        .unwrap_or(0))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_source_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .file_name()
            .to_string_lossy()
            .ends_with(MARKDOWN_EXTENSION)
}

/// Represents the result of a listing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error listing notes.
#[derive(Debug)]
pub enum Error {
    /// Returned when a source file can't be parsed.
    Parse(ParseError),

    /// Returned for I/O errors walking the source directory.
    WalkDir(walkdir::Error),
}

impl Error {
    /// See [`ParseError::is_fatal`].
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Parse(err) => err.is_fatal(),
            Error::WalkDir(_) => false,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(err) => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator while walking the source directory.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
