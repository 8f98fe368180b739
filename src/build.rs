//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: listing the notes
//! ([`crate::list`]), rendering note and index pages ([`crate::page`]), and
//! generating the feeds ([`crate::feed`]).
//!
//! Every build is a full regeneration. The output directory is deleted and
//! recreated, so nothing from a previous build survives a visibility or
//! content change.

use crate::config::Config;
use crate::feed::{write_atom, write_rss, Error as FeedError};
use crate::list::{list_notes, Error as ListError};
use crate::page::{Assembler, Error as PageError};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const INDEX_FILE: &str = "index.html";
pub const ATOM_FILE: &str = "atom.xml";
pub const RSS_FILE: &str = "rss.xml";

/// Builds the site described by a [`Config`]: note pages, then the index,
/// then the feeds. Sources are listed before the output directory is
/// cleaned, so a note that fails to parse leaves the previous output intact.
/// Any other failure leaves a partially written output directory; callers
/// retry by building again.
pub fn build_site(config: &Config) -> Result<()> {
    let start = Instant::now();

    let assembler = Assembler::load(
        config.page_template.as_deref(),
        &config.site_name,
        &config.intro,
    )?;
    let notes = list_notes(&config.source_directory, config.include_private)?;
    tracing::info!(
        "Found {} note(s) in {}",
        notes.len(),
        config.source_directory.display()
    );

    let output = &config.output_directory;
    rmdir(output)?;
    std::fs::create_dir_all(output).map_err(|err| Error::Write {
        path: output.to_owned(),
        err,
    })?;

    for note in &notes {
        tracing::debug!("Rendering {}", note.path.display());
        let html = assembler.render_note(note)?;
        write(&output.join(note.output_file_name()), html.as_bytes())?;
    }

    let index = assembler.render_index(&notes)?;
    write(&output.join(INDEX_FILE), index.as_bytes())?;

    let feed_config = config.feed_config();
    write_atom(&feed_config, &notes, BufWriter::new(create(&output.join(ATOM_FILE))?))?;
    write_rss(&feed_config, &notes, BufWriter::new(create(&output.join(RSS_FILE))?))?;

    tracing::info!(
        "Built {} in {:?}",
        output.display(),
        start.elapsed()
    );
    Ok(())
}

fn write(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents).map_err(|err| Error::Write {
        path: path.to_owned(),
        err,
    })
}

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|err| Error::Write {
        path: path.to_owned(),
        err,
    })
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during listing,
/// rendering, cleaning the output directory, writing pages, and writing the
/// feeds.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors listing or parsing notes.
    List(ListError),

    /// Returned for errors loading the template or rendering pages.
    Page(PageError),

    /// Returned for errors writing the feeds.
    Feed(FeedError),

    /// Returned for I/O problems while cleaning the output directory.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while writing an output file.
    Write { path: PathBuf, err: std::io::Error },
}

impl Error {
    /// Reports whether the source directory is corrupt. See
    /// [`crate::parser::Error::is_fatal`].
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::List(err) => err.is_fatal(),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::List(err) => err.fmt(f),
            Error::Page(err) => err.fmt(f),
            Error::Feed(err) => write!(f, "Writing feed: {}", err),
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::Write { path, err } => {
                write!(f, "Writing '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::List(err) => Some(err),
            Error::Page(err) => Some(err),
            Error::Feed(err) => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::Write { path: _, err } => Some(err),
        }
    }
}

impl From<ListError> for Error {
    /// Converts [`ListError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: ListError) -> Error {
        Error::List(err)
    }
}

impl From<PageError> for Error {
    /// Converts [`PageError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: PageError) -> Error {
        Error::Page(err)
    }
}

impl From<FeedError> for Error {
    /// Converts [`FeedError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: FeedError) -> Error {
        Error::Feed(err)
    }
}
