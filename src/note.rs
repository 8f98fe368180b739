//! Defines the [`Note`] type along with its [`Visibility`] and the
//! serializable [`Header`]. Notes are produced by [`crate::parser`] and are
//! never mutated after parsing; every listing rebuilds them from disk.

use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The textual format of the `date` header, e.g. `01 Jan 2024`.
pub const DATE_FORMAT: &str = "%d %b %Y";

/// The extension of note source files.
pub const MARKDOWN_EXTENSION: &str = ".md";

/// The extension of rendered note pages.
pub const HTML_EXTENSION: &str = ".html";

/// Controls whether a note is rendered, listed, and syndicated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    /// Rendered, listed on the index, and included in the feeds.
    Published,

    /// Rendered and listed only when private content is requested. Never
    /// included in the feeds.
    Private,

    /// Never rendered or listed.
    Hidden,
}

impl Visibility {
    /// Interprets a `visibility` header value. Anything other than
    /// `published` or `private` is treated as [`Visibility::Hidden`].
    pub fn from_header(value: &str) -> Visibility {
        match value {
            "published" => Visibility::Published,
            "private" => Visibility::Private,
            _ => Visibility::Hidden,
        }
    }

    /// Reports whether a note with this visibility belongs in a listing.
    pub fn is_listed(self, include_private: bool) -> bool {
        match self {
            Visibility::Published => true,
            Visibility::Private => include_private,
            Visibility::Hidden => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Published => "published",
            Visibility::Private => "private",
            Visibility::Hidden => "hidden",
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Hidden
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    /// Strict parsing for user input (e.g. command-line flags). Header
    /// parsing goes through [`Visibility::from_header`] instead, which never
    /// fails.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published" => Ok(Visibility::Published),
            "private" => Ok(Visibility::Private),
            "hidden" => Ok(Visibility::Hidden),
            _ => Err(format!(
                "unknown visibility `{}` (expected published, private or hidden)",
                s
            )),
        }
    }
}

/// The recognized front-matter fields of a note.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub visibility: Visibility,
}

impl fmt::Display for Header {
    /// Writes the header block, including the terminating `---` fence, in the
    /// format [`crate::parser::parse`] accepts.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "title: {}", self.title)?;
        if let Some(date) = self.date {
            writeln!(f, "date: {}", date.format(DATE_FORMAT))?;
        }
        writeln!(f, "visibility: {}", self.visibility)?;
        writeln!(f, "---")
    }
}

/// A single parsed source file.
#[derive(Clone, Debug)]
pub struct Note {
    /// Location of the source file.
    pub path: PathBuf,

    /// The source file name without its directory and extension. Also the
    /// stem of the output file name.
    pub base_name: String,

    /// The numeric prefix of the file name (`0007-foo.md` is 7).
    pub sequence_number: u64,

    pub title: String,

    /// `None` when the header omits the date and for the synthetic index
    /// note.
    pub date: Option<NaiveDate>,

    pub visibility: Visibility,

    /// The raw markdown following the header delimiter.
    pub markdown: String,

    /// Sanitized HTML rendered from `markdown` when the note was parsed.
    pub html: String,

    /// Set only on the synthetic note the page assembler builds for the home
    /// page.
    pub is_index: bool,
}

impl Note {
    /// Builds the synthetic note used to render the home page through the
    /// regular page template.
    pub fn index(title: &str, html: String) -> Note {
        Note {
            path: PathBuf::new(),
            base_name: String::from("index"),
            sequence_number: 0,
            title: title.to_owned(),
            date: None,
            visibility: Visibility::Published,
            markdown: String::new(),
            html,
            is_index: true,
        }
    }

    /// The name of the page rendered for this note, `{base_name}.html`.
    pub fn output_file_name(&self) -> String {
        format!("{}{}", self.base_name, HTML_EXTENSION)
    }

    /// The date formatted with [`DATE_FORMAT`], or an empty string.
    pub fn formatted_date(&self) -> String {
        match self.date {
            Some(date) => date.format(DATE_FORMAT).to_string(),
            None => String::new(),
        }
    }

    pub fn header(&self) -> Header {
        Header {
            title: self.title.clone(),
            date: self.date,
            visibility: self.visibility,
        }
    }
}
