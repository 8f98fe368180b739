//! Support for creating Atom and RSS feeds from a list of notes. Feeds are
//! always public: only [`Visibility::Published`] notes are syndicated, no
//! matter whether private notes were rendered.

use crate::config::Author;
use crate::note::{Note, Visibility};
use atom_syndication::{Content, Entry, Error as AtomError, Feed, Link, Person, Text};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use std::fmt;
use std::io::Write;
use url::Url;

/// Bundled configuration for creating a feed.
pub struct FeedConfig<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub author: Option<&'a Author>,

    /// The site's base URL. Must end in a slash; entry links are
    /// `{base_url}{base_name}.html`.
    pub base_url: &'a Url,
}

/// One syndicated note.
struct FeedEntry<'a> {
    note: &'a Note,
    link: Url,
    date: DateTime<FixedOffset>,
}

/// Selects the published notes from `notes` (in ascending sequence order)
/// and returns them most recent first.
fn entries<'a>(config: &FeedConfig, notes: &'a [Note]) -> Result<Vec<FeedEntry<'a>>> {
    notes
        .iter()
        .rev()
        .filter(|note| note.visibility == Visibility::Published)
        .map(|note| -> Result<FeedEntry<'a>> {
            Ok(FeedEntry {
                note,
                link: config.base_url.join(&note.output_file_name())?,
                date: midnight_utc(note),
            })
        })
        .collect()
}

// Feed dates need a time and an offset; notes only have a calendar date, so
// use midnight UTC. Undated notes fall back to the Unix epoch.
fn midnight_utc(note: &Note) -> DateTime<FixedOffset> {
    utc(note
        .date
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default())
}

fn utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    DateTime::<FixedOffset>::from(Utc.from_utc_datetime(&naive))
}

/// The newest entry date, used as the feed's own timestamp so that rebuilding
/// unchanged sources produces identical feeds.
fn updated(entries: &[FeedEntry]) -> DateTime<FixedOffset> {
    entries
        .iter()
        .map(|entry| entry.date)
        .max()
        .unwrap_or_else(|| utc(NaiveDateTime::default()))
}

/// Creates an Atom feed from `config` and `notes` and writes the result to a
/// [`std::io::Write`].
pub fn write_atom<W: Write>(config: &FeedConfig, notes: &[Note], w: W) -> Result<()> {
    atom_feed(config, notes)?.write_to(w)?.flush()?;
    Ok(())
}

/// Creates an RSS 2.0 feed from `config` and `notes` and writes the result
/// to a [`std::io::Write`].
pub fn write_rss<W: Write>(config: &FeedConfig, notes: &[Note], w: W) -> Result<()> {
    rss_channel(config, notes)?.write_to(w)?.flush()?;
    Ok(())
}

fn atom_feed(config: &FeedConfig, notes: &[Note]) -> Result<Feed> {
    let entries = entries(config, notes)?;

    let mut feed = Feed::default();
    feed.set_title(Text::plain(config.title));
    feed.set_id(config.base_url.to_string());
    feed.set_updated(updated(&entries));
    feed.set_authors(author_to_people(config.author));
    feed.set_subtitle(Some(Text::plain(config.description)));
    feed.set_links(vec![alternate(config.base_url.as_str())]);
    feed.set_entries(
        entries
            .iter()
            .map(|entry| atom_entry(config, entry))
            .collect::<Vec<Entry>>(),
    );
    Ok(feed)
}

fn atom_entry(config: &FeedConfig, entry: &FeedEntry) -> Entry {
    let mut content = Content::default();
    content.set_content_type(Some("html".to_owned()));
    content.set_value(Some(entry.note.html.clone()));

    let mut atom_entry = Entry::default();
    atom_entry.set_id(entry.link.to_string());
    atom_entry.set_title(Text::plain(entry.note.title.as_str()));
    atom_entry.set_updated(entry.date);
    atom_entry.set_published(Some(entry.date));
    atom_entry.set_authors(author_to_people(config.author));
    atom_entry.set_links(vec![alternate(entry.link.as_str())]);
    atom_entry.set_content(Some(content));
    atom_entry
}

fn alternate(href: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel("alternate");
    link
}

fn author_to_people(author: Option<&Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name.as_str());
            person.set_email(author.email.clone());
            vec![person]
        }
        None => Vec::new(),
    }
}

fn rss_channel(config: &FeedConfig, notes: &[Note]) -> Result<rss::Channel> {
    let author = config.author.map(|author| match &author.email {
        Some(email) => format!("{} ({})", email, author.name),
        None => author.name.clone(),
    });

    let items = entries(config, notes)?
        .iter()
        .map(|entry| rss::Item {
            title: Some(entry.note.title.clone()),
            link: Some(entry.link.to_string()),
            description: Some(entry.note.title.clone()),
            author: author.clone(),
            guid: Some(rss::Guid {
                value: entry.link.to_string(),
                permalink: true,
            }),
            pub_date: Some(entry.date.to_rfc2822()),
            content: Some(entry.note.html.clone()),
            ..Default::default()
        })
        .collect();

    Ok(rss::Channel {
        title: config.title.to_owned(),
        link: config.base_url.to_string(),
        description: config.description.to_owned(),
        items,
        ..Default::default()
    })
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed. Variants inlude I/O, Atom, RSS and
/// URL issues.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    Io(std::io::Error),

    /// Returned when there is an Atom-related error.
    Atom(AtomError),

    /// Returned when there is an RSS-related error.
    Rss(rss::Error),

    /// Returned when an entry link can't be built from the base URL.
    UrlParse(url::ParseError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Atom(err) => err.fmt(f),
            Error::Rss(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Atom(err) => Some(err),
            Error::Rss(err) => Some(err),
            Error::UrlParse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator in fallible feed operations.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

impl From<rss::Error> for Error {
    fn from(err: rss::Error) -> Error {
        Error::Rss(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse;
    use std::path::Path;

    fn notes() -> Vec<Note> {
        vec![
            parse(
                Path::new("0001-old.md"),
                "title: Old\ndate: 01 Jan 2023\nvisibility: published\n---\nold body",
            )
            .unwrap(),
            parse(
                Path::new("0002-secret.md"),
                "title: Secret\ndate: 01 Jan 2024\nvisibility: private\n---\nsecret body",
            )
            .unwrap(),
            parse(
                Path::new("0003-new.md"),
                "title: New\ndate: 15 Mar 2024\nvisibility: published\n---\n# New body",
            )
            .unwrap(),
        ]
    }

    fn render(f: impl Fn(&FeedConfig, &[Note], &mut Vec<u8>) -> Result<()>) -> String {
        let base_url = Url::parse("https://example.com/notes/").unwrap();
        let author = Author {
            name: String::from("Jane"),
            email: None,
        };
        let config = FeedConfig {
            title: "kb",
            description: "notes",
            author: Some(&author),
            base_url: &base_url,
        };
        let mut out = Vec::new();
        f(&config, &notes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_atom_contains_only_published_notes() {
        let atom = render(|c, n, w| write_atom(c, n, w));
        assert!(atom.contains(">Old</title>"));
        assert!(atom.contains(">New</title>"));
        assert!(!atom.contains("Secret"));
        assert!(atom.contains("https://example.com/notes/0003-new.html"));
        assert!(atom.contains("<name>Jane</name>"));
    }

    #[test]
    fn test_atom_is_most_recent_first_and_dated_by_newest_note() {
        let atom = render(|c, n, w| write_atom(c, n, w));
        assert!(atom.find(">New</title>").unwrap() < atom.find(">Old</title>").unwrap());
        assert!(atom.contains("<updated>2024-03-15T00:00:00+00:00</updated>"));
    }

    #[test]
    fn test_rss_contains_only_published_notes() {
        let rss = render(|c, n, w| write_rss(c, n, w));
        assert!(rss.contains("<title>Old</title>"));
        assert!(rss.contains("<title>New</title>"));
        assert!(!rss.contains("Secret"));
        assert!(rss.contains("<link>https://example.com/notes/0001-old.html</link>"));
    }

    #[test]
    fn test_feeds_are_deterministic() {
        assert_eq!(
            render(|c, n, w| write_atom(c, n, w)),
            render(|c, n, w| write_atom(c, n, w))
        );
        assert_eq!(
            render(|c, n, w| write_rss(c, n, w)),
            render(|c, n, w| write_rss(c, n, w))
        );
    }

    #[test]
    fn test_empty_feed() {
        let base_url = Url::parse("https://example.com/").unwrap();
        let config = FeedConfig {
            title: "kb",
            description: "",
            author: None,
            base_url: &base_url,
        };
        let mut out = Vec::new();
        write_atom(&config, &[], &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("1970-01-01T00:00:00+00:00"));
    }
}
