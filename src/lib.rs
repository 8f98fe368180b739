//! The library code for the `kb` note-taking tool. Notes are markdown files
//! named `NNNN-slug.md` with a small header block; the tool turns a directory
//! of them into a static site. The architecture can be generally broken down
//! into two distinct steps:
//!
//! 1. Listing and parsing notes from source files on disk ([`crate::list`],
//!    [`crate::parser`])
//! 2. Converting the notes into output files on disk ([`crate::build`])
//!
//! Parsing renders each note's markdown body to sanitized HTML
//! ([`crate::markdown`]) right away, so the second step only assembles pages
//! from the template ([`crate::page`]) and writes the index and the feeds
//! ([`crate::feed`]). Which notes take part is decided by their
//! [`note::Visibility`]: published notes are always rendered and syndicated,
//! private notes are rendered on request but never syndicated, and hidden
//! notes are never rendered.
//!
//! On top of that, [`crate::serve`] rebuilds the site whenever a source
//! changes and serves it over HTTP, and [`crate::new`] creates the next
//! numbered note.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod feed;
pub mod list;
pub mod markdown;
pub mod new;
pub mod note;
pub mod page;
pub mod parser;
pub mod serve;
pub mod value;
