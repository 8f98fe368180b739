//! Assembles complete HTML documents from notes. Every page, the home page
//! included, goes through the same template: the home page is rendered from a
//! synthetic index [`Note`] whose body is the list of notes.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use gtmpl::{Context, Template};
use gtmpl_value::Value;

use crate::note::Note;
use crate::value::escape;

/// The page template shipped with the binary.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/page.html");

/// The introduction shown on the home page when none is configured.
pub const DEFAULT_INTRO: &str = "<p>Notes, mostly to myself.</p>";

/// Renders notes and the index through a page template.
pub struct Assembler {
    template: Template,

    site_name: String,

    /// HTML shown on the home page in place of a note heading.
    intro: String,
}

impl Assembler {
    /// Constructs an [`Assembler`] from template source text.
    pub fn new(template: &str, site_name: &str, intro: &str) -> Result<Assembler> {
        let mut parsed = Template::default();
        parsed
            .parse(template)
            .map_err(|e| Error::ParseTemplate(e.to_string()))?;
        Ok(Assembler {
            template: parsed,
            site_name: site_name.to_owned(),
            intro: intro.to_owned(),
        })
    }

    /// Constructs an [`Assembler`] from the template file at `path`, or from
    /// [`DEFAULT_TEMPLATE`] when `path` is `None`.
    pub fn load(path: Option<&Path>, site_name: &str, intro: &str) -> Result<Assembler> {
        match path {
            None => Assembler::new(DEFAULT_TEMPLATE, site_name, intro),
            Some(path) => {
                use std::io::Read;
                let mut contents = String::new();
                File::open(path)
                    .and_then(|mut file| file.read_to_string(&mut contents))
                    .map_err(|err| Error::OpenTemplateFile {
                        path: path.to_owned(),
                        err,
                    })?;
                Assembler::new(&contents, site_name, intro)
            }
        }
    }

    /// Renders the page for a single note.
    pub fn render_note(&self, note: &Note) -> Result<String> {
        let mut value = Value::from(note);
        if let Value::Object(obj) = &mut value {
            obj.insert(
                "site_name".to_owned(),
                Value::String(escape(&self.site_name)),
            );
            obj.insert("intro".to_owned(), Value::String(self.intro.clone()));
        }

        let context = Context::from(value).map_err(|e| Error::Template(e.to_string()))?;
        let mut out: Vec<u8> = Vec::new();
        self.template
            .execute(&mut out, &context)
            .map_err(|e| Error::Template(e.to_string()))?;
        String::from_utf8(out).map_err(|e| Error::Template(e.to_string()))
    }

    /// Renders the home page listing `notes`, which must be in ascending
    /// sequence order; they are listed most recent first.
    pub fn render_index(&self, notes: &[Note]) -> Result<String> {
        let index = Note::index(&self.site_name, index_fragment(notes));
        self.render_note(&index)
    }
}

/// Builds the `<ul>` of links for the home page, in descending sequence
/// order.
pub fn index_fragment(notes: &[Note]) -> String {
    let mut html = String::from("<ul class=\"notes\">\n");
    for note in notes.iter().rev() {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a> <span class=\"date\">{}</span></li>\n",
            escape(&note.output_file_name()),
            escape(&note.title),
            note.formatted_date(),
        ));
    }
    html.push_str("</ul>\n");
    html
}

/// The result of a fallible page-assembly operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error assembling a page.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while opening the template file.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing the template.
    ParseTemplate(String),

    /// Returned for errors executing the template.
    Template(String),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate(err) => write!(f, "Parsing template: {}", err),
            Error::Template(err) => write!(f, "Rendering template: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::Template(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse;

    fn note(file_name: &str, source: &str) -> Note {
        parse(Path::new(file_name), source).unwrap()
    }

    fn assembler() -> Assembler {
        Assembler::new(DEFAULT_TEMPLATE, "My <Notes>", "<p>Welcome!</p>").unwrap()
    }

    #[test]
    fn test_render_note() -> Result<()> {
        let page = assembler().render_note(&note(
            "0001-hello.md",
            "title: Hello & bye\ndate: 01 Jan 2024\nvisibility: published\n---\n# Hi\n",
        ))?;
        assert!(page.contains("<h1 class=\"title\">Hello &amp; bye</h1>"));
        assert!(page.contains("01 Jan 2024"));
        assert!(page.contains("Hi</h1>"));
        assert!(page.contains("My &lt;Notes&gt;"));
        assert!(!page.contains("Welcome!"));
        Ok(())
    }

    #[test]
    fn test_render_note_without_date() -> Result<()> {
        let page = assembler().render_note(&note(
            "0001-hello.md",
            "title: Undated\nvisibility: published\n---\nbody\n",
        ))?;
        assert!(!page.contains("class=\"date\""));
        Ok(())
    }

    #[test]
    fn test_render_index_lists_most_recent_first() -> Result<()> {
        let notes = vec![
            note("0001-one.md", "title: One\n---\n"),
            note("0002-two.md", "title: Two\n---\n"),
            note("0003-three.md", "title: Three\n---\n"),
        ];
        let page = assembler().render_index(&notes)?;

        let three = page.find("0003-three.html").unwrap();
        let two = page.find("0002-two.html").unwrap();
        let one = page.find("0001-one.html").unwrap();
        assert!(three < two && two < one);
        assert!(page.contains("Welcome!"));
        assert!(!page.contains("<h1 class=\"title\">"));
        Ok(())
    }

    #[test]
    fn test_index_fragment() {
        let notes = vec![note(
            "0001-a.md",
            "title: <A>\ndate: 02 Feb 2022\n---\n",
        )];
        assert_eq!(
            index_fragment(&notes),
            "<ul class=\"notes\">\n<li><a href=\"0001-a.html\">&lt;A&gt;</a> \
             <span class=\"date\">02 Feb 2022</span></li>\n</ul>\n"
        );
    }

    #[test]
    fn test_custom_template() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "[{{.title}}]{{.content}}").unwrap();

        let assembler = Assembler::load(Some(&path), "kb", "")?;
        let page = assembler.render_note(&note("0001-a.md", "title: A\n---\nx"))?;
        assert!(page.starts_with("[A]<p>x</p>"));
        Ok(())
    }

    #[test]
    fn test_missing_template_file() {
        let err = Assembler::load(Some(Path::new("/nonexistent/page.html")), "kb", "")
            .err()
            .unwrap();
        assert!(matches!(err, Error::OpenTemplateFile { .. }));
    }
}
