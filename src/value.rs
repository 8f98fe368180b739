//! Conversions from notes into template [`Value`]s.

use crate::note::{Note, Visibility};
use gtmpl_value::Value;
use pulldown_cmark::escape::escape_html;
use std::collections::HashMap;

impl From<&Note> for Value {
    /// Converts a [`Note`] into a [`Value::Object`] with the fields `title`,
    /// `date`, `visibility`, `content` and `is_index`. The title is
    /// HTML-escaped; `content` is the note's already-sanitized HTML.
    fn from(note: &Note) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(escape(&note.title)));
        m.insert("date".to_owned(), Value::String(note.formatted_date()));
        m.insert("visibility".to_owned(), note.visibility.into());
        m.insert("content".to_owned(), Value::String(note.html.clone()));
        m.insert("is_index".to_owned(), Value::Bool(note.is_index));
        Value::Object(m)
    }
}

impl From<Visibility> for Value {
    fn from(visibility: Visibility) -> Value {
        Value::String(visibility.as_str().to_owned())
    }
}

/// Escapes text for inclusion in an HTML document.
pub fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    let _ = escape_html(&mut escaped, s);
    escaped
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_note_to_value_escapes_title() {
        let note = Note {
            path: PathBuf::from("0001-a.md"),
            base_name: String::from("0001-a"),
            sequence_number: 1,
            title: String::from("<b>bold</b> & brave"),
            date: None,
            visibility: Visibility::Private,
            markdown: String::new(),
            html: String::from("<p>hi</p>"),
            is_index: false,
        };

        match Value::from(&note) {
            Value::Object(m) => {
                assert!(matches!(
                    m.get("title"),
                    Some(Value::String(s)) if s == "&lt;b&gt;bold&lt;/b&gt; &amp; brave"
                ));
                assert!(matches!(m.get("date"), Some(Value::String(s)) if s.is_empty()));
                assert!(matches!(m.get("visibility"), Some(Value::String(s)) if s == "private"));
                assert!(matches!(m.get("content"), Some(Value::String(s)) if s == "<p>hi</p>"));
                assert!(matches!(m.get("is_index"), Some(Value::Bool(false))));
            }
            _ => panic!("expected an object"),
        }
    }
}
