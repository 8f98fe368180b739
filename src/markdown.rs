//! Converts note bodies from markdown to sanitized HTML.
//!
//! Rendering happens in two passes. First the [`pulldown_cmark`] event stream
//! is rewritten: headings get anchor ids, external links open in a new tab,
//! and bare URLs in text become links. Then the HTML is run through an
//! [`ammonia`] allow-list. The sanitizer always runs; it is the only thing
//! standing between note content and the published site.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use ammonia::Builder;
use once_cell::sync::Lazy;
use pulldown_cmark::escape::escape_href;
use pulldown_cmark::{html, CowStr, Event, LinkType, Options, Parser, Tag};
use regex::Regex;

use crate::value::escape;

const EXTERNAL_LINK_TARGET: &str = "_blank";
const EXTERNAL_LINK_REL: &str = "nofollow noreferrer";

static CODE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new("^language-[a-zA-Z0-9]+$").expect("valid regex"));

static BARE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("valid regex"));

static SANITIZER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder
        .link_rel(None)
        .add_tag_attributes("a", &["target", "rel"])
        .add_tag_attributes("code", &["class"])
        .attribute_filter(|element, attribute, value| match (element, attribute) {
            ("code", "class") if !CODE_CLASS.is_match(value) => None,
            ("a", "target") if value != EXTERNAL_LINK_TARGET => None,
            ("a", "rel") if value != EXTERNAL_LINK_REL => None,
            _ => Some(Cow::Borrowed(value)),
        });
    for heading in &["h1", "h2", "h3", "h4", "h5", "h6"] {
        builder.add_tag_attributes(*heading, &["id"]);
    }
    builder
});

/// Renders `markdown` into a sanitized HTML fragment.
pub fn to_html(markdown: &str) -> String {
    let mut unsafe_html = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut unsafe_html, EventConverter::convert(markdown).into_iter());
    sanitize(&unsafe_html)
}

/// Runs `html` through the allow-list used for note content.
pub fn sanitize(html: &str) -> String {
    SANITIZER.clean(html).to_string()
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options
}

/// Rewrites a markdown event stream. Replaced tags are emitted as raw
/// [`Event::Html`] so the stock [`html::push_html`] can do the rest.
#[derive(Default)]
struct EventConverter {
    /// The last numeric suffix tried for each heading slug.
    suffixes: HashMap<String, usize>,

    /// Every anchor handed out so far.
    anchors: HashSet<String>,

    /// Whether the currently open link was rewritten as an external link.
    external_link: bool,

    /// Nesting depth of links and images, inside which text is left alone.
    link_depth: usize,

    in_code_block: bool,
}

impl EventConverter {
    fn convert(markdown: &str) -> Vec<Event> {
        let events: Vec<Event> = Parser::new_ext(markdown, options()).collect();
        let mut converter = EventConverter::default();
        let mut converted = Vec::with_capacity(events.len());

        for i in 0..events.len() {
            let ev = &events[i];
            match ev {
                Event::Start(Tag::Heading(level, id, _)) => {
                    let anchor = match id {
                        Some(id) => {
                            converter.anchors.insert(id.to_string());
                            id.to_string()
                        }
                        None => converter.anchor(&heading_text(&events[i + 1..])),
                    };
                    converted.push(Event::Html(CowStr::from(format!(
                        r#"<{} id="{}">"#,
                        level,
                        escape(&anchor)
                    ))));
                }
                Event::End(Tag::Heading(level, _, _)) => {
                    converted.push(Event::Html(CowStr::from(format!("</{}>\n", level))));
                }
                Event::Start(Tag::Link(link_type, dest, title))
                    if *link_type != LinkType::Email && is_external(dest) =>
                {
                    converter.external_link = true;
                    converter.link_depth += 1;
                    converted.push(Event::Html(CowStr::from(external_link(dest, title))));
                }
                Event::End(Tag::Link(..)) if converter.external_link => {
                    converter.external_link = false;
                    converter.link_depth -= 1;
                    converted.push(Event::Html(CowStr::Borrowed("</a>")));
                }
                Event::Start(Tag::Link(..)) | Event::Start(Tag::Image(..)) => {
                    converter.link_depth += 1;
                    converted.push(ev.clone());
                }
                Event::End(Tag::Link(..)) | Event::End(Tag::Image(..)) => {
                    converter.link_depth = converter.link_depth.saturating_sub(1);
                    converted.push(ev.clone());
                }
                Event::Start(Tag::CodeBlock(_)) => {
                    converter.in_code_block = true;
                    converted.push(ev.clone());
                }
                Event::End(Tag::CodeBlock(_)) => {
                    converter.in_code_block = false;
                    converted.push(ev.clone());
                }
                Event::Text(text)
                    if converter.link_depth == 0
                        && !converter.in_code_block
                        && BARE_URL.is_match(text) =>
                {
                    converted.extend(autolink(text));
                }
                _ => converted.push(ev.clone()),
            }
        }

        converted
    }

    /// Returns a unique anchor for a heading with the given text.
    fn anchor(&mut self, text: &str) -> String {
        let mut slug = slug::slugify(text);
        if slug.is_empty() {
            slug = String::from("section");
        }
        let mut anchor = slug.clone();
        let suffix = self.suffixes.entry(slug.clone()).or_insert(0);
        while self.anchors.contains(&anchor) {
            *suffix += 1;
            anchor = format!("{}-{}", slug, suffix);
        }
        self.anchors.insert(anchor.clone());
        anchor
    }
}

/// Concatenates the text of the events up to the end of the current heading.
fn heading_text(events: &[Event]) -> String {
    let mut text = String::new();
    for ev in events {
        match ev {
            Event::End(Tag::Heading(..)) => break,
            Event::Text(s) | Event::Code(s) => text.push_str(s),
            _ => {}
        }
    }
    text
}

fn is_external(dest: &str) -> bool {
    dest.starts_with("http://") || dest.starts_with("https://")
}

fn external_link(dest: &str, title: &str) -> String {
    let mut a = String::from(r#"<a href=""#);
    let _ = escape_href(&mut a, dest);
    a.push('"');
    if !title.is_empty() {
        a.push_str(r#" title=""#);
        a.push_str(&escape(title));
        a.push('"');
    }
    a.push_str(&format!(
        r#" target="{}" rel="{}">"#,
        EXTERNAL_LINK_TARGET, EXTERNAL_LINK_REL
    ));
    a
}

/// Splits a text event around bare URLs, linking each URL.
fn autolink<'a>(text: &str) -> Vec<Event<'a>> {
    let mut events = Vec::new();
    let mut last = 0;
    for m in BARE_URL.find_iter(text) {
        let url = m
            .as_str()
            .trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')'));
        let end = m.start() + url.len();
        if m.start() > last {
            events.push(Event::Text(CowStr::from(text[last..m.start()].to_owned())));
        }
        events.push(Event::Html(CowStr::from(external_link(url, ""))));
        events.push(Event::Text(CowStr::from(url.to_owned())));
        events.push(Event::Html(CowStr::Borrowed("</a>")));
        last = end;
    }
    if last < text.len() {
        events.push(Event::Text(CowStr::from(text[last..].to_owned())));
    }
    events
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_heading_anchors() {
        let html = to_html("# Hello World\n\n## Hello World\n\n### `code` here");
        assert!(html.contains(r#"<h1 id="hello-world">Hello World</h1>"#));
        assert!(html.contains(r#"<h2 id="hello-world-1">Hello World</h2>"#));
        assert!(html.contains(r#"<h3 id="code-here">"#));
    }

    #[test]
    fn test_suffixed_anchors_do_not_collide() {
        let html = to_html("# A\n\n# A\n\n# A 1\n\n# A\n");
        assert_eq!(html.matches(r#"id="a""#).count(), 1);
        assert_eq!(html.matches(r#"id="a-1""#).count(), 1);
        assert!(html.contains(r#"<h1 id="a-1-1">A 1</h1>"#));
        assert!(html.contains(r#"<h1 id="a-2">A</h1>"#));
    }

    #[test]
    fn test_script_is_removed() {
        let html = to_html("hello\n\n<script>alert('pwned')</script>\n\nworld");
        assert!(!html.contains("<script"));
        assert!(!html.contains("alert"));
        assert!(html.contains("world"));
    }

    #[test]
    fn test_fenced_code_keeps_language_class() {
        let html = to_html("```python\nprint('hi')\n```\n");
        assert!(html.contains(r#"<code class="language-python">"#));
    }

    #[test]
    fn test_code_class_must_match_language_pattern() {
        let html = to_html(r#"<code class="exec(rm)">x</code>"#);
        assert!(html.contains("<code>x</code>"));
        assert!(!html.contains("exec"));
    }

    #[test]
    fn test_external_links_open_in_new_tab() {
        let html = to_html("[site](https://example.com/a)");
        assert!(html.contains(r#"href="https://example.com/a""#));
        assert!(html.contains(r#"target="_blank""#));
        assert!(html.contains(r#"rel="nofollow noreferrer""#));
    }

    #[test]
    fn test_internal_links_are_untouched() {
        let html = to_html("[next](0002-next.html)");
        assert!(html.contains(r#"<a href="0002-next.html">next</a>"#));
    }

    #[test]
    fn test_bare_urls_are_linked() {
        let html = to_html("see https://example.com/page. thanks");
        assert!(html.contains(r#"<a href="https://example.com/page""#));
        assert!(html.contains(">https://example.com/page</a>. thanks"));
    }

    #[test]
    fn test_urls_in_code_are_not_linked() {
        let html = to_html("```\nhttps://example.com\n```\n");
        assert!(!html.contains("<a "));
    }

    #[test]
    fn test_javascript_urls_are_dropped() {
        let html = to_html("[click](javascript:alert(1))");
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn test_raw_target_attribute_is_restricted() {
        let html = to_html(r#"<a href="x.html" target="evil" rel="opener">x</a>"#);
        assert!(!html.contains("evil"));
        assert!(!html.contains("opener"));
    }

    #[test]
    fn test_tables() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }
}
