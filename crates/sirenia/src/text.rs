//! Prose-building helpers shared by every synthesizer.
//!
//! The short description exists in two variants (plain and HTML-annotated).
//! Both render from one span list so they cannot diverge in content, only in
//! markup.

use htmlize::escape_text;

#[derive(Debug, Clone, PartialEq)]
pub enum Span {
    Text(String),
    /// Rendered as `<em>…</em>` in the HTML variant.
    Emph(String),
    /// Rendered as `<strong>…</strong>` in the HTML variant.
    Strong(String),
}

#[derive(Debug, Clone, Default)]
pub struct ShortText {
    spans: Vec<Span>,
}

impl ShortText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, s: impl Into<String>) -> Self {
        self.spans.push(Span::Text(s.into()));
        self
    }

    pub fn emph(mut self, s: impl Into<String>) -> Self {
        self.spans.push(Span::Emph(s.into()));
        self
    }

    pub fn strong(mut self, s: impl Into<String>) -> Self {
        self.spans.push(Span::Strong(s.into()));
        self
    }

    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            match span {
                Span::Text(s) | Span::Emph(s) | Span::Strong(s) => out.push_str(s),
            }
        }
        out
    }

    pub fn render_html(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            match span {
                Span::Text(s) => out.push_str(&escape_html(s)),
                Span::Emph(s) => {
                    out.push_str("<em>");
                    out.push_str(&escape_html(s));
                    out.push_str("</em>");
                }
                Span::Strong(s) => {
                    out.push_str("<strong>");
                    out.push_str(&escape_html(s));
                    out.push_str("</strong>");
                }
            }
        }
        out
    }
}

pub fn escape_html(s: &str) -> String {
    escape_text(s).into_owned()
}

/// Numbers 0–9 are spelled as words in prose, 10 and above as numerals.
pub fn number_word(n: usize) -> String {
    match n {
        0 => "zero".to_string(),
        1 => "one".to_string(),
        2 => "two".to_string(),
        3 => "three".to_string(),
        4 => "four".to_string(),
        5 => "five".to_string(),
        6 => "six".to_string(),
        7 => "seven".to_string(),
        8 => "eight".to_string(),
        9 => "nine".to_string(),
        other => other.to_string(),
    }
}

/// "one step", "two steps", "three branches", "12 steps".
pub fn count_phrase(n: usize, singular: &str) -> String {
    if n == 1 {
        format!("one {singular}")
    } else {
        format!("{} {}", number_word(n), pluralize(singular))
    }
}

fn pluralize(singular: &str) -> String {
    if singular.ends_with("ch")
        || singular.ends_with("sh")
        || singular.ends_with('s')
        || singular.ends_with('x')
    {
        format!("{singular}es")
    } else {
        format!("{singular}s")
    }
}

/// "A", "A and B", "A, B and C".
pub fn join_with_and(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [head @ .., last] => format!("{} and {}", head.join(", "), last),
    }
}

/// Joins feature tags into the trailing qualitative sentence of a short
/// description ("Includes conditional branches and explanatory notes.").
pub fn feature_sentence(features: &[&str]) -> Option<String> {
    if features.is_empty() {
        return None;
    }
    let owned: Vec<String> = features.iter().map(|s| s.to_string()).collect();
    Some(format!(" Includes {}.", join_with_and(&owned)))
}
