//! Shared line-scanning helpers for keyword statements, comments, and the
//! explicit accessibility directives (`accTitle`, `accDescr`).
//!
//! Directive values take precedence over synthesized text, but the check
//! happens last; synthesizers never look at them.

use crate::error::{Error, Result};
use crate::model::{Description, DiagramModel};
use crate::text::escape_html;

pub(crate) fn starts_with_ci(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

pub(crate) fn split_hash_or_semi(s: &str) -> &str {
    let mut end = s.len();
    for (i, c) in s.char_indices() {
        if c == '#' || c == ';' {
            end = i;
            break;
        }
    }
    &s[..end]
}

/// `<keyword> <rest of line>`, keyword matched case-insensitively and followed
/// by exactly one whitespace character.
pub(crate) fn parse_keyword_arg_one_ws(line: &str, keyword: &str) -> Option<String> {
    let t = line.trim_start();
    if !starts_with_ci(t, keyword) {
        return None;
    }
    let after = &t[keyword.len()..];
    let ws = after.chars().next()?;
    if !ws.is_whitespace() {
        return None;
    }
    let rest = &after[ws.len_utf8()..];
    Some(split_hash_or_semi(rest).trim().to_string())
}

/// Like [`parse_keyword_arg_one_ws`] but also accepts the bare keyword with no
/// argument, returning an empty string for it.
pub(crate) fn keyword_rest(line: &str, keyword: &str) -> Option<String> {
    let t = line.trim();
    if t.eq_ignore_ascii_case(keyword) {
        return Some(String::new());
    }
    parse_keyword_arg_one_ws(line, keyword)
}

/// `<key>: <value>` with trailing `#`/`;` suffixes stripped.
pub(crate) fn parse_key_colon_value(line: &str, key: &str) -> Option<String> {
    let t = line.trim_start();
    if !starts_with_ci(t, key) {
        return None;
    }
    let rest = t[key.len()..].trim_start();
    let rest = rest.strip_prefix(':')?;
    Some(split_hash_or_semi(rest).trim().to_string())
}

/// Multi-line `accDescr { … }` form. On match, advances `*index` to the last
/// consumed line. An unterminated block is a malformed directive.
pub(crate) fn parse_acc_descr_block(lines: &[&str], index: &mut usize) -> Result<Option<String>> {
    let t = lines[*index].trim_start();
    if !starts_with_ci(t, "accDescr") {
        return Ok(None);
    }
    let rest = t["accDescr".len()..].trim_start();
    let Some(rest) = rest.strip_prefix('{') else {
        return Ok(None);
    };

    let mut buf = String::new();
    if let Some(end) = rest.find('}') {
        buf.push_str(&rest[..end]);
        return Ok(Some(buf.trim().to_string()));
    }
    buf.push_str(rest);
    buf.push('\n');

    let mut i = *index + 1;
    while i < lines.len() {
        let line = lines[i];
        if let Some(end) = line.find('}') {
            buf.push_str(&line[..end]);
            *index = i;
            return Ok(Some(buf.trim().to_string()));
        }
        buf.push_str(line);
        buf.push('\n');
        i += 1;
    }

    Err(Error::MalformedDirective {
        directive: "accDescr".to_string(),
        message: "unterminated block".to_string(),
    })
}

/// Whole-line `%%` comment. `%%{ … }%%` init blocks count as comments too but
/// carry no narratable text.
pub(crate) fn is_comment_line(line: &str) -> bool {
    line.trim_start().starts_with("%%")
}

/// Narratable text of a comment line, `None` for init blocks and empty
/// comments.
pub(crate) fn comment_text(line: &str) -> Option<&str> {
    let t = line.trim_start().strip_prefix("%%")?;
    if t.starts_with('{') {
        return None;
    }
    let t = t.trim();
    if t.is_empty() { None } else { Some(t) }
}

/// Applies explicit directives on top of synthesized text: an explicit title
/// replaces the short description verbatim, an explicit long-form description
/// replaces the detailed narrative.
pub(crate) fn apply_directive_overrides(
    model: &DiagramModel,
    mut description: Description,
) -> Description {
    if let Some(title) = model.acc_title.as_deref() {
        if !title.is_empty() {
            description.short = title.to_string();
            description.short_html = escape_html(title);
        }
    }
    if let Some(descr) = model.acc_descr.as_deref() {
        if !descr.is_empty() {
            description.detailed = format!("<p>{}</p>", escape_html(descr));
        }
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_arg_requires_one_whitespace() {
        assert_eq!(
            parse_keyword_arg_one_ws("title My flow", "title").as_deref(),
            Some("My flow")
        );
        assert_eq!(parse_keyword_arg_one_ws("titleMy flow", "title"), None);
        assert_eq!(
            parse_keyword_arg_one_ws("  TITLE spaced", "title").as_deref(),
            Some("spaced")
        );
    }

    #[test]
    fn key_colon_value_strips_statement_suffix() {
        assert_eq!(
            parse_key_colon_value("accTitle: Checkout flow ; rest", "accTitle").as_deref(),
            Some("Checkout flow")
        );
        assert_eq!(
            parse_key_colon_value("accDescr: longer text # comment", "accDescr").as_deref(),
            Some("longer text")
        );
        assert_eq!(parse_key_colon_value("accTitle Checkout", "accTitle"), None);
    }

    #[test]
    fn acc_descr_block_single_and_multi_line() {
        let lines = vec!["accDescr { all inline }"];
        let mut i = 0;
        assert_eq!(
            parse_acc_descr_block(&lines, &mut i).unwrap().as_deref(),
            Some("all inline")
        );
        assert_eq!(i, 0);

        let lines = vec!["accDescr {", "  first", "  second", "}"];
        let mut i = 0;
        assert_eq!(
            parse_acc_descr_block(&lines, &mut i).unwrap().as_deref(),
            Some("first\n  second")
        );
        assert_eq!(i, 3);
    }

    #[test]
    fn acc_descr_block_unterminated_is_malformed() {
        let lines = vec!["accDescr {", "never closed"];
        let mut i = 0;
        assert!(parse_acc_descr_block(&lines, &mut i).is_err());
    }

    #[test]
    fn comment_text_skips_init_blocks() {
        assert!(is_comment_line("%% plain comment"));
        assert!(is_comment_line("  %%{init: {}}%%"));
        assert_eq!(comment_text("%% check the retry logic"), Some("check the retry logic"));
        assert_eq!(comment_text("%%{init: {}}%%"), None);
        assert_eq!(comment_text("%%"), None);
        assert_eq!(comment_text("A --> B"), None);
    }

    #[test]
    fn overrides_replace_short_and_detailed_respectively() {
        let mut model = DiagramModel::new("flowchart");
        model.acc_title = Some("Order & refund flow".to_string());
        model.acc_descr = Some("Steps a refund takes.".to_string());

        let synthesized = Description {
            short: "Flowchart with three steps.".to_string(),
            short_html: "Flowchart with <strong>three steps</strong>.".to_string(),
            detailed: "<h3>Overview</h3>".to_string(),
        };
        let overridden = apply_directive_overrides(&model, synthesized);

        assert_eq!(overridden.short, "Order & refund flow");
        assert_eq!(overridden.short_html, "Order &amp; refund flow");
        assert_eq!(overridden.detailed, "<p>Steps a refund takes.</p>");
    }
}
