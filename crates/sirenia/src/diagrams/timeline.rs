//! Timeline parsing + description. Periods are narrated chronologically in
//! source order; a simple linearization compared to the flowchart traversal.

use crate::directive::{
    is_comment_line, parse_acc_descr_block, parse_key_colon_value, parse_keyword_arg_one_ws,
};
use crate::model::{DiagramModel, Section, SectionStep};
use crate::text::{ShortText, count_phrase, escape_html, join_with_and};

/// Splits `: event1 : event2` into events. Boundaries are colons followed by
/// whitespace, so URLs inside an event survive. Tolerant: malformed input
/// yields fewer events, never an error.
fn split_events(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut s = input.trim_start();
    while let Some(rest) = s.strip_prefix(':') {
        let rest = rest.trim_start();
        let mut boundary = None;
        for (i, ch) in rest.char_indices() {
            if ch == ':' && rest[i + 1..].chars().next().is_some_and(char::is_whitespace) {
                boundary = Some(i);
                break;
            }
        }
        match boundary {
            Some(i) => {
                out.push(rest[..i].trim().to_string());
                s = &rest[i..];
            }
            None => {
                out.push(rest.trim().to_string());
                break;
            }
        }
    }
    out.retain(|e| !e.is_empty());
    out
}

fn current_section<'a>(model: &'a mut DiagramModel) -> &'a mut Section {
    if model.sections.is_empty() {
        model.sections.push(Section {
            name: String::new(),
            steps: Vec::new(),
        });
    }
    model.sections.last_mut().expect("non-empty sections")
}

pub fn parse_timeline(code: &str) -> DiagramModel {
    let mut model = DiagramModel::new("timeline");

    let lines: Vec<&str> = code.lines().collect();
    let mut i = 0usize;
    while i < lines.len() {
        let t = lines[i].trim();
        if t.is_empty() || is_comment_line(t) || t.starts_with('#') {
            i += 1;
            continue;
        }

        if t.eq_ignore_ascii_case("timeline") {
            i += 1;
            continue;
        }
        if let Some(v) = parse_key_colon_value(t, "accTitle") {
            model.acc_title = Some(v);
            i += 1;
            continue;
        }
        if let Some(v) = parse_key_colon_value(t, "accDescr") {
            model.acc_descr = Some(v);
            i += 1;
            continue;
        }
        match parse_acc_descr_block(&lines, &mut i) {
            Ok(Some(v)) => {
                model.acc_descr = Some(v);
                i += 1;
                continue;
            }
            Err(err) => {
                tracing::debug!(%err, "dropping malformed accDescr block");
                break;
            }
            Ok(None) => {}
        }
        if let Some(v) = parse_keyword_arg_one_ws(t, "title") {
            model.title = Some(v);
            i += 1;
            continue;
        }
        if let Some(v) = parse_keyword_arg_one_ws(t, "section") {
            let name = v.split(':').next().unwrap_or("").trim().to_string();
            model.sections.push(Section {
                name,
                steps: Vec::new(),
            });
            i += 1;
            continue;
        }

        // Continuation line: events for the previous period.
        if t.starts_with(':') {
            let events = split_events(t);
            let section = current_section(&mut model);
            if let Some(step) = section.steps.last_mut() {
                step.events.extend(events);
            } else {
                tracing::debug!(line = t, "events without a preceding period");
            }
            i += 1;
            continue;
        }

        // Period line, optionally followed by inline events.
        let split_at = t
            .char_indices()
            .find(|(_, c)| *c == ':' || *c == '#')
            .map(|(i, _)| i)
            .unwrap_or(t.len());
        let period = t[..split_at].trim();
        if period.is_empty() {
            i += 1;
            continue;
        }
        let events = split_events(&t[split_at..]);
        current_section(&mut model).steps.push(SectionStep {
            name: period.to_string(),
            events,
            score: None,
            people: Vec::new(),
        });
        i += 1;
    }

    model
}

// ---------------------------------------------------------------------------
// Description generators
// ---------------------------------------------------------------------------

fn named_section_count(model: &DiagramModel) -> usize {
    model.sections.iter().filter(|s| !s.name.is_empty()).count()
}

fn period_count(model: &DiagramModel) -> usize {
    model.sections.iter().map(|s| s.steps.len()).sum()
}

fn short_spans(model: &DiagramModel) -> ShortText {
    let periods = period_count(model);
    let sections = named_section_count(model);

    let mut short = ShortText::new().text("Timeline");
    if let Some(title) = model.title.as_deref() {
        short = short.text(" titled \u{201c}").emph(title).text("\u{201d}");
    }
    short = short.text(" spanning ").strong(count_phrase(periods, "period"));
    if sections > 0 {
        short = short
            .text(" across ")
            .text(count_phrase(sections, "section"));
    }
    short = short.text(".");

    let has_events = model.sections.iter().any(|s| s.steps.iter().any(|p| !p.events.is_empty()));
    if has_events {
        short = short.text(" Includes itemized events per period.");
    }
    short
}

pub fn timeline_short(model: &DiagramModel) -> String {
    short_spans(model).render_plain()
}

pub fn timeline_short_html(model: &DiagramModel) -> String {
    short_spans(model).render_html()
}

fn period_item(step: &SectionStep) -> String {
    let name = format!("<em>\u{201c}{}\u{201d}</em>", escape_html(&step.name));
    if step.events.is_empty() {
        return format!("<li>{name}.</li>");
    }
    let events: Vec<String> = step.events.iter().map(|e| escape_html(e)).collect();
    format!("<li>{name}: {}.</li>", join_with_and(&events))
}

pub fn timeline_detailed(model: &DiagramModel) -> String {
    let mut html = String::new();

    let periods = period_count(model);
    html.push_str("<h3>Overview</h3><p>");
    html.push_str("A timeline");
    if let Some(title) = model.title.as_deref() {
        html.push_str(&format!(
            " titled <em>\u{201c}{}\u{201d}</em>",
            escape_html(title)
        ));
    }
    html.push_str(&format!(
        " presenting {} in chronological order",
        count_phrase(periods, "period")
    ));
    let sections = named_section_count(model);
    if sections > 0 {
        html.push_str(&format!(", grouped into {}", count_phrase(sections, "section")));
    }
    html.push_str(".</p>");

    if sections > 0 {
        html.push_str("<h3>Sections</h3><ul>");
        for section in model.sections.iter().filter(|s| !s.name.is_empty()) {
            html.push_str(&format!("<li><em>{}</em></li>", escape_html(&section.name)));
        }
        html.push_str("</ul>");
    }

    html.push_str("<h3>Process Flow</h3>");
    if sections > 0 {
        for section in &model.sections {
            if !section.name.is_empty() {
                html.push_str(&format!("<h4>{}</h4>", escape_html(&section.name)));
            }
            html.push_str("<ol>");
            for step in &section.steps {
                html.push_str(&period_item(step));
            }
            html.push_str("</ol>");
        }
    } else {
        html.push_str("<ol>");
        for section in &model.sections {
            for step in &section.steps {
                html.push_str(&period_item(step));
            }
        }
        html.push_str("</ol>");
    }

    let mut legend: Vec<&str> = Vec::new();
    if model
        .sections
        .iter()
        .any(|s| s.steps.iter().any(|p| !p.events.is_empty()))
    {
        legend.push("Each period lists the events that happened in it.");
    }
    if sections > 0 {
        legend.push("Periods are grouped into named sections.");
    }
    if !legend.is_empty() {
        html.push_str("<h3>Explanation</h3><ul>");
        for entry in legend {
            html.push_str(&format!("<li>{entry}</li>"));
        }
        html.push_str("</ul>");
    }

    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sections_and_periods_parse_in_order() {
        let model = parse_timeline(
            "timeline\nsection abc-123\ntask1\ntask2\nsection abc-456\ntask3\n",
        );
        let names: Vec<&str> = model.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["abc-123", "abc-456"]);
        assert_eq!(model.sections[0].steps.len(), 2);
        assert_eq!(model.sections[1].steps.len(), 1);
    }

    #[test]
    fn periods_carry_their_events() {
        let model = parse_timeline("timeline\nsection s\ntask1: event1\ntask2: event2: event3\n");
        assert_eq!(model.sections[0].steps[0].events, vec!["event1"]);
        assert_eq!(model.sections[0].steps[1].events, vec!["event2", "event3"]);
    }

    #[test]
    fn continuation_lines_extend_the_previous_period() {
        let model = parse_timeline(
            "timeline\nsection s\ntask2: event2: event3\n     : event4: event5\n",
        );
        assert_eq!(
            model.sections[0].steps[0].events,
            vec!["event2", "event3", "event4", "event5"]
        );
    }

    #[test]
    fn events_keep_embedded_urls_whole() {
        let model = parse_timeline("timeline\nsection s\ntask1: [event1](http://example.com)\n");
        assert_eq!(
            model.sections[0].steps[0].events,
            vec!["[event1](http://example.com)"]
        );
    }

    #[test]
    fn title_is_recorded() {
        let model = parse_timeline("timeline\ntitle History of Social Media\nsection s\n2002\n");
        assert_eq!(model.title.as_deref(), Some("History of Social Media"));
    }

    #[test]
    fn periods_without_sections_go_into_an_unnamed_section() {
        let model = parse_timeline("timeline\n2002: LinkedIn\n2004: Facebook\n");
        assert_eq!(model.sections.len(), 1);
        assert!(model.sections[0].name.is_empty());
        assert_eq!(model.sections[0].steps.len(), 2);
    }

    #[test]
    fn short_counts_periods_and_sections() {
        let model = parse_timeline(
            "timeline\ntitle Social\nsection Early\n2002: LinkedIn\n2004: Facebook\nsection Later\n2006: Twitter\n",
        );
        assert_eq!(
            timeline_short(&model),
            "Timeline titled \u{201c}Social\u{201d} spanning three periods across two \
             sections. Includes itemized events per period."
        );
    }

    #[test]
    fn detailed_groups_periods_by_section() {
        let model = parse_timeline(
            "timeline\nsection Early\n2002: LinkedIn\nsection Later\n2006: Twitter\n",
        );
        let detailed = timeline_detailed(&model);
        assert!(detailed.contains("<h4>Early</h4>"));
        assert!(detailed.contains("<h4>Later</h4>"));
        assert!(detailed.contains("<em>\u{201c}2002\u{201d}</em>: LinkedIn."));
        let early = detailed.find("<h4>Early</h4>").unwrap();
        let later = detailed.find("<h4>Later</h4>").unwrap();
        assert!(early < later);
    }

    #[test]
    fn parse_is_idempotent() {
        let code = "timeline\ntitle T\nsection s\n2002: a: b\n";
        assert_eq!(parse_timeline(code), parse_timeline(code));
    }
}
