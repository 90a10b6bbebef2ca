//! User-journey parsing + description. Tasks carry a satisfaction score and
//! the people involved; the actor list is the sorted union of all people.

use std::collections::BTreeSet;

use crate::directive::{
    is_comment_line, parse_acc_descr_block, parse_key_colon_value, parse_keyword_arg_one_ws,
    split_hash_or_semi,
};
use crate::model::{DiagramModel, EntityKind, Section, SectionStep};
use crate::text::{ShortText, count_phrase, escape_html, join_with_and, number_word};

fn current_section<'a>(model: &'a mut DiagramModel) -> &'a mut Section {
    if model.sections.is_empty() {
        model.sections.push(Section {
            name: String::new(),
            steps: Vec::new(),
        });
    }
    model.sections.last_mut().expect("non-empty sections")
}

/// `: <score>: People, People`, both halves optional.
fn parse_task_data(task_data: &str) -> (Option<i64>, Vec<String>) {
    let rest = task_data.strip_prefix(':').unwrap_or(task_data);
    let mut pieces = rest.splitn(2, ':');

    let score = pieces
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v as i64);

    let people = pieces
        .next()
        .map(|part| {
            part.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();

    (score, people)
}

pub fn parse_journey(code: &str) -> DiagramModel {
    let mut model = DiagramModel::new("journey");

    let lines: Vec<&str> = code.lines().collect();
    let mut i = 0usize;
    while i < lines.len() {
        let stripped = if is_comment_line(lines[i]) || lines[i].trim_start().starts_with('#') {
            ""
        } else {
            split_hash_or_semi(lines[i])
        };
        let t = stripped.trim();
        if t.is_empty() {
            i += 1;
            continue;
        }

        if t.eq_ignore_ascii_case("journey") {
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

        let Some(colon) = t.find(':') else {
            tracing::debug!(line = t, "unrecognized journey statement");
            i += 1;
            continue;
        };
        let task_name = t[..colon].trim();
        let task_data = &t[colon..];
        if task_name.is_empty() {
            i += 1;
            continue;
        }
        let (score, people) = parse_task_data(task_data);
        current_section(&mut model).steps.push(SectionStep {
            name: task_name.to_string(),
            events: Vec::new(),
            score,
            people,
        });
        i += 1;
    }

    // The actor list is the sorted union of every task's people.
    let actors: BTreeSet<String> = model
        .sections
        .iter()
        .flat_map(|s| s.steps.iter())
        .flat_map(|t| t.people.iter().cloned())
        .collect();
    for actor in actors {
        model.ensure_entity(&actor, EntityKind::Actor);
    }

    model
}

// ---------------------------------------------------------------------------
// Description generators
// ---------------------------------------------------------------------------

fn task_count(model: &DiagramModel) -> usize {
    model.sections.iter().map(|s| s.steps.len()).sum()
}

fn named_section_count(model: &DiagramModel) -> usize {
    model.sections.iter().filter(|s| !s.name.is_empty()).count()
}

fn short_spans(model: &DiagramModel) -> ShortText {
    let tasks = task_count(model);
    let sections = named_section_count(model);
    let actors = model.count_of_kind(EntityKind::Actor);

    let mut short = ShortText::new().text("User journey");
    if let Some(title) = model.title.as_deref() {
        short = short.text(" titled \u{201c}").emph(title).text("\u{201d}");
    }
    short = short.text(" with ").strong(count_phrase(tasks, "task"));
    if sections > 0 {
        short = short
            .text(" across ")
            .text(count_phrase(sections, "section"));
    }
    if actors > 0 {
        short = short
            .text(", involving ")
            .text(count_phrase(actors, "actor"));
    }
    short = short.text(".");

    let has_scores = model
        .sections
        .iter()
        .any(|s| s.steps.iter().any(|t| t.score.is_some()));
    if has_scores {
        short = short.text(" Includes satisfaction scores.");
    }
    short
}

pub fn journey_short(model: &DiagramModel) -> String {
    short_spans(model).render_plain()
}

pub fn journey_short_html(model: &DiagramModel) -> String {
    short_spans(model).render_html()
}

fn task_item(model: &DiagramModel, step: &SectionStep) -> String {
    let name = format!("<em>\u{201c}{}\u{201d}</em>", escape_html(&step.name));
    let mut body = name;
    if let Some(score) = step.score {
        let score_text = if (0..=9).contains(&score) {
            number_word(score as usize)
        } else {
            score.to_string()
        };
        body.push_str(&format!(", rated {score_text} out of 5"));
    }
    if !step.people.is_empty() {
        let people: Vec<String> = step
            .people
            .iter()
            .map(|p| format!("<em>\u{201c}{}\u{201d}</em>", escape_html(model.display_name(p))))
            .collect();
        body.push_str(&format!(" by {}", join_with_and(&people)));
    }
    format!("<li>{body}.</li>")
}

pub fn journey_detailed(model: &DiagramModel) -> String {
    let mut html = String::new();

    let tasks = task_count(model);
    let sections = named_section_count(model);
    html.push_str("<h3>Overview</h3><p>");
    html.push_str("A user journey");
    if let Some(title) = model.title.as_deref() {
        html.push_str(&format!(
            " titled <em>\u{201c}{}\u{201d}</em>",
            escape_html(title)
        ));
    }
    html.push_str(&format!(" walking through {}", count_phrase(tasks, "task")));
    if sections > 0 {
        html.push_str(&format!(", grouped into {}", count_phrase(sections, "section")));
    }
    html.push_str(".</p>");

    // Actors
    let actors: Vec<String> = model
        .entities
        .values()
        .filter(|e| e.kind == EntityKind::Actor)
        .map(|e| format!("<em>\u{201c}{}\u{201d}</em>", escape_html(&e.display_name)))
        .collect();
    if !actors.is_empty() {
        html.push_str("<h3>Actors</h3><ul>");
        for actor in &actors {
            html.push_str(&format!("<li>{actor}</li>"));
        }
        html.push_str("</ul>");
    }

    // Process Flow
    html.push_str("<h3>Process Flow</h3>");
    if sections > 0 {
        for section in &model.sections {
            if !section.name.is_empty() {
                html.push_str(&format!("<h4>{}</h4>", escape_html(&section.name)));
            }
            html.push_str("<ol>");
            for step in &section.steps {
                html.push_str(&task_item(model, step));
            }
            html.push_str("</ol>");
        }
    } else {
        html.push_str("<ol>");
        for section in &model.sections {
            for step in &section.steps {
                html.push_str(&task_item(model, step));
            }
        }
        html.push_str("</ol>");
    }

    // Explanation
    let mut legend: Vec<&str> = Vec::new();
    if model
        .sections
        .iter()
        .any(|s| s.steps.iter().any(|t| t.score.is_some()))
    {
        legend.push("Each task is scored from 1 (lowest) to 5 (highest) satisfaction.");
    }
    if model
        .sections
        .iter()
        .any(|s| s.steps.iter().any(|t| !t.people.is_empty()))
    {
        legend.push("Tasks list the people taking part in them.");
    }
    if sections > 0 {
        legend.push("Tasks are grouped into named sections.");
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

    const SHOPPING: &str = "journey\n\
title Family shopping\n\
section Journey to the shops\n\
Get car keys: 5: Dad\n\
Go to car: 3: Dad, Mum\n\
section Do shopping\n\
Go shopping: 4: Mum\n";

    #[test]
    fn tasks_parse_with_scores_and_people() {
        let model = parse_journey(SHOPPING);
        assert_eq!(model.sections.len(), 2);
        let first = &model.sections[0].steps[0];
        assert_eq!(first.name, "Get car keys");
        assert_eq!(first.score, Some(5));
        assert_eq!(first.people, vec!["Dad"]);
        let second = &model.sections[0].steps[1];
        assert_eq!(second.people, vec!["Dad", "Mum"]);
    }

    #[test]
    fn actors_are_the_sorted_union_of_people() {
        let model = parse_journey(SHOPPING);
        let actors: Vec<&str> = model.entities.keys().map(String::as_str).collect();
        assert_eq!(actors, vec!["Dad", "Mum"]);
        assert_eq!(model.count_of_kind(EntityKind::Actor), 2);
    }

    #[test]
    fn score_is_optional_and_invalid_scores_degrade() {
        let model = parse_journey("journey\nsection s\nA task: 5\nB task: : Bob\nC task: abc: Carol\n");
        let steps = &model.sections[0].steps;
        assert_eq!(steps[0].score, Some(5));
        assert_eq!(steps[0].people, Vec::<String>::new());
        assert_eq!(steps[1].score, None);
        assert_eq!(steps[1].people, vec!["Bob"]);
        assert_eq!(steps[2].score, None);
        assert_eq!(steps[2].people, vec!["Carol"]);
    }

    #[test]
    fn title_and_directives_are_recorded() {
        let model = parse_journey(
            "journey\naccTitle: Shopping acc\naccDescr: A family shopping trip\ntitle Family shopping\nsection s\nA: 1: B\n",
        );
        assert_eq!(model.title.as_deref(), Some("Family shopping"));
        assert_eq!(model.acc_title.as_deref(), Some("Shopping acc"));
        assert_eq!(model.acc_descr.as_deref(), Some("A family shopping trip"));
    }

    #[test]
    fn short_counts_tasks_sections_and_actors() {
        let model = parse_journey(SHOPPING);
        assert_eq!(
            journey_short(&model),
            "User journey titled \u{201c}Family shopping\u{201d} with three tasks \
             across two sections, involving two actors. Includes satisfaction scores."
        );
    }

    #[test]
    fn detailed_lists_actors_and_rated_tasks() {
        let model = parse_journey(SHOPPING);
        let detailed = journey_detailed(&model);
        assert!(detailed.contains("<h3>Actors</h3>"));
        assert!(detailed.contains("<em>\u{201c}Dad\u{201d}</em>"));
        assert!(detailed.contains("<h4>Journey to the shops</h4>"));
        assert!(detailed.contains(
            "<em>\u{201c}Get car keys\u{201d}</em>, rated five out of 5 by <em>\u{201c}Dad\u{201d}</em>."
        ));
        assert!(detailed.contains("scored from 1 (lowest) to 5 (highest)"));
    }

    #[test]
    fn parse_is_idempotent() {
        assert_eq!(parse_journey(SHOPPING), parse_journey(SHOPPING));
    }
}
