//! Flowchart description generators.

use crate::model::DiagramModel;
use crate::text::{ShortText, count_phrase, escape_html, number_word};

use super::linearize::{linearize, ordered_outgoing};

fn quoted(name: &str) -> String {
    format!("<em>\u{201c}{}\u{201d}</em>", escape_html(name))
}

fn direction_phrase(direction: Option<&str>) -> Option<&'static str> {
    match direction.map(str::to_ascii_uppercase).as_deref() {
        Some("TD") | Some("TB") => Some("top to bottom"),
        Some("BT") => Some("bottom to top"),
        Some("LR") => Some("left to right"),
        Some("RL") => Some("right to left"),
        _ => None,
    }
}

fn short_spans(model: &DiagramModel) -> ShortText {
    let steps = model.entities.len();
    let decisions = model.entities.values().filter(|e| e.is_decision).count();

    let mut short = ShortText::new().text("Flowchart");
    if let Some(title) = model.title.as_deref() {
        short = short.text(" titled \u{201c}").emph(title).text("\u{201d}");
    }
    short = short.text(" with ").strong(count_phrase(steps, "step"));
    if decisions > 0 {
        short = short
            .text(", including ")
            .text(count_phrase(decisions, "decision point"));
    }
    short = short.text(".");

    let mut features: Vec<&str> = Vec::new();
    if decisions > 0 {
        features.push("conditional branches");
    }
    if !model.groups.is_empty() {
        features.push("grouped steps");
    }
    if model.relations.iter().any(|r| r.flags.is_dotted) {
        features.push("optional paths");
    }
    if let Some(sentence) = crate::text::feature_sentence(&features) {
        short = short.text(sentence);
    }
    short
}

pub fn flowchart_short(model: &DiagramModel) -> String {
    short_spans(model).render_plain()
}

pub fn flowchart_short_html(model: &DiagramModel) -> String {
    short_spans(model).render_html()
}

pub fn flowchart_detailed(model: &DiagramModel) -> String {
    let order = linearize(model);
    let position_of = |id: &str| order.iter().position(|o| o == id);

    let mut html = String::new();

    // Overview
    let steps = model.entities.len();
    let decisions = model.entities.values().filter(|e| e.is_decision).count();
    html.push_str("<h3>Overview</h3><p>");
    match model.title.as_deref() {
        Some(title) => {
            html.push_str(&format!(
                "A flowchart titled {} describing a process with {}",
                quoted(title),
                count_phrase(steps, "step")
            ));
        }
        None => {
            html.push_str(&format!(
                "A flowchart describing a process with {}",
                count_phrase(steps, "step")
            ));
        }
    }
    if decisions > 0 {
        html.push_str(&format!(" and {}", count_phrase(decisions, "decision point")));
    }
    if let Some(reading) = direction_phrase(model.direction.as_deref()) {
        html.push_str(&format!(", read {reading}"));
    }
    html.push_str(".</p>");

    // Groups
    if !model.groups.is_empty() {
        html.push_str("<h3>Groups</h3><ul>");
        for group in &model.groups {
            let members: Vec<String> = group
                .members
                .iter()
                .map(|id| format!("\u{201c}{}\u{201d}", escape_html(model.display_name(id))))
                .collect();
            html.push_str(&format!(
                "<li><em>{}</em>: {}</li>",
                escape_html(&group.name),
                if members.is_empty() {
                    "no steps".to_string()
                } else {
                    crate::text::join_with_and(&members)
                }
            ));
        }
        html.push_str("</ul>");
    }

    // Process Flow
    html.push_str("<h3>Process Flow</h3><ol>");
    for (index, id) in order.iter().enumerate() {
        let step = index + 1;
        let Some(entity) = model.entities.get(id) else {
            continue;
        };
        let name = quoted(&entity.display_name);
        html.push_str("<li>");
        html.push_str(&format!("Step {}: ", number_word(step)));

        let outgoing = ordered_outgoing(model, entity);
        if entity.is_decision && !outgoing.is_empty() {
            let branches: Vec<String> = outgoing
                .iter()
                .map(|&i| {
                    let relation = &model.relations[i];
                    let target = quoted(model.display_name(&relation.target));
                    let verb = match position_of(&relation.target) {
                        Some(pos) if pos <= index => "return to",
                        _ => "continue to",
                    };
                    if relation.label.trim().is_empty() {
                        format!("{verb} {target}")
                    } else {
                        format!(
                            "if \u{201c}{}\u{201d}, {verb} {target}",
                            escape_html(relation.label.trim())
                        )
                    }
                })
                .collect();
            html.push_str(&format!(
                "decision {} with {}: {}.",
                name,
                count_phrase(branches.len(), "branch"),
                branches.join("; ")
            ));
        } else if !outgoing.is_empty() {
            let targets: Vec<String> = outgoing
                .iter()
                .map(|&i| {
                    let relation = &model.relations[i];
                    let target = quoted(model.display_name(&relation.target));
                    if relation.label.trim().is_empty() {
                        target
                    } else {
                        format!("{target} (\u{201c}{}\u{201d})", escape_html(relation.label.trim()))
                    }
                })
                .collect();
            html.push_str(&format!(
                "{}, leading to {}.",
                name,
                crate::text::join_with_and(&targets)
            ));
        } else {
            html.push_str(&format!("{name} (end of flow)."));
        }
        html.push_str("</li>");
    }
    html.push_str("</ol>");

    // Explanation: a legend entry appears only when its feature occurs.
    let mut legend: Vec<&str> = Vec::new();
    if decisions > 0 {
        legend.push("Decision points branch the flow; each labeled branch leads to a different path.");
    }
    if model.relations.iter().any(|r| r.flags.is_dotted) {
        legend.push("Dotted connections mark optional or conditional paths.");
    }
    if model.relations.iter().any(|r| r.flags.is_thick) {
        legend.push("Thick connections mark emphasized paths.");
    }
    if model.relations.iter().any(|r| r.flags.is_bidirectional) {
        legend.push("Double-ended connections run in both directions.");
    }
    if model.relations.iter().any(|r| r.flags.is_error) {
        legend.push("Connections ending in a cross mark failure paths.");
    }
    if !model.groups.is_empty() {
        legend.push("Steps may be grouped into named sections.");
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
