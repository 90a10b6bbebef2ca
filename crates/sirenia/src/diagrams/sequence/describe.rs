//! Sequence-diagram description generators.
//!
//! The detailed narrative walks a merged chronological timeline of messages,
//! notes, and lifecycle events. The first event falling inside a block's span
//! renders the whole block as one composite step, and the walk skips past
//! every event the block contains.

use crate::heuristics::{BranchOutcome, CommentCategory, categorize_comment, infer_branch_outcome};
use crate::model::{
    Block, BlockKind, Branch, DiagramModel, EntityKind, LifecycleKind, NotePlacement,
};
use crate::text::{ShortText, count_phrase, escape_html, join_with_and, number_word};

fn quoted(name: &str) -> String {
    format!("<em>\u{201c}{}\u{201d}</em>", escape_html(name))
}

fn condition_text(condition: &str) -> Option<String> {
    let trimmed = condition.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("<em>\u{201c}{}\u{201d}</em>", escape_html(trimmed)))
    }
}

// ---------------------------------------------------------------------------
// Short form
// ---------------------------------------------------------------------------

fn short_spans(model: &DiagramModel) -> ShortText {
    let participants = model.count_of_kind(EntityKind::Participant);
    let actors = model.count_of_kind(EntityKind::Actor);
    let messages = model.relations.len();

    let mut short = ShortText::new().text("Sequence diagram");
    if let Some(title) = model.title.as_deref() {
        short = short.text(" titled \u{201c}").emph(title).text("\u{201d}");
    }

    let mut counts: Vec<String> = Vec::new();
    if participants > 0 {
        counts.push(count_phrase(participants, "participant"));
    }
    if actors > 0 {
        counts.push(count_phrase(actors, "actor"));
    }
    if counts.is_empty() {
        counts.push("no participants".to_string());
    }
    short = short.text(" with ").strong(join_with_and(&counts));
    if messages > 0 {
        short = short
            .text(", showing ")
            .text(count_phrase(messages, "message"));
    }
    short = short.text(".");

    let mut features: Vec<&str> = Vec::new();
    if model
        .blocks
        .iter()
        .any(|b| matches!(b.kind, BlockKind::Conditional { .. }))
    {
        features.push("conditional branches");
    }
    if model.blocks.iter().any(|b| matches!(b.kind, BlockKind::Loop { .. })) {
        features.push("loops");
    }
    if model
        .blocks
        .iter()
        .any(|b| matches!(b.kind, BlockKind::Parallel { .. }))
    {
        features.push("parallel branches");
    }
    if model
        .blocks
        .iter()
        .any(|b| matches!(b.kind, BlockKind::Optional { .. }))
    {
        features.push("optional sections");
    }
    if model
        .blocks
        .iter()
        .any(|b| matches!(b.kind, BlockKind::Critical { .. }))
    {
        features.push("critical sections");
    }
    if model
        .blocks
        .iter()
        .any(|b| matches!(b.kind, BlockKind::EarlyExit { .. }))
    {
        features.push("early exits");
    }
    if !model.notes.is_empty() {
        features.push("explanatory notes");
    }
    if model.autonumber {
        features.push("numbered messages");
    }
    if let Some(sentence) = crate::text::feature_sentence(&features) {
        short = short.text(sentence);
    }
    short
}

pub fn sequence_short(model: &DiagramModel) -> String {
    short_spans(model).render_plain()
}

pub fn sequence_short_html(model: &DiagramModel) -> String {
    short_spans(model).render_html()
}

// ---------------------------------------------------------------------------
// Chronological timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Event {
    Message(usize),
    Lifecycle(usize),
    Note(usize),
}

impl Event {
    fn line(&self, model: &DiagramModel) -> usize {
        match *self {
            Event::Message(i) => model.relations[i].source_line,
            Event::Lifecycle(i) => model.lifecycle[i].source_line,
            Event::Note(i) => model.notes[i].source_line,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Event::Message(_) => 0,
            Event::Lifecycle(_) => 1,
            Event::Note(_) => 2,
        }
    }
}

fn merged_timeline(model: &DiagramModel) -> Vec<Event> {
    let mut events: Vec<Event> = Vec::new();
    events.extend((0..model.relations.len()).map(Event::Message));
    events.extend((0..model.lifecycle.len()).map(Event::Lifecycle));
    events.extend((0..model.notes.len()).map(Event::Note));
    events.sort_by_key(|e| (e.line(model), e.rank()));
    events
}

/// Block indices not enclosed by any other block, in open order.
fn top_level_blocks(model: &DiagramModel) -> Vec<usize> {
    let mut roots: Vec<usize> = (0..model.blocks.len())
        .filter(|&i| {
            !model
                .blocks
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && other.span.encloses(&model.blocks[i].span))
        })
        .collect();
    roots.sort_by_key(|&i| model.blocks[i].span.open);
    roots
}

/// Direct children of `parent`: enclosed by it but by no intermediate block.
fn direct_children(model: &DiagramModel, parent: usize) -> Vec<usize> {
    let span = model.blocks[parent].span;
    let mut children: Vec<usize> = (0..model.blocks.len())
        .filter(|&i| i != parent && span.encloses(&model.blocks[i].span))
        .filter(|&i| {
            !model.blocks.iter().enumerate().any(|(j, other)| {
                j != i
                    && j != parent
                    && span.encloses(&other.span)
                    && other.span.encloses(&model.blocks[i].span)
            })
        })
        .collect();
    children.sort_by_key(|&i| model.blocks[i].span.open);
    children
}

// ---------------------------------------------------------------------------
// Step rendering
// ---------------------------------------------------------------------------

fn message_item(model: &DiagramModel, index: usize) -> String {
    let relation = &model.relations[index];
    let source = quoted(model.display_name(&relation.source));
    let target = quoted(model.display_name(&relation.target));
    let label = relation.label.trim();
    let text = (!label.is_empty())
        .then(|| format!("\u{201c}{}\u{201d}", escape_html(label)));

    let flags = relation.flags;
    let body = if flags.is_bidirectional {
        match text {
            Some(text) => format!("{source} and {target} exchange {text}"),
            None => format!("{source} and {target} exchange messages"),
        }
    } else if flags.is_error {
        match text {
            Some(text) => format!("{source} sends error {text} to {target}"),
            None => format!("{source} sends an error to {target}"),
        }
    } else if flags.is_async {
        match text {
            Some(text) => format!("{source} sends asynchronous message {text} to {target}"),
            None => format!("{source} sends an asynchronous message to {target}"),
        }
    } else if flags.is_response {
        match text {
            Some(text) => format!("{source} replies {text} to {target}"),
            None => format!("{source} replies to {target}"),
        }
    } else {
        match text {
            Some(text) => format!("{source} sends {text} to {target}"),
            None => format!("{source} sends a message to {target}"),
        }
    };
    format!("<li>{body}.</li>")
}

fn lifecycle_item(model: &DiagramModel, index: usize) -> String {
    let event = &model.lifecycle[index];
    let name = quoted(model.display_name(&event.actor));
    let verb = match event.kind {
        LifecycleKind::Create => "is created",
        LifecycleKind::Destroy => "is destroyed",
        LifecycleKind::Activate => "becomes active",
        LifecycleKind::Deactivate => "becomes inactive",
    };
    format!("<li>{name} {verb}.</li>")
}

fn note_item(model: &DiagramModel, index: usize) -> String {
    let note = &model.notes[index];
    let names: Vec<String> = note
        .actors
        .iter()
        .map(|a| quoted(model.display_name(a)))
        .collect();
    let place = match note.placement {
        NotePlacement::LeftOf => "left of",
        NotePlacement::RightOf => "right of",
        NotePlacement::Over => "over",
    };
    format!(
        "<li>Note {place} {}: \u{201c}{}\u{201d}.</li>",
        join_with_and(&names),
        escape_html(&note.text)
    )
}

/// Relations, nested blocks, and notes of one region, interleaved by line.
fn region_items(
    model: &DiagramModel,
    relations: &[usize],
    children: &[usize],
    from: usize,
    to: usize,
) -> String {
    #[derive(Clone, Copy)]
    enum Item {
        Relation(usize),
        Child(usize),
        Note(usize),
    }

    let mut items: Vec<(usize, Item)> = Vec::new();
    for &r in relations {
        items.push((model.relations[r].source_line, Item::Relation(r)));
    }
    for &c in children {
        let open = model.blocks[c].span.open;
        if open > from && open < to {
            items.push((open, Item::Child(c)));
        }
    }
    for (n, note) in model.notes.iter().enumerate() {
        if note.source_line > from
            && note.source_line < to
            && !children
                .iter()
                .any(|&c| model.blocks[c].span.contains(note.source_line))
        {
            items.push((note.source_line, Item::Note(n)));
        }
    }
    items.sort_by_key(|(line, _)| *line);

    let mut out = String::new();
    for (_, item) in items {
        match item {
            Item::Relation(r) => out.push_str(&message_item(model, r)),
            Item::Child(c) => out.push_str(&render_block(model, c)),
            Item::Note(n) => out.push_str(&note_item(model, n)),
        }
    }
    out
}

fn branch_outcome_suffix(model: &DiagramModel, branch: &Branch) -> &'static str {
    let Some(&last) = branch.relations.last() else {
        return "";
    };
    match infer_branch_outcome(&model.relations[last].label) {
        BranchOutcome::Success => " This branch ends in success.",
        BranchOutcome::Failure => " This branch ends in failure.",
        BranchOutcome::Neutral => "",
    }
}

/// Upper line bound of branch `k`: the next branch's marker or the block end.
fn branch_bounds(block: &Block, branches: &[Branch], k: usize) -> (usize, usize) {
    let from = branches[k].open_line;
    let to = branches
        .get(k + 1)
        .map(|b| b.open_line)
        .unwrap_or(block.span.close);
    (from, to)
}

fn render_block(model: &DiagramModel, index: usize) -> String {
    let block = &model.blocks[index];
    let children = direct_children(model, index);

    match &block.kind {
        BlockKind::Conditional { branches } => {
            let mut out = String::from("<li>Alternative paths:<ul>");
            for (k, branch) in branches.iter().enumerate() {
                let (from, to) = branch_bounds(block, branches, k);
                let inner = region_items(model, &branch.relations, &children, from, to);
                let heading = match (k, condition_text(&branch.condition)) {
                    (0, Some(cond)) => format!("If {cond}"),
                    (0, None) => "First path".to_string(),
                    (_, Some(cond)) => format!("Otherwise, if {cond}"),
                    (_, None) => "Otherwise".to_string(),
                };
                out.push_str(&format!(
                    "<li>{heading}:<ul>{inner}</ul>{}</li>",
                    branch_outcome_suffix(model, branch)
                ));
            }
            out.push_str("</ul></li>");
            out
        }
        BlockKind::Optional { condition, relations } => {
            let inner =
                region_items(model, relations, &children, block.span.open, block.span.close);
            let heading = match condition_text(condition) {
                Some(cond) => format!("Optionally, when {cond}"),
                None => "Optionally".to_string(),
            };
            format!("<li>{heading}:<ul>{inner}</ul></li>")
        }
        BlockKind::Loop { condition, relations } => {
            let inner =
                region_items(model, relations, &children, block.span.open, block.span.close);
            let heading = match condition_text(condition) {
                Some(cond) => format!("Loop {cond}"),
                None => "Loop".to_string(),
            };
            format!("<li>{heading}:<ul>{inner}</ul></li>")
        }
        BlockKind::Critical {
            condition,
            relations,
            options,
        } => {
            let first_option = options
                .first()
                .map(|o| o.open_line)
                .unwrap_or(block.span.close);
            let mut inner = region_items(model, relations, &children, block.span.open, first_option);
            for (k, option) in options.iter().enumerate() {
                let (from, to) = branch_bounds(block, options, k);
                let body = region_items(model, &option.relations, &children, from, to);
                let heading = match condition_text(&option.condition) {
                    Some(cond) => format!("Option {cond}"),
                    None => "Option".to_string(),
                };
                inner.push_str(&format!("<li>{heading}:<ul>{body}</ul></li>"));
            }
            let heading = match condition_text(condition) {
                Some(cond) => format!("Critical section {cond}"),
                None => "Critical section".to_string(),
            };
            format!("<li>{heading}:<ul>{inner}</ul></li>")
        }
        BlockKind::Parallel { branches } => {
            let mut out = String::from("<li>In parallel:<ul>");
            for (k, branch) in branches.iter().enumerate() {
                let (from, to) = branch_bounds(block, branches, k);
                let inner = region_items(model, &branch.relations, &children, from, to);
                let heading = match condition_text(&branch.condition) {
                    Some(cond) => format!("Branch {cond}"),
                    None => format!("Branch {}", number_word(k + 1)),
                };
                out.push_str(&format!("<li>{heading}:<ul>{inner}</ul></li>"));
            }
            out.push_str("</ul></li>");
            out
        }
        BlockKind::EarlyExit { condition, relations } => {
            let inner =
                region_items(model, relations, &children, block.span.open, block.span.close);
            let heading = match condition_text(condition) {
                Some(cond) => format!("Early exit when {cond}"),
                None => "Early exit".to_string(),
            };
            format!("<li>{heading}:<ul>{inner}</ul></li>")
        }
    }
}

// ---------------------------------------------------------------------------
// Detailed form
// ---------------------------------------------------------------------------

pub fn sequence_detailed(model: &DiagramModel) -> String {
    let mut html = String::new();

    // Overview
    let names: Vec<String> = model
        .entities
        .values()
        .map(|e| quoted(&e.display_name))
        .collect();
    html.push_str("<h3>Overview</h3><p>");
    html.push_str("A sequence diagram");
    if let Some(title) = model.title.as_deref() {
        html.push_str(&format!(" titled {}", quoted(title)));
    }
    if names.is_empty() {
        html.push_str(" with no participants");
    } else if names.len() <= 4 {
        html.push_str(&format!(
            " showing the interaction between {}",
            join_with_and(&names)
        ));
    } else {
        html.push_str(&format!(
            " showing an interaction among {}",
            count_phrase(names.len(), "participant")
        ));
    }
    if !model.relations.is_empty() {
        html.push_str(&format!(
            " across {}",
            count_phrase(model.relations.len(), "message")
        ));
    }
    html.push_str(".</p>");

    // Participants
    if !model.entities.is_empty() {
        html.push_str("<h3>Participants</h3><ul>");
        for entity in model.entities.values() {
            let kind = match entity.kind {
                EntityKind::Actor => "actor",
                _ => "participant",
            };
            let mut tags = vec![kind.to_string()];
            if entity.created {
                tags.push("created during the flow".to_string());
            }
            if entity.destroyed {
                tags.push("destroyed during the flow".to_string());
            }
            html.push_str(&format!(
                "<li>{} ({})</li>",
                quoted(&entity.display_name),
                tags.join(", ")
            ));
        }
        html.push_str("</ul>");
    }

    // Groups (participant boxes)
    if !model.groups.is_empty() {
        html.push_str("<h3>Groups</h3><ul>");
        for group in &model.groups {
            let members: Vec<String> = group
                .members
                .iter()
                .map(|id| quoted(model.display_name(id)))
                .collect();
            html.push_str(&format!(
                "<li><em>{}</em>: {}</li>",
                escape_html(&group.name),
                if members.is_empty() {
                    "empty".to_string()
                } else {
                    join_with_and(&members)
                }
            ));
        }
        html.push_str("</ul>");
    }

    // Process Flow
    html.push_str("<h3>Process Flow</h3><ol>");
    let roots = top_level_blocks(model);
    let mut skip_until = 0usize;
    for event in merged_timeline(model) {
        let line = event.line(model);
        if line <= skip_until {
            continue;
        }
        if let Some(&root) = roots
            .iter()
            .find(|&&b| model.blocks[b].span.contains(line))
        {
            html.push_str(&render_block(model, root));
            skip_until = model.blocks[root].span.close;
            continue;
        }
        match event {
            Event::Message(i) => html.push_str(&message_item(model, i)),
            Event::Lifecycle(i) => html.push_str(&lifecycle_item(model, i)),
            Event::Note(i) => html.push_str(&note_item(model, i)),
        }
    }
    html.push_str("</ol>");

    // Explanation: a legend entry appears only when its feature occurs.
    let mut legend: Vec<&str> = Vec::new();
    if model.relations.iter().any(|r| r.flags.is_response) {
        legend.push("Dashed arrows are replies or return messages.");
    }
    if model.relations.iter().any(|r| r.flags.is_async) {
        legend.push("Open-ended arrows are asynchronous messages that do not wait for a reply.");
    }
    if model.relations.iter().any(|r| r.flags.is_error) {
        legend.push("Arrows ending in a cross are error or rejection messages.");
    }
    if model
        .lifecycle
        .iter()
        .any(|e| matches!(e.kind, LifecycleKind::Activate | LifecycleKind::Deactivate))
    {
        legend.push("An active participant is busy processing until it becomes inactive.");
    }
    if model
        .lifecycle
        .iter()
        .any(|e| matches!(e.kind, LifecycleKind::Create | LifecycleKind::Destroy))
    {
        legend.push("Participants may be created and destroyed while the flow runs.");
    }
    if !model.notes.is_empty() {
        legend.push("Notes add commentary beside the message flow.");
    }
    if model
        .blocks
        .iter()
        .any(|b| matches!(b.kind, BlockKind::Conditional { .. }))
    {
        legend.push("Alternative sections run exactly one of their paths.");
    }
    if model.blocks.iter().any(|b| matches!(b.kind, BlockKind::Optional { .. })) {
        legend.push("Optional sections may be skipped entirely.");
    }
    if model.blocks.iter().any(|b| matches!(b.kind, BlockKind::Loop { .. })) {
        legend.push("Loop sections repeat while their condition holds.");
    }
    if model
        .blocks
        .iter()
        .any(|b| matches!(b.kind, BlockKind::Parallel { .. }))
    {
        legend.push("Parallel sections run their branches at the same time.");
    }
    if model
        .blocks
        .iter()
        .any(|b| matches!(b.kind, BlockKind::Critical { .. }))
    {
        legend.push("Critical sections must complete as a unit; options describe alternate handling.");
    }
    if model
        .blocks
        .iter()
        .any(|b| matches!(b.kind, BlockKind::EarlyExit { .. }))
    {
        legend.push("Break sections leave the surrounding flow early.");
    }
    if model.autonumber {
        legend.push("Messages are numbered in order.");
    }
    if !legend.is_empty() {
        html.push_str("<h3>Explanation</h3><ul>");
        for entry in legend {
            html.push_str(&format!("<li>{entry}</li>"));
        }
        html.push_str("</ul>");
    }

    // Developer Comments, categorized by keyword heuristics.
    if !model.comments.is_empty() {
        html.push_str("<h3>Developer Comments</h3>");
        for category in [
            CommentCategory::Structure,
            CommentCategory::Flow,
            CommentCategory::Functionality,
            CommentCategory::Other,
        ] {
            let entries: Vec<&str> = model
                .comments
                .iter()
                .filter(|c| categorize_comment(&c.text) == category)
                .map(|c| c.text.as_str())
                .collect();
            if entries.is_empty() {
                continue;
            }
            html.push_str(&format!("<h4>{}</h4><ul>", category.heading()));
            for entry in entries {
                html.push_str(&format!("<li>{}</li>", escape_html(entry)));
            }
            html.push_str("</ul>");
        }
    }

    html
}
