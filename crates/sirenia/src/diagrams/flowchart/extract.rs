//! Flowchart entity + relation extraction.
//!
//! Relation patterns are an explicit ordered rule list, most specific first;
//! the first matching rule per statement wins so a labeled relation is never
//! double-counted as two unlabeled ones. A consolidated connection-map pass
//! then re-scans the original text to recover edges the line rules missed
//! (chained statements, unusual bracket content).

use regex::Regex;
use std::sync::OnceLock;

use crate::directive::{
    is_comment_line, parse_acc_descr_block, parse_key_colon_value, parse_keyword_arg_one_ws,
    starts_with_ci,
};
use crate::model::{
    DiagramModel, EntityKind, Group, Relation, StyleFlags, reclassify_decision_entities,
};

/// Arrow token fragment, longest alternatives first.
const ARROW_FRAGMENT: &str =
    r"<-{2,}>|<={2,}>|-\.+->|-{2,}>|={2,}>|-{2,}[xo]|-\.+-|-{3,}|={3,}";

fn arrow_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"(?:{ARROW_FRAGMENT})")).expect("valid regex"))
}

fn pipe_labeled_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^(?P<src>.+?)\s*(?P<arrow>{ARROW_FRAGMENT})\s*\|(?P<label>[^|]*)\|\s*(?P<dst>.+?)\s*$"
        ))
        .expect("valid regex")
    })
}

fn inline_labeled_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<src>.+?)\s+(?P<pre>--|-\.|==)\s(?P<label>.+?)\s(?P<post>-{2,}>|\.->|={2,}>|-{3,}|\.-|={3,})\s*(?P<dst>.+?)\s*$",
        )
        .expect("valid regex")
    })
}

fn unlabeled_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^(?P<src>.+?)\s*(?P<arrow>{ARROW_FRAGMENT})\s*(?P<dst>.+?)\s*$"
        ))
        .expect("valid regex")
    })
}

fn node_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<id>\w+)\s*(?:\[\[(?P<subr>[^\]]*)\]\]|\[\((?P<cyl>[^)]*)\)\]|\(\((?P<circ>[^)]*)\)\)|\{(?P<dec>[^}]*)\}|\[(?P<rect>[^\]]*)\]|\((?P<round>[^)]*)\)|>(?P<flag>[^\]]*)\])?$",
        )
        .expect("valid regex")
    })
}

/// Tokens that look like ids in sloppy captures but are DSL keywords, never
/// entities.
const RESERVED_IDS: &[&str] = &[
    "end", "subgraph", "direction", "graph", "flowchart", "style", "linkstyle", "classdef",
    "class", "click",
];

const SKIPPED_STATEMENT_KEYWORDS: &[&str] =
    &["style", "classDef", "class", "click", "linkStyle", "direction"];

#[derive(Debug, Clone, PartialEq)]
struct NodeRef {
    id: String,
    label: Option<String>,
    is_decision: bool,
}

fn parse_node_ref(text: &str) -> Option<NodeRef> {
    let caps = node_ref_regex().captures(text.trim())?;
    let id = caps.name("id").expect("id group").as_str().to_string();
    if RESERVED_IDS.contains(&id.to_ascii_lowercase().as_str()) {
        return None;
    }

    let is_decision = caps.name("dec").is_some();
    let label = ["subr", "cyl", "circ", "dec", "rect", "round", "flag"]
        .iter()
        .find_map(|&name| caps.name(name))
        .map(|m| strip_quotes(m.as_str().trim()).to_string())
        .filter(|s| !s.is_empty());

    Some(NodeRef {
        id,
        label,
        is_decision,
    })
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

fn arrow_flags(arrow: &str) -> StyleFlags {
    StyleFlags {
        is_response: false,
        is_async: false,
        is_error: arrow.ends_with('x'),
        is_bidirectional: arrow.starts_with('<'),
        is_dotted: arrow.contains('.'),
        is_thick: arrow.contains('='),
    }
}

#[derive(Debug, Default)]
struct ParseState {
    header_seen: bool,
    group_stack: Vec<usize>,
}

pub fn parse_flowchart(code: &str) -> DiagramModel {
    let mut model = DiagramModel::new("flowchart");
    let mut state = ParseState::default();

    let lines: Vec<&str> = code.lines().collect();
    let mut i = 0usize;
    while i < lines.len() {
        let line_no = i + 1;
        let t = lines[i].trim();
        if t.is_empty() || is_comment_line(t) {
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

        if let Some(rest) = parse_keyword_arg_one_ws(t, "subgraph") {
            let name = parse_node_ref(&rest)
                .and_then(|r| r.label)
                .unwrap_or_else(|| strip_quotes(&rest).to_string());
            model.groups.push(Group {
                name,
                members: Vec::new(),
            });
            state.group_stack.push(model.groups.len() - 1);
            i += 1;
            continue;
        }
        if t == "end" && !state.group_stack.is_empty() {
            state.group_stack.pop();
            i += 1;
            continue;
        }

        if SKIPPED_STATEMENT_KEYWORDS
            .iter()
            .any(|&k| parse_keyword_arg_one_ws(t, k).is_some())
        {
            i += 1;
            continue;
        }

        for stmt in t.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            if !state.header_seen
                && (starts_with_ci(stmt, "flowchart") || starts_with_ci(stmt, "graph"))
            {
                state.header_seen = true;
                if let Some(dir) = stmt.split_whitespace().nth(1) {
                    model.direction = Some(dir.to_string());
                }
                continue;
            }
            process_statement(stmt, line_no, &mut model, &state);
        }
        i += 1;
    }

    connection_map_pass(code, &mut model);
    reclassify_decision_entities(&mut model);
    model
}

/// Declares (or re-touches) an entity from a node reference, applying bracket
/// text as the display name and `{}` shapes as explicit decision markers.
fn declare(model: &mut DiagramModel, state: &ParseState, node: &NodeRef) {
    let current_group = state.group_stack.last().copied();
    let joined_group = {
        let entity = model.ensure_entity(&node.id, EntityKind::Node);
        if let Some(label) = &node.label {
            entity.display_name = label.clone();
        }
        if node.is_decision {
            entity.is_decision = true;
        }
        if entity.group.is_none() {
            entity.group = current_group;
            current_group
        } else {
            None
        }
    };
    if let Some(group) = joined_group {
        model.groups[group].members.push(node.id.clone());
    }
}

fn push_edge(
    model: &mut DiagramModel,
    state: &ParseState,
    src: &NodeRef,
    dst: &NodeRef,
    label: &str,
    flags: StyleFlags,
    line_no: usize,
) {
    declare(model, state, src);
    declare(model, state, dst);
    model.push_relation(
        Relation {
            source: src.id.clone(),
            target: dst.id.clone(),
            label: strip_quotes(label.trim()).to_string(),
            flags,
            source_line: line_no,
        },
        EntityKind::Node,
    );
}

/// Ordered rule application; the first matching rule consumes the statement.
fn process_statement(stmt: &str, line_no: usize, model: &mut DiagramModel, state: &ParseState) {
    if let Some(caps) = pipe_labeled_regex().captures(stmt) {
        let src = parse_node_ref(&caps["src"]);
        let dst = parse_node_ref(&caps["dst"]);
        if let (Some(src), Some(dst)) = (src, dst) {
            let flags = arrow_flags(&caps["arrow"]);
            push_edge(model, state, &src, &dst, &caps["label"], flags, line_no);
            return;
        }
        tracing::debug!(statement = stmt, "skipping labeled relation with invalid endpoint");
        return;
    }

    if let Some(caps) = inline_labeled_regex().captures(stmt) {
        let src = parse_node_ref(&caps["src"]);
        let dst = parse_node_ref(&caps["dst"]);
        if let (Some(src), Some(dst)) = (src, dst) {
            let flags = arrow_flags(&caps["pre"]);
            push_edge(model, state, &src, &dst, &caps["label"], flags, line_no);
            return;
        }
        tracing::debug!(statement = stmt, "skipping labeled relation with invalid endpoint");
        return;
    }

    if let Some(caps) = unlabeled_regex().captures(stmt) {
        let src = parse_node_ref(&caps["src"]);
        let dst = parse_node_ref(&caps["dst"]);
        if let (Some(src), Some(dst)) = (src, dst) {
            let flags = arrow_flags(&caps["arrow"]);
            push_edge(model, state, &src, &dst, "", flags, line_no);
            return;
        }
        tracing::debug!(statement = stmt, "skipping relation with invalid endpoint");
        return;
    }

    if let Some(node) = parse_node_ref(stmt) {
        declare(model, state, &node);
        return;
    }

    tracing::debug!(statement = stmt, "unrecognized flowchart statement");
}

/// Complete-connection-map pass: re-scan the original text for every arrow
/// occurrence and merge any (source, target, label) triple the per-statement
/// rules missed. Node bracket syntax varies enough that a single pattern
/// misses edge cases; this pass tolerates that and never duplicates.
fn connection_map_pass(code: &str, model: &mut DiagramModel) {
    let state = ParseState::default();

    for (index, raw) in code.lines().enumerate() {
        let line_no = index + 1;
        let t = raw.trim();
        if t.is_empty() || is_comment_line(t) {
            continue;
        }

        for stmt in t.split(';') {
            let arrows: Vec<(usize, usize, String)> = arrow_regex()
                .find_iter(stmt)
                .map(|m| (m.start(), m.end(), m.as_str().to_string()))
                .collect();
            if arrows.is_empty() {
                continue;
            }

            let mut segments: Vec<&str> = Vec::with_capacity(arrows.len() + 1);
            let mut cursor = 0usize;
            for (start, end, _) in &arrows {
                segments.push(&stmt[cursor..*start]);
                cursor = *end;
            }
            segments.push(&stmt[cursor..]);

            for (k, (_, _, arrow)) in arrows.iter().enumerate() {
                let left = strip_pipe_label(segments[k]).0;
                let (right, label) = strip_pipe_label(segments[k + 1]);
                let (Some(src), Some(dst)) = (parse_node_ref(left), parse_node_ref(right)) else {
                    continue;
                };
                let label = label.unwrap_or_default();
                let duplicate = model.relations.iter().any(|r| {
                    r.source == src.id && r.target == dst.id && r.label == label.trim()
                });
                if duplicate {
                    continue;
                }
                push_edge(model, &state, &src, &dst, &label, arrow_flags(arrow), line_no);
            }
        }
    }
}

/// Splits a leading `|label|` off a segment, returning (remainder, label).
fn strip_pipe_label(segment: &str) -> (&str, Option<String>) {
    let t = segment.trim();
    let Some(rest) = t.strip_prefix('|') else {
        return (t, None);
    };
    let Some(end) = rest.find('|') else {
        return (t, None);
    };
    (rest[end + 1..].trim(), Some(rest[..end].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn node_refs_cover_bracket_shapes() {
        let r = parse_node_ref("A[Start here]").unwrap();
        assert_eq!(r.label.as_deref(), Some("Start here"));
        assert!(!r.is_decision);

        let r = parse_node_ref("B{Valid?}").unwrap();
        assert_eq!(r.label.as_deref(), Some("Valid?"));
        assert!(r.is_decision);

        assert_eq!(
            parse_node_ref("C((Circle))").unwrap().label.as_deref(),
            Some("Circle")
        );
        assert_eq!(
            parse_node_ref("D[[Subroutine]]").unwrap().label.as_deref(),
            Some("Subroutine")
        );
        assert_eq!(
            parse_node_ref("E[(Database)]").unwrap().label.as_deref(),
            Some("Database")
        );
        assert_eq!(
            parse_node_ref("F>Flag]").unwrap().label.as_deref(),
            Some("Flag")
        );
        assert_eq!(
            parse_node_ref(r#"G["Quoted label"]"#).unwrap().label.as_deref(),
            Some("Quoted label")
        );
        assert_eq!(parse_node_ref("bare").unwrap().label, None);
    }

    #[test]
    fn reserved_words_are_not_entities() {
        assert_eq!(parse_node_ref("end"), None);
        assert_eq!(parse_node_ref("subgraph"), None);
        assert_eq!(parse_node_ref("End"), None);
    }

    #[test]
    fn pipe_labeled_rule_matches_before_unlabeled() {
        let model = parse_flowchart("flowchart TD\nA -->|Yes| B\n");
        assert_eq!(model.relations.len(), 1);
        assert_eq!(model.relations[0].label, "Yes");
        assert_eq!(model.relations[0].source, "A");
        assert_eq!(model.relations[0].target, "B");
    }

    #[test]
    fn inline_dash_label_rule() {
        let model = parse_flowchart("flowchart TD\nA -- checks --> B\n");
        assert_eq!(model.relations.len(), 1);
        assert_eq!(model.relations[0].label, "checks");
    }

    #[test]
    fn unlabeled_arrow_variants_set_style_flags() {
        let model = parse_flowchart(
            "flowchart LR\nA --> B\nB -.-> C\nC ==> D\nD --x E\nE <--> F\n",
        );
        assert_eq!(model.relations.len(), 5);
        assert!(!model.relations[0].flags.is_dotted);
        assert!(model.relations[1].flags.is_dotted);
        assert!(model.relations[2].flags.is_thick);
        assert!(model.relations[3].flags.is_error);
        assert!(model.relations[4].flags.is_bidirectional);
    }

    #[test]
    fn endpoints_declare_display_names_and_decision_shape() {
        let model = parse_flowchart("flowchart TD\nA[Start] --> B{Check}\n");
        assert_eq!(model.display_name("A"), "Start");
        assert_eq!(model.display_name("B"), "Check");
        assert!(model.entities["B"].is_decision);
    }

    #[test]
    fn semicolon_separated_statements_parse_individually() {
        let model = parse_flowchart("graph TD; A-->B; B-->C;");
        assert_eq!(model.relations.len(), 2);
        assert_eq!(model.direction.as_deref(), Some("TD"));
    }

    #[test]
    fn connection_map_recovers_chained_edges() {
        // The single-statement rules capture only the first edge of a chain;
        // the consolidated pass recovers the rest without duplicating.
        let model = parse_flowchart("flowchart TD\nA --> B --> C\n");
        let pairs: Vec<(&str, &str)> = model
            .relations
            .iter()
            .map(|r| (r.source.as_str(), r.target.as_str()))
            .collect();
        assert!(pairs.contains(&("A", "B")));
        assert!(pairs.contains(&("B", "C")));
        assert_eq!(model.relations.len(), 2);
    }

    #[test]
    fn connection_map_does_not_duplicate_labeled_relations() {
        let model = parse_flowchart("flowchart TD\nA -->|Yes| B\n");
        assert_eq!(model.relations.len(), 1);
    }

    #[test]
    fn subgraphs_become_groups_with_members() {
        let model = parse_flowchart(
            "flowchart TD\nsubgraph Billing\nA --> B\nend\nB --> C\n",
        );
        assert_eq!(model.groups.len(), 1);
        assert_eq!(model.groups[0].name, "Billing");
        assert_eq!(model.groups[0].members, vec!["A", "B"]);
        assert_eq!(model.entities["C"].group, None);
    }

    #[test]
    fn unrecognized_lines_are_skipped_not_fatal() {
        let model = parse_flowchart(
            "flowchart TD\n???not a statement???\nclick A callback\nA --> B\n",
        );
        assert_eq!(model.relations.len(), 1);
        assert_eq!(model.entities.len(), 2);
    }

    #[test]
    fn decision_reclassification_applies_to_all_labeled_fanout() {
        let model = parse_flowchart("flowchart TD\nX -->|a| Y\nX -->|b| Z\n");
        assert!(model.entities["X"].is_decision);

        let model = parse_flowchart("flowchart TD\nX -->|a| Y\nX --> Z\n");
        assert!(!model.entities["X"].is_decision);
    }

    #[test]
    fn directives_are_captured_for_the_override_stage() {
        let model = parse_flowchart(
            "flowchart TD\naccTitle: Checkout\naccDescr { multi\nline }\nA --> B\n",
        );
        assert_eq!(model.acc_title.as_deref(), Some("Checkout"));
        assert_eq!(model.acc_descr.as_deref(), Some("multi\nline"));
    }

    #[test]
    fn parse_is_idempotent() {
        let code = "flowchart TD\nA[Start] --> B{Check}\nB -->|Yes| C[Done]\nB -->|No| A\n";
        assert_eq!(parse_flowchart(code), parse_flowchart(code));
    }
}
