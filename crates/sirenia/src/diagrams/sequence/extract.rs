//! Sequence-diagram entity, message, note, and lifecycle extraction.

use crate::directive::{
    comment_text, is_comment_line, keyword_rest, parse_acc_descr_block, parse_key_colon_value,
    parse_keyword_arg_one_ws,
};
use crate::model::{
    Comment, DiagramModel, EntityKind, Group, LifecycleEvent, LifecycleKind, Note, NotePlacement,
    Relation, StyleFlags, reclassify_decision_entities,
};

use super::blocks::{BlockState, reattribute_early_exit};

/// Message arrow tokens, longest first so `-->>` wins over `->>` and `->` at
/// the same position.
const MESSAGE_ARROWS: &[&str] = &[
    "<<-->>", "<<->>", "-->>", "--x", "--)", "-->", "->>", "-x", "-)", "->",
];

/// Words that look like endpoints in sloppy captures but are DSL keywords.
const RESERVED_ENDPOINTS: &[&str] = &[
    "alt", "opt", "loop", "par", "and", "else", "end", "critical", "option", "break", "rect",
    "box", "note", "participant", "actor", "activate", "deactivate", "create", "destroy",
];

fn is_reserved(id: &str) -> bool {
    RESERVED_ENDPOINTS.contains(&id.to_ascii_lowercase().as_str())
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

fn find_arrow(text: &str) -> Option<(usize, &'static str)> {
    let bytes = text.as_bytes();
    for pos in 0..bytes.len() {
        if bytes[pos] != b'-' && bytes[pos] != b'<' {
            continue;
        }
        for &arrow in MESSAGE_ARROWS {
            if text[pos..].starts_with(arrow) {
                return Some((pos, arrow));
            }
        }
    }
    None
}

fn arrow_flags(arrow: &str) -> StyleFlags {
    StyleFlags {
        is_response: arrow.contains("--"),
        is_async: arrow.ends_with(')'),
        is_error: arrow.ends_with('x') || arrow.ends_with('X'),
        is_bidirectional: arrow.starts_with("<<"),
        is_dotted: arrow.contains("--"),
        is_thick: false,
    }
}

#[derive(Debug, PartialEq)]
struct ParsedMessage {
    source: String,
    target: String,
    text: String,
    flags: StyleFlags,
    /// `+` after the arrow activates the target.
    activate_target: bool,
    /// `-` after the arrow deactivates the source.
    deactivate_source: bool,
}

fn parse_message(line: &str) -> Option<ParsedMessage> {
    let (pos, arrow) = find_arrow(line)?;
    let source = line[..pos].trim();
    let mut rest = line[pos + arrow.len()..].trim_start();

    let mut activate_target = false;
    let mut deactivate_source = false;
    if let Some(after) = rest.strip_prefix('+') {
        activate_target = true;
        rest = after.trim_start();
    } else if let Some(after) = rest.strip_prefix('-') {
        deactivate_source = true;
        rest = after.trim_start();
    }

    let (target, text) = match rest.find(':') {
        Some(colon) => (rest[..colon].trim(), rest[colon + 1..].trim()),
        None => (rest.trim(), ""),
    };

    if source.is_empty() || target.is_empty() || is_reserved(source) || is_reserved(target) {
        return None;
    }

    Some(ParsedMessage {
        source: source.to_string(),
        target: target.to_string(),
        text: text.to_string(),
        flags: arrow_flags(arrow),
        activate_target,
        deactivate_source,
    })
}

/// `X as Alias` split, case-insensitive separator.
fn split_alias(rest: &str) -> (String, Option<String>) {
    let lower = rest.to_ascii_lowercase();
    match lower.find(" as ") {
        Some(i) => (
            strip_quotes(rest[..i].trim()).to_string(),
            Some(strip_quotes(rest[i + 4..].trim()).to_string()),
        ),
        None => (strip_quotes(rest.trim()).to_string(), None),
    }
}

fn parse_note(line: &str, line_no: usize) -> Option<Note> {
    let rest = parse_keyword_arg_one_ws(line, "note")?;
    let lower = rest.to_ascii_lowercase();
    let (placement, after) = if lower.starts_with("left of ") {
        (NotePlacement::LeftOf, &rest["left of ".len()..])
    } else if lower.starts_with("right of ") {
        (NotePlacement::RightOf, &rest["right of ".len()..])
    } else if lower.starts_with("over ") {
        (NotePlacement::Over, &rest["over ".len()..])
    } else {
        return None;
    };

    let (actor_part, text) = match after.split_once(':') {
        Some((actors, text)) => (actors, text.trim()),
        None => (after, ""),
    };
    let actors: Vec<String> = actor_part
        .split(',')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    if actors.is_empty() {
        return None;
    }

    Some(Note {
        placement,
        actors,
        text: text.to_string(),
        source_line: line_no,
    })
}

fn declare(
    model: &mut DiagramModel,
    current_box: Option<usize>,
    rest: &str,
    kind: EntityKind,
) -> String {
    let (id, alias) = split_alias(rest);
    let joined_box = {
        let entity = model.ensure_entity(&id, kind);
        entity.kind = kind;
        if let Some(alias) = alias {
            entity.display_name = alias;
        }
        if entity.group.is_none() {
            entity.group = current_box;
            current_box
        } else {
            None
        }
    };
    if let Some(group) = joined_box {
        model.groups[group].members.push(id.clone());
    }
    id
}

pub fn parse_sequence(code: &str) -> DiagramModel {
    let mut model = DiagramModel::new("sequence");
    let mut blocks = BlockState::default();
    let mut current_box: Option<usize> = None;

    let lines: Vec<&str> = code.lines().collect();
    let mut i = 0usize;
    while i < lines.len() {
        let line_no = i + 1;
        let t = lines[i].trim();
        if t.is_empty() {
            i += 1;
            continue;
        }
        if is_comment_line(t) {
            if let Some(text) = comment_text(t) {
                model.comments.push(Comment {
                    text: text.to_string(),
                    source_line: line_no,
                });
            }
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

        if t.eq_ignore_ascii_case("sequenceDiagram") {
            i += 1;
            continue;
        }
        if let Some(v) = parse_keyword_arg_one_ws(t, "title").or_else(|| parse_key_colon_value(t, "title")) {
            model.title = Some(v);
            i += 1;
            continue;
        }
        if keyword_rest(t, "autonumber").is_some() {
            model.autonumber = true;
            i += 1;
            continue;
        }

        if t.eq_ignore_ascii_case("end") {
            if blocks.is_active() {
                blocks.try_close(line_no, &mut model.blocks);
            } else if current_box.is_some() {
                current_box = None;
            } else {
                tracing::debug!(line = line_no, "stray end");
            }
            i += 1;
            continue;
        }
        if blocks.try_open(t, line_no) || blocks.try_branch(t, line_no) {
            i += 1;
            continue;
        }

        if let Some(rest) = parse_keyword_arg_one_ws(t, "box") {
            model.groups.push(Group {
                name: rest,
                members: Vec::new(),
            });
            current_box = Some(model.groups.len() - 1);
            i += 1;
            continue;
        }

        if let Some(rest) = parse_keyword_arg_one_ws(t, "create") {
            let id = if let Some(decl) = parse_keyword_arg_one_ws(&rest, "participant") {
                declare(&mut model, current_box, &decl, EntityKind::Participant)
            } else if let Some(decl) = parse_keyword_arg_one_ws(&rest, "actor") {
                declare(&mut model, current_box, &decl, EntityKind::Actor)
            } else {
                declare(&mut model, current_box, &rest, EntityKind::Participant)
            };
            if let Some(entity) = model.entities.get_mut(&id) {
                entity.created = true;
            }
            model.lifecycle.push(LifecycleEvent {
                kind: LifecycleKind::Create,
                actor: id,
                source_line: line_no,
            });
            i += 1;
            continue;
        }
        if let Some(rest) = parse_keyword_arg_one_ws(t, "destroy") {
            let id = strip_quotes(rest.trim()).to_string();
            model.ensure_entity(&id, EntityKind::Participant).destroyed = true;
            model.lifecycle.push(LifecycleEvent {
                kind: LifecycleKind::Destroy,
                actor: id,
                source_line: line_no,
            });
            i += 1;
            continue;
        }
        if let Some(rest) = parse_keyword_arg_one_ws(t, "participant") {
            declare(&mut model, current_box, &rest, EntityKind::Participant);
            i += 1;
            continue;
        }
        if let Some(rest) = parse_keyword_arg_one_ws(t, "actor") {
            declare(&mut model, current_box, &rest, EntityKind::Actor);
            i += 1;
            continue;
        }
        if let Some(rest) = parse_keyword_arg_one_ws(t, "activate") {
            model.lifecycle.push(LifecycleEvent {
                kind: LifecycleKind::Activate,
                actor: strip_quotes(rest.trim()).to_string(),
                source_line: line_no,
            });
            i += 1;
            continue;
        }
        if let Some(rest) = parse_keyword_arg_one_ws(t, "deactivate") {
            model.lifecycle.push(LifecycleEvent {
                kind: LifecycleKind::Deactivate,
                actor: strip_quotes(rest.trim()).to_string(),
                source_line: line_no,
            });
            i += 1;
            continue;
        }
        if let Some(note) = parse_note(t, line_no) {
            model.notes.push(note);
            i += 1;
            continue;
        }

        if let Some(message) = parse_message(t) {
            let index = model.push_relation(
                Relation {
                    source: message.source.clone(),
                    target: message.target.clone(),
                    label: message.text,
                    flags: message.flags,
                    source_line: line_no,
                },
                EntityKind::Participant,
            );
            blocks.attribute(index);
            if message.activate_target {
                model.lifecycle.push(LifecycleEvent {
                    kind: LifecycleKind::Activate,
                    actor: message.target,
                    source_line: line_no,
                });
            }
            if message.deactivate_source {
                model.lifecycle.push(LifecycleEvent {
                    kind: LifecycleKind::Deactivate,
                    actor: message.source,
                    source_line: line_no,
                });
            }
            i += 1;
            continue;
        }

        tracing::debug!(line = t, "unrecognized sequence statement");
        i += 1;
    }

    blocks.finish(&mut model.blocks, lines.len());
    reattribute_early_exit(&mut model);
    reclassify_decision_entities(&mut model);
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlockKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn declarations_set_kind_and_alias() {
        let model = parse_sequence(
            "sequenceDiagram\nparticipant WA as Web App\nactor U as User\nU->>WA: Open\n",
        );
        assert_eq!(model.entities["WA"].kind, EntityKind::Participant);
        assert_eq!(model.display_name("WA"), "Web App");
        assert_eq!(model.entities["U"].kind, EntityKind::Actor);
        assert_eq!(model.display_name("U"), "User");
    }

    #[test]
    fn message_endpoints_are_synthesized_when_undeclared() {
        let model = parse_sequence("sequenceDiagram\nAlice->>Bob: Hello\n");
        assert!(model.entities.contains_key("Alice"));
        assert!(model.entities.contains_key("Bob"));
        assert_eq!(model.entities["Alice"].kind, EntityKind::Participant);
        assert_eq!(model.relations.len(), 1);
        assert_eq!(model.relations[0].label, "Hello");
    }

    #[test]
    fn arrow_variants_map_to_style_flags() {
        let model = parse_sequence(
            "sequenceDiagram\nA->>B: solid\nB-->>A: reply\nA-)B: fire\nA-xB: err\nA<<->>B: both\n",
        );
        let flags: Vec<_> = model.relations.iter().map(|r| r.flags).collect();
        assert!(!flags[0].is_response && !flags[0].is_async);
        assert!(flags[1].is_response);
        assert!(flags[2].is_async);
        assert!(flags[3].is_error);
        assert!(flags[4].is_bidirectional);
    }

    #[test]
    fn activation_shorthand_emits_lifecycle_events() {
        let model = parse_sequence(
            "sequenceDiagram\nAlice->>+John: Hello\nJohn-->>-Alice: Great\n",
        );
        let kinds: Vec<_> = model
            .lifecycle
            .iter()
            .map(|e| (e.kind, e.actor.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (LifecycleKind::Activate, "John"),
                (LifecycleKind::Deactivate, "John"),
            ]
        );
    }

    #[test]
    fn explicit_activate_deactivate_lines() {
        let model = parse_sequence(
            "sequenceDiagram\nactivate A\nA->>B: hi\ndeactivate A\n",
        );
        assert_eq!(model.lifecycle.len(), 2);
        assert_eq!(model.lifecycle[0].kind, LifecycleKind::Activate);
        assert_eq!(model.lifecycle[1].kind, LifecycleKind::Deactivate);
    }

    #[test]
    fn create_and_destroy_mark_entities_and_events() {
        let model = parse_sequence(
            "sequenceDiagram\nAlice->>Bob: Hi\ncreate participant Carl\nAlice->>Carl: Welcome\ndestroy Carl\nAlice->>Bob: Done\n",
        );
        assert!(model.entities["Carl"].created);
        assert!(model.entities["Carl"].destroyed);
        let kinds: Vec<_> = model.lifecycle.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![LifecycleKind::Create, LifecycleKind::Destroy]);
    }

    #[test]
    fn notes_parse_placement_actors_and_text() {
        let model = parse_sequence(
            "sequenceDiagram\nNote right of Alice: typing\nNote over Alice,Bob: both\n",
        );
        assert_eq!(model.notes.len(), 2);
        assert_eq!(model.notes[0].placement, NotePlacement::RightOf);
        assert_eq!(model.notes[0].actors, vec!["Alice"]);
        assert_eq!(model.notes[0].text, "typing");
        assert_eq!(model.notes[1].placement, NotePlacement::Over);
        assert_eq!(model.notes[1].actors, vec!["Alice", "Bob"]);
    }

    #[test]
    fn box_groups_participants_and_its_end_is_not_a_block_end() {
        let model = parse_sequence(
            "sequenceDiagram\nbox Payment Team\nparticipant P1\nparticipant P2\nend\nP1->>P2: settle\n",
        );
        assert_eq!(model.groups.len(), 1);
        assert_eq!(model.groups[0].name, "Payment Team");
        assert_eq!(model.groups[0].members, vec!["P1", "P2"]);
        assert!(model.blocks.is_empty());
    }

    #[test]
    fn alt_block_owns_its_message_not_the_top_level() {
        let model = parse_sequence(
            "sequenceDiagram\nparticipant X\nactor Y\nY->>X: Hello\nalt ok\nY->>X: Bye\nend\n",
        );
        assert_eq!(model.relations.len(), 2);
        assert_eq!(model.blocks.len(), 1);
        let BlockKind::Conditional { branches } = &model.blocks[0].kind else {
            panic!("expected conditional");
        };
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].condition, "ok");
        assert_eq!(branches[0].relations, vec![1]);
        // "Hello" stays top-level.
        assert_eq!(model.unblocked_relations(), vec![0]);
    }

    #[test]
    fn block_containment_holds_for_attributed_relations() {
        let model = parse_sequence(
            "sequenceDiagram\nA->>B: one\nloop every minute\nA->>B: poll\nB-->>A: pong\nend\n",
        );
        let block = &model.blocks[0];
        for &index in crate::model::block_relation_indices(block).iter() {
            let line = model.relations[index].source_line;
            assert!(block.span.contains(line));
        }
    }

    #[test]
    fn comments_are_kept_with_their_lines() {
        let model = parse_sequence(
            "sequenceDiagram\n%% check the retry flow\nA->>B: go\n%%{init: {}}%%\n",
        );
        assert_eq!(model.comments.len(), 1);
        assert_eq!(model.comments[0].text, "check the retry flow");
        assert_eq!(model.comments[0].source_line, 2);
    }

    #[test]
    fn autonumber_and_title_are_recorded() {
        let model = parse_sequence("sequenceDiagram\nautonumber\ntitle Checkout\nA->>B: pay\n");
        assert!(model.autonumber);
        assert_eq!(model.title.as_deref(), Some("Checkout"));
    }

    #[test]
    fn reserved_words_never_become_endpoints() {
        let model = parse_sequence("sequenceDiagram\nend->>B: nope\n");
        assert!(model.relations.is_empty());
        assert!(!model.entities.contains_key("end"));
    }

    #[test]
    fn parse_is_idempotent() {
        let code = "sequenceDiagram\nparticipant X\nactor Y\nY->>X: Hello\nalt ok\nY->>X: Bye\nend\n";
        assert_eq!(parse_sequence(code), parse_sequence(code));
    }
}
