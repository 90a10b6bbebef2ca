//! Deterministic narration order for a flowchart graph, tolerant of cycles and
//! disconnected components. This stage never fails; worst case it produces an
//! order that does not reflect true topological precedence, which is an
//! inherent limitation of narrating cyclic graphs linearly.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use crate::model::{DiagramModel, Entity};

/// Safety bound for the breadth-first walk. A deliberate cap, not an error
/// path; exceeding it truncates the ordering.
/// TODO(tuning): revisit whether this should scale with graph size if real
/// diagrams ever approach it.
pub(crate) const MAX_TRAVERSAL_STEPS: usize = 1000;

/// Conventional "first" node id; always narrated first when it is a start
/// candidate.
pub(crate) const SENTINEL_START_ID: &str = "A";

fn start_rank(id: &str) -> u8 {
    if id == SENTINEL_START_ID {
        0
    } else if id.starts_with(SENTINEL_START_ID) {
        1
    } else {
        2
    }
}

fn edge_rank(label: &str) -> u8 {
    let label = label.trim();
    if label.is_empty() {
        0
    } else if label.eq_ignore_ascii_case("no") {
        1
    } else if label.eq_ignore_ascii_case("yes") {
        2
    } else {
        3
    }
}

/// Outgoing relation indices in the fixed narration tie-break order:
/// unlabeled before "No" before "Yes" before other labels alphabetically,
/// target id as the final key.
pub(super) fn ordered_outgoing(model: &DiagramModel, entity: &Entity) -> Vec<usize> {
    let mut outgoing = entity.outgoing.clone();
    outgoing.sort_by(|&a, &b| {
        let (ra, rb) = (&model.relations[a], &model.relations[b]);
        edge_rank(&ra.label)
            .cmp(&edge_rank(&rb.label))
            .then_with(|| ra.label.cmp(&rb.label))
            .then_with(|| ra.target.cmp(&rb.target))
    });
    outgoing
}

fn fallback_start<'a>(model: &'a DiagramModel) -> Option<&'a str> {
    let keyword_start = model.entities.values().find(|e| {
        let lower = e.display_name.to_ascii_lowercase();
        lower.contains("start") || lower.contains("begin")
    });
    if let Some(entity) = keyword_start {
        return Some(entity.id.as_str());
    }
    if model.entities.contains_key(SENTINEL_START_ID) {
        return Some(SENTINEL_START_ID);
    }
    model.entities.keys().map(String::as_str).min()
}

/// Produces the narration order over all entities: BFS from the ordered start
/// set, then any never-reached entity appended in id order.
pub(crate) fn linearize(model: &DiagramModel) -> Vec<String> {
    if model.entities.is_empty() {
        return Vec::new();
    }

    let mut has_incoming: FxHashSet<&str> = FxHashSet::default();
    for relation in &model.relations {
        has_incoming.insert(relation.target.as_str());
    }

    let mut candidates: Vec<&str> = model
        .entities
        .keys()
        .map(String::as_str)
        .filter(|id| !has_incoming.contains(id))
        .collect();
    candidates.sort_by(|a, b| start_rank(a).cmp(&start_rank(b)).then(a.cmp(b)));

    let mut queue: VecDeque<&str> = VecDeque::new();
    let mut visited: FxHashSet<&str> = FxHashSet::default();
    if candidates.is_empty() {
        if let Some(id) = fallback_start(model) {
            queue.push_back(id);
            visited.insert(id);
        }
    } else {
        for id in candidates {
            queue.push_back(id);
            visited.insert(id);
        }
    }

    let mut order: Vec<String> = Vec::with_capacity(model.entities.len());
    let mut steps = 0usize;
    while let Some(id) = queue.pop_front() {
        steps += 1;
        if steps > MAX_TRAVERSAL_STEPS {
            tracing::debug!(cap = MAX_TRAVERSAL_STEPS, "traversal cap hit, truncating order");
            break;
        }
        order.push(id.to_string());

        let Some(entity) = model.entities.get(id) else {
            continue;
        };
        for index in ordered_outgoing(model, entity) {
            let target = model.relations[index].target.as_str();
            if visited.insert(target) {
                queue.push_back(target);
            }
        }
    }

    let mut unreached: Vec<&str> = model
        .entities
        .keys()
        .map(String::as_str)
        .filter(|id| !order.iter().any(|seen| seen == id))
        .collect();
    unreached.sort_unstable();
    order.extend(unreached.into_iter().map(str::to_string));

    order
}
