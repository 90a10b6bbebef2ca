use indexmap::IndexMap;
use serde::Serialize;

/// Kind tag for a named thing in a diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Actor,
    Participant,
    Node,
    Task,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub display_name: String,
    pub kind: EntityKind,
    pub is_decision: bool,
    /// Indices into `DiagramModel::relations`, in discovery order.
    pub outgoing: Vec<usize>,
    /// Index into `DiagramModel::groups`, when the entity was declared inside one.
    pub group: Option<usize>,
    pub created: bool,
    pub destroyed: bool,
}

impl Entity {
    pub fn new(id: &str, kind: EntityKind) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
            kind,
            is_decision: false,
            outgoing: Vec::new(),
            group: None,
            created: false,
            destroyed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleFlags {
    pub is_response: bool,
    pub is_async: bool,
    pub is_error: bool,
    pub is_bidirectional: bool,
    pub is_dotted: bool,
    pub is_thick: bool,
}

/// A directed edge or message. Immutable once created; `source_line` is 1-based
/// and drives block attribution and chronological ordering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub label: String,
    pub flags: StyleFlags,
    pub source_line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSpan {
    pub open: usize,
    pub close: usize,
}

impl LineSpan {
    pub fn contains(&self, line: usize) -> bool {
        line > self.open && line < self.close
    }

    /// Whether `other` lies strictly inside this span.
    pub fn encloses(&self, other: &LineSpan) -> bool {
        self.open < other.open && other.close <= self.close
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub condition: String,
    /// Indices into `DiagramModel::relations`.
    pub relations: Vec<usize>,
    /// Line of the branch's opening or separator marker; nested blocks are
    /// assigned to branches by comparing open lines.
    pub open_line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BlockKind {
    /// `alt` with one branch per `else`.
    Conditional { branches: Vec<Branch> },
    /// `opt`.
    Optional { condition: String, relations: Vec<usize> },
    /// `loop`.
    Loop { condition: String, relations: Vec<usize> },
    /// `critical` with zero or more `option` branches.
    Critical {
        condition: String,
        relations: Vec<usize>,
        options: Vec<Branch>,
    },
    /// `par` with one named branch per `and`. May nest inside itself.
    Parallel { branches: Vec<Branch> },
    /// `break`.
    EarlyExit { condition: String, relations: Vec<usize> },
}

/// A nested annotation region. Blocks are stored flat in open order; nesting is
/// recovered from span containment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(flatten)]
    pub kind: BlockKind,
    pub span: LineSpan,
}

/// Named grouping of entities: flowchart `subgraph`, sequence `box`,
/// timeline/journey `section`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotePlacement {
    LeftOf,
    RightOf,
    Over,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub placement: NotePlacement,
    pub actors: Vec<String>,
    pub text: String,
    pub source_line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleKind {
    Create,
    Destroy,
    Activate,
    Deactivate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub kind: LifecycleKind,
    pub actor: String,
    pub source_line: usize,
}

/// A `%%` source comment kept for the developer-comments narrative section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub text: String,
    pub source_line: usize,
}

/// One chronological step of a timeline period or journey task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStep {
    pub name: String,
    pub events: Vec<String>,
    pub score: Option<i64>,
    pub people: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub name: String,
    pub steps: Vec<SectionStep>,
}

/// The complete structured representation of one diagram. Built once per
/// description request; treated as immutable once synthesis begins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramModel {
    pub diagram_type: String,
    pub title: Option<String>,
    pub acc_title: Option<String>,
    pub acc_descr: Option<String>,
    pub direction: Option<String>,
    pub entities: IndexMap<String, Entity>,
    pub relations: Vec<Relation>,
    pub blocks: Vec<Block>,
    pub groups: Vec<Group>,
    pub notes: Vec<Note>,
    pub lifecycle: Vec<LifecycleEvent>,
    pub comments: Vec<Comment>,
    pub sections: Vec<Section>,
    pub autonumber: bool,
}

impl DiagramModel {
    pub fn new(diagram_type: &str) -> Self {
        Self {
            diagram_type: diagram_type.to_string(),
            title: None,
            acc_title: None,
            acc_descr: None,
            direction: None,
            entities: IndexMap::new(),
            relations: Vec::new(),
            blocks: Vec::new(),
            groups: Vec::new(),
            notes: Vec::new(),
            lifecycle: Vec::new(),
            comments: Vec::new(),
            sections: Vec::new(),
            autonumber: false,
        }
    }

    /// Returns the entity for `id`, synthesizing a minimal record on first
    /// reference. Entities are never deleted afterwards.
    pub fn ensure_entity(&mut self, id: &str, kind: EntityKind) -> &mut Entity {
        self.entities
            .entry(id.to_string())
            .or_insert_with(|| Entity::new(id, kind))
    }

    /// Appends a relation and links it from its source entity, synthesizing
    /// missing endpoints. Returns the relation's index.
    pub fn push_relation(&mut self, relation: Relation, endpoint_kind: EntityKind) -> usize {
        let index = self.relations.len();
        self.ensure_entity(&relation.target, endpoint_kind);
        self.ensure_entity(&relation.source, endpoint_kind)
            .outgoing
            .push(index);
        self.relations.push(relation);
        index
    }

    /// Presentation name for an id: the alias/display name when declared, the
    /// raw id otherwise.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.entities
            .get(id)
            .map(|e| e.display_name.as_str())
            .unwrap_or(id)
    }

    pub fn count_of_kind(&self, kind: EntityKind) -> usize {
        self.entities.values().filter(|e| e.kind == kind).count()
    }

    /// Relation indices not owned by any block (top-level narration order).
    pub fn unblocked_relations(&self) -> Vec<usize> {
        let owned = self.block_owned_relations();
        (0..self.relations.len())
            .filter(|i| !owned.contains(i))
            .collect()
    }

    pub fn block_owned_relations(&self) -> rustc_hash::FxHashSet<usize> {
        let mut owned = rustc_hash::FxHashSet::default();
        for block in &self.blocks {
            for index in block_relation_indices(block) {
                owned.insert(index);
            }
        }
        owned
    }
}

pub(crate) fn block_relation_indices(block: &Block) -> Vec<usize> {
    match &block.kind {
        BlockKind::Conditional { branches } | BlockKind::Parallel { branches } => {
            branches.iter().flat_map(|b| b.relations.clone()).collect()
        }
        BlockKind::Optional { relations, .. }
        | BlockKind::Loop { relations, .. }
        | BlockKind::EarlyExit { relations, .. } => relations.clone(),
        BlockKind::Critical {
            relations, options, ..
        } => {
            let mut out = relations.clone();
            out.extend(options.iter().flat_map(|o| o.relations.clone()));
            out
        }
    }
}

/// Reclassifies entities as decision points once all relations are known: two
/// or more outgoing relations, every one carrying a non-empty label, marks the
/// entity `is_decision` even absent an explicit declaration.
pub(crate) fn reclassify_decision_entities(model: &mut DiagramModel) {
    let relations = &model.relations;
    for entity in model.entities.values_mut() {
        if entity.outgoing.len() >= 2
            && entity
                .outgoing
                .iter()
                .all(|&i| !relations[i].label.trim().is_empty())
        {
            entity.is_decision = true;
        }
    }
}

/// The two narrative artifacts produced per diagram, plus the HTML-annotated
/// short variant. Produced fresh per request; never cached here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    pub short: String,
    pub short_html: String,
    pub detailed: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_entity_synthesizes_once_and_keeps_order() {
        let mut model = DiagramModel::new("flowchart");
        model.ensure_entity("B", EntityKind::Node);
        model.ensure_entity("A", EntityKind::Node);
        model.ensure_entity("B", EntityKind::Node).display_name = "Bee".to_string();

        let ids: Vec<&str> = model.entities.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert_eq!(model.display_name("B"), "Bee");
        assert_eq!(model.display_name("missing"), "missing");
    }

    #[test]
    fn push_relation_links_outgoing_and_synthesizes_endpoints() {
        let mut model = DiagramModel::new("flowchart");
        let index = model.push_relation(
            Relation {
                source: "A".to_string(),
                target: "B".to_string(),
                label: String::new(),
                flags: StyleFlags::default(),
                source_line: 2,
            },
            EntityKind::Node,
        );

        assert_eq!(index, 0);
        assert!(model.entities.contains_key("A"));
        assert!(model.entities.contains_key("B"));
        assert_eq!(model.entities["A"].outgoing, vec![0]);
        assert!(model.entities["B"].outgoing.is_empty());
    }

    #[test]
    fn span_containment_is_strict_on_open() {
        let outer = LineSpan { open: 2, close: 10 };
        let inner = LineSpan { open: 3, close: 9 };
        assert!(outer.encloses(&inner));
        assert!(!inner.encloses(&outer));
        assert!(!outer.encloses(&outer));
        assert!(outer.contains(5));
        assert!(!outer.contains(2));
        assert!(!outer.contains(10));
    }

    #[test]
    fn model_serializes_with_camel_case_keys() {
        let mut model = DiagramModel::new("sequence");
        model.ensure_entity("A", EntityKind::Actor);
        model.push_relation(
            Relation {
                source: "A".to_string(),
                target: "B".to_string(),
                label: "hi".to_string(),
                flags: StyleFlags::default(),
                source_line: 2,
            },
            EntityKind::Participant,
        );

        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(value["diagramType"], "sequence");
        assert_eq!(value["entities"]["A"]["displayName"], "A");
        assert_eq!(value["entities"]["A"]["kind"], "actor");
        assert_eq!(value["relations"][0]["sourceLine"], 2);
        assert_eq!(value["relations"][0]["flags"]["isResponse"], false);
    }

    #[test]
    fn unblocked_relations_excludes_block_owned() {
        let mut model = DiagramModel::new("sequence");
        for line in [2, 3, 4] {
            model.push_relation(
                Relation {
                    source: "A".to_string(),
                    target: "B".to_string(),
                    label: format!("m{line}"),
                    flags: StyleFlags::default(),
                    source_line: line,
                },
                EntityKind::Participant,
            );
        }
        model.blocks.push(Block {
            kind: BlockKind::Loop {
                condition: "retry".to_string(),
                relations: vec![1],
            },
            span: LineSpan { open: 2, close: 4 },
        });

        assert_eq!(model.unblocked_relations(), vec![0, 2]);
    }
}
