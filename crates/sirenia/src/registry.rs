use std::collections::HashMap;

use crate::model::{Description, DiagramModel};
use crate::text::{ShortText, escape_html};

pub type ModelParser = fn(code: &str) -> DiagramModel;
pub type DescriptionGenerator = fn(model: &DiagramModel) -> String;

/// The generator triple consumed by the presentation layer.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorSet {
    pub short: DescriptionGenerator,
    pub short_html: DescriptionGenerator,
    pub detailed: DescriptionGenerator,
}

#[derive(Debug, Clone, Copy)]
pub struct DiagramSupport {
    pub parse: ModelParser,
    pub generators: GeneratorSet,
}

/// Maps a diagram-type tag to its parser + generator triple.
///
/// Registration is idempotent per tag: a later registration replaces the
/// earlier one. Lookup misses are not errors; callers fall back to
/// [`generic_description`], so a description always exists for any
/// recognized-or-not diagram type.
#[derive(Debug, Clone, Default)]
pub struct GeneratorRegistry {
    entries: HashMap<&'static str, DiagramSupport>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, diagram_type: &'static str, support: DiagramSupport) {
        self.entries.insert(diagram_type, support);
    }

    pub fn get(&self, diagram_type: &str) -> Option<DiagramSupport> {
        self.entries.get(diagram_type).copied()
    }

    /// Registry with every built-in dialect plugged in, aliases included.
    pub fn with_builtin_diagrams() -> Self {
        let mut reg = Self::new();

        let flowchart = DiagramSupport {
            parse: crate::diagrams::flowchart::parse_flowchart,
            generators: GeneratorSet {
                short: crate::diagrams::flowchart::flowchart_short,
                short_html: crate::diagrams::flowchart::flowchart_short_html,
                detailed: crate::diagrams::flowchart::flowchart_detailed,
            },
        };
        reg.register("flowchart", flowchart);
        reg.register("graph", flowchart);

        let sequence = DiagramSupport {
            parse: crate::diagrams::sequence::parse_sequence,
            generators: GeneratorSet {
                short: crate::diagrams::sequence::sequence_short,
                short_html: crate::diagrams::sequence::sequence_short_html,
                detailed: crate::diagrams::sequence::sequence_detailed,
            },
        };
        reg.register("sequence", sequence);
        reg.register("sequenceDiagram", sequence);

        reg.register(
            "timeline",
            DiagramSupport {
                parse: crate::diagrams::timeline::parse_timeline,
                generators: GeneratorSet {
                    short: crate::diagrams::timeline::timeline_short,
                    short_html: crate::diagrams::timeline::timeline_short_html,
                    detailed: crate::diagrams::timeline::timeline_detailed,
                },
            },
        );

        reg.register(
            "journey",
            DiagramSupport {
                parse: crate::diagrams::journey::parse_journey,
                generators: GeneratorSet {
                    short: crate::diagrams::journey::journey_short,
                    short_html: crate::diagrams::journey::journey_short_html,
                    detailed: crate::diagrams::journey::journey_detailed,
                },
            },
        );

        reg
    }
}

/// Template fallback for diagram types without a registered generator. The
/// rendered-tree node count, when supplied, stands in for source-text entity
/// counting.
pub fn generic_description(diagram_type: &str, node_count: Option<usize>) -> Description {
    let kind = if diagram_type.trim().is_empty() {
        "diagram"
    } else {
        diagram_type.trim()
    };

    let mut short = ShortText::new().text("A ").emph(kind).text(" diagram");
    if let Some(count) = node_count.filter(|c| *c > 0) {
        short = short
            .text(" with ")
            .strong(crate::text::count_phrase(count, "element"))
            .text(".");
    } else {
        short = short.text(".");
    }

    let detailed = format!(
        "<h3>Overview</h3><p>This is a {} diagram. A structured description \
         is not available for this diagram type; refer to the rendered image \
         for its content.</p>",
        escape_html(kind)
    );

    Description {
        short: short.render_plain(),
        short_html: short.render_html(),
        detailed,
    }
}
