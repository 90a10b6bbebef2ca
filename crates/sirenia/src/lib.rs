#![forbid(unsafe_code)]

//! Diagram-source parser + accessible-description synthesis (headless).
//!
//! Design goals:
//! - total input tolerance: a caption always comes back, never an error
//! - deterministic, testable outputs (model and description equality)
//! - no I/O, no shared state; every call is a pure function of its input
//!
//! The diagram type is resolved by an external classifier and passed in as a
//! tag; [`Describer::describe`] looks up the matching parser + generator
//! triple and falls back to a generic template for unknown tags.

pub mod diagrams;
mod directive;
mod error;
pub mod heuristics;
mod model;
mod registry;
mod rendered;
pub mod text;

pub use error::{Error, Result};
pub use model::{
    Block, BlockKind, Branch, Comment, Description, DiagramModel, Entity, EntityKind, Group,
    LifecycleEvent, LifecycleKind, LineSpan, Note, NotePlacement, Relation, Section, SectionStep,
    StyleFlags,
};
pub use registry::{
    DescriptionGenerator, DiagramSupport, GeneratorRegistry, GeneratorSet, ModelParser,
    generic_description,
};
pub use rendered::{NODE_SELECTOR, RenderedDiagram};

/// Description engine: a registry of per-dialect parser + generator triples
/// behind one lookup-and-describe entry point.
#[derive(Debug, Clone)]
pub struct Describer {
    registry: GeneratorRegistry,
}

impl Default for Describer {
    fn default() -> Self {
        Self {
            registry: GeneratorRegistry::with_builtin_diagrams(),
        }
    }
}

impl Describer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine over a caller-assembled registry; the extension point for
    /// plugging in additional dialects without touching the built-ins.
    pub fn with_registry(registry: GeneratorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut GeneratorRegistry {
        &mut self.registry
    }

    /// Parses the semantic model for a known diagram type. `None` when no
    /// parser is registered for the tag.
    pub fn parse_model(&self, diagram_type: &str, code: &str) -> Option<DiagramModel> {
        let support = self.registry.get(diagram_type)?;
        Some((support.parse)(code))
    }

    pub fn describe(&self, diagram_type: &str, code: &str) -> Description {
        self.describe_with(diagram_type, code, None)
    }

    /// Like [`Describer::describe`], with an optional rendered visual tree
    /// consulted only when source-text entity counting comes up empty.
    pub fn describe_with(
        &self,
        diagram_type: &str,
        code: &str,
        rendered: Option<&dyn RenderedDiagram>,
    ) -> Description {
        let Some(support) = self.registry.get(diagram_type) else {
            tracing::debug!(diagram_type, "no generator registered, using generic fallback");
            let node_count = rendered.map(|tree| tree.descendant_count(NODE_SELECTOR));
            return generic_description(diagram_type, node_count);
        };

        let model = (support.parse)(code);

        if model.entities.is_empty() && model.sections.is_empty() {
            if let Some(tree) = rendered {
                let count = tree.descendant_count(NODE_SELECTOR);
                if count > 0 {
                    tracing::debug!(
                        diagram_type,
                        count,
                        "source-text counting came up empty, using rendered node count"
                    );
                    let description = generic_description(diagram_type, Some(count));
                    return directive::apply_directive_overrides(&model, description);
                }
            }
        }

        let description = Description {
            short: (support.generators.short)(&model),
            short_html: (support.generators.short_html)(&model),
            detailed: (support.generators.detailed)(&model),
        };
        directive::apply_directive_overrides(&model, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTree(usize);

    impl RenderedDiagram for FixedTree {
        fn descendant_count(&self, _selector: &str) -> usize {
            self.0
        }
    }

    #[test]
    fn describe_produces_all_three_artifacts() {
        let describer = Describer::new();
        let description = describer.describe("flowchart", "flowchart TD\nA[Start] --> B[Stop]\n");
        assert!(description.short.contains("Flowchart"));
        assert!(description.short_html.contains("<strong>"));
        assert!(description.detailed.contains("<h3>Overview</h3>"));
    }

    #[test]
    fn unknown_tag_falls_back_to_generic_template() {
        let describer = Describer::new();
        let description = describer.describe("mindmap", "mindmap\n  root\n");
        assert!(!description.detailed.is_empty());
        assert!(description.detailed.contains("mindmap"));
        assert!(description.short.contains("mindmap"));
    }

    #[test]
    fn rendered_tree_supplies_counts_when_extraction_finds_nothing() {
        let describer = Describer::new();
        let description =
            describer.describe_with("flowchart", "flowchart TD\n<<garbage>>\n", Some(&FixedTree(6)));
        assert!(description.short.contains("six elements"));
    }

    #[test]
    fn rendered_tree_is_ignored_when_extraction_succeeds() {
        let describer = Describer::new();
        let description =
            describer.describe_with("flowchart", "flowchart TD\nA --> B\n", Some(&FixedTree(99)));
        assert!(description.short.contains("two steps"));
    }

    #[test]
    fn title_directive_overrides_the_short_description_verbatim() {
        let describer = Describer::new();
        let description = describer.describe(
            "flowchart",
            "flowchart TD\naccTitle: Exact caption text\nA --> B\n",
        );
        assert_eq!(description.short, "Exact caption text");
    }

    #[test]
    fn description_directive_overrides_the_detailed_text() {
        let describer = Describer::new();
        let description = describer.describe(
            "sequence",
            "sequenceDiagram\naccDescr: Hand-written long description.\nA->>B: hi\n",
        );
        assert_eq!(description.detailed, "<p>Hand-written long description.</p>");
    }

    #[test]
    fn repeated_describe_calls_are_identical() {
        let describer = Describer::new();
        let code = "sequenceDiagram\nparticipant X\nactor Y\nY->>X: Hello\nalt ok\nY->>X: Bye\nend\n";
        assert_eq!(
            describer.describe("sequence", code),
            describer.describe("sequence", code)
        );
        assert_eq!(
            describer.parse_model("sequence", code),
            describer.parse_model("sequence", code)
        );
    }
}
