/// Read-only view of an already-rendered visual tree.
///
/// Supplied by the rendering surface and consulted only as a fallback for
/// counting entities when source-text counting is ambiguous (for example, a
/// diagram whose declarations all failed pattern extraction). The tree is
/// queried by descendant selection and never mutated.
pub trait RenderedDiagram {
    fn descendant_count(&self, selector: &str) -> usize;
}

/// Selector used for the node-count fallback.
pub const NODE_SELECTOR: &str = ".node";
