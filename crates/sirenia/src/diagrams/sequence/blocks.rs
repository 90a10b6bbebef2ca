//! Stack-based recognition of nested annotation regions.
//!
//! The parser state is an explicit object threaded through the line scan, with
//! the open-block stack as an explicit field. Attribution always targets the
//! innermost open block, so a relation lands in at most one block. Nesting
//! (including parallel-within-parallel) is recovered later from span
//! containment.

use crate::directive::keyword_rest;
use crate::model::{Block, BlockKind, Branch, DiagramModel, LineSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenKind {
    Conditional,
    Optional,
    Loop,
    Critical,
    Parallel,
    EarlyExit,
    /// `rect` highlight region: consumes a matching `end` but is never
    /// narrated and never owns relations.
    Rect,
}

#[derive(Debug)]
struct OpenBlock {
    kind: OpenKind,
    open_line: usize,
    condition: String,
    branches: Vec<Branch>,
    relations: Vec<usize>,
    in_option: bool,
}

impl OpenBlock {
    fn new(kind: OpenKind, condition: String, open_line: usize) -> Self {
        let branches = match kind {
            OpenKind::Conditional | OpenKind::Parallel => vec![Branch {
                condition: condition.clone(),
                relations: Vec::new(),
                open_line,
            }],
            _ => Vec::new(),
        };
        Self {
            kind,
            open_line,
            condition,
            branches,
            relations: Vec::new(),
            in_option: false,
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct BlockState {
    stack: Vec<OpenBlock>,
}

impl BlockState {
    pub(super) fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Opening markers. Returns true when the line was consumed.
    pub(super) fn try_open(&mut self, line: &str, line_no: usize) -> bool {
        let openers: [(&str, OpenKind); 7] = [
            ("alt", OpenKind::Conditional),
            ("opt", OpenKind::Optional),
            ("loop", OpenKind::Loop),
            ("critical", OpenKind::Critical),
            ("par", OpenKind::Parallel),
            ("break", OpenKind::EarlyExit),
            ("rect", OpenKind::Rect),
        ];
        for (keyword, kind) in openers {
            if let Some(rest) = keyword_rest(line, keyword) {
                self.stack.push(OpenBlock::new(kind, rest, line_no));
                return true;
            }
        }
        false
    }

    /// Branch separators (`else` / `and` / `option`): append a branch to the
    /// current block without closing it.
    pub(super) fn try_branch(&mut self, line: &str, line_no: usize) -> bool {
        let (condition, expected) = if let Some(rest) = keyword_rest(line, "else") {
            (rest, OpenKind::Conditional)
        } else if let Some(rest) = keyword_rest(line, "and") {
            (rest, OpenKind::Parallel)
        } else if let Some(rest) = keyword_rest(line, "option") {
            (rest, OpenKind::Critical)
        } else {
            return false;
        };

        let Some(top) = self.stack.last_mut() else {
            tracing::debug!(line, "branch separator outside any block");
            return true;
        };
        if top.kind != expected {
            tracing::debug!(line, "branch separator does not match the open block");
            return true;
        }
        top.branches.push(Branch {
            condition,
            relations: Vec::new(),
            open_line: line_no,
        });
        if top.kind == OpenKind::Critical {
            top.in_option = true;
        }
        true
    }

    /// Closing `end`: pops the innermost block and records its closing line.
    /// Returns false when no block is open (the `end` belongs to something
    /// else, e.g. a participant box).
    pub(super) fn try_close(&mut self, line_no: usize, blocks: &mut Vec<Block>) -> bool {
        let Some(open) = self.stack.pop() else {
            return false;
        };
        if let Some(block) = build_block(open, line_no) {
            blocks.push(block);
        }
        true
    }

    /// Attributes a relation to the innermost open block's current branch.
    /// `rect` frames are transparent.
    pub(super) fn attribute(&mut self, relation_index: usize) {
        for frame in self.stack.iter_mut().rev() {
            match frame.kind {
                OpenKind::Rect => continue,
                OpenKind::Conditional | OpenKind::Parallel => {
                    if let Some(branch) = frame.branches.last_mut() {
                        branch.relations.push(relation_index);
                    }
                    return;
                }
                OpenKind::Critical => {
                    if frame.in_option {
                        if let Some(option) = frame.branches.last_mut() {
                            option.relations.push(relation_index);
                            return;
                        }
                    }
                    frame.relations.push(relation_index);
                    return;
                }
                OpenKind::Optional | OpenKind::Loop | OpenKind::EarlyExit => {
                    frame.relations.push(relation_index);
                    return;
                }
            }
        }
    }

    /// Closes any block left open at end of input at the final source line.
    pub(super) fn finish(mut self, blocks: &mut Vec<Block>, last_line: usize) {
        while let Some(open) = self.stack.pop() {
            tracing::debug!(open_line = open.open_line, "block not closed before end of input");
            if let Some(block) = build_block(open, last_line + 1) {
                blocks.push(block);
            }
        }
    }
}

fn build_block(open: OpenBlock, close_line: usize) -> Option<Block> {
    let span = LineSpan {
        open: open.open_line,
        close: close_line,
    };
    let kind = match open.kind {
        OpenKind::Rect => return None,
        OpenKind::Conditional => BlockKind::Conditional {
            branches: open.branches,
        },
        OpenKind::Parallel => BlockKind::Parallel {
            branches: open.branches,
        },
        OpenKind::Optional => BlockKind::Optional {
            condition: open.condition,
            relations: open.relations,
        },
        OpenKind::Loop => BlockKind::Loop {
            condition: open.condition,
            relations: open.relations,
        },
        OpenKind::Critical => BlockKind::Critical {
            condition: open.condition,
            relations: open.relations,
            options: open.branches,
        },
        OpenKind::EarlyExit => BlockKind::EarlyExit {
            condition: open.condition,
            relations: open.relations,
        },
    };
    Some(Block { kind, span })
}

/// Post-pass for `break` blocks: the closing line is unknown during inline
/// attribution, and relation statements may span physical lines, so every
/// relation whose source line falls strictly inside the span is pulled in
/// unless some block already owns it.
pub(super) fn reattribute_early_exit(model: &mut DiagramModel) {
    let mut owned = model.block_owned_relations();
    let relations = &model.relations;
    for block in &mut model.blocks {
        let span = block.span;
        if let BlockKind::EarlyExit {
            relations: members, ..
        } = &mut block.kind
        {
            for (index, relation) in relations.iter().enumerate() {
                if span.contains(relation.source_line) && !owned.contains(&index) {
                    members.push(index);
                    owned.insert(index);
                }
            }
            members.sort_unstable();
        }
    }
}
