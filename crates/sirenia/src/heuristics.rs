//! Keyword heuristics kept isolated from the synthesizers so they can be
//! unit-tested and replaced independently. Both are inherently fuzzy:
//! best-effort inference, never load-bearing for correctness.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOutcome {
    Success,
    Failure,
    Neutral,
}

const SUCCESS_KEYWORDS: &[&str] = &["success", "succeed", "ok", "done", "complete", "accepted"];
const FAILURE_KEYWORDS: &[&str] = &["error", "fail", "failure", "reject", "invalid", "denied"];

/// Infers a qualitative outcome from the terminal message of a branch.
/// Failure keywords win ties ("completed with errors" reads as a failure).
pub fn infer_branch_outcome(terminal_message: &str) -> BranchOutcome {
    let lower = terminal_message.to_ascii_lowercase();
    if FAILURE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return BranchOutcome::Failure;
    }
    if SUCCESS_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return BranchOutcome::Success;
    }
    BranchOutcome::Neutral
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentCategory {
    Structure,
    Flow,
    Functionality,
    Other,
}

impl CommentCategory {
    pub fn heading(self) -> &'static str {
        match self {
            CommentCategory::Structure => "Structure",
            CommentCategory::Flow => "Flow",
            CommentCategory::Functionality => "Functionality",
            CommentCategory::Other => "Other",
        }
    }
}

const STRUCTURE_KEYWORDS: &[&str] = &["layout", "structure", "arrange", "position", "diagram", "group"];
const FLOW_KEYWORDS: &[&str] = &["flow", "sequence", "order", "step", "timing", "before", "after"];
const FUNCTIONALITY_KEYWORDS: &[&str] = &["function", "feature", "logic", "handle", "process", "validate", "api"];

pub fn categorize_comment(text: &str) -> CommentCategory {
    let lower = text.to_ascii_lowercase();
    if STRUCTURE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return CommentCategory::Structure;
    }
    if FLOW_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return CommentCategory::Flow;
    }
    if FUNCTIONALITY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return CommentCategory::Functionality;
    }
    CommentCategory::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_detects_success_and_failure_keywords() {
        assert_eq!(infer_branch_outcome("Payment OK"), BranchOutcome::Success);
        assert_eq!(infer_branch_outcome("order completed"), BranchOutcome::Success);
        assert_eq!(infer_branch_outcome("Return error"), BranchOutcome::Failure);
        assert_eq!(infer_branch_outcome("request rejected"), BranchOutcome::Failure);
        assert_eq!(infer_branch_outcome("send receipt"), BranchOutcome::Neutral);
    }

    #[test]
    fn outcome_prefers_failure_on_mixed_text() {
        assert_eq!(
            infer_branch_outcome("completed with errors"),
            BranchOutcome::Failure
        );
    }

    #[test]
    fn comment_categories_match_first_keyword_class() {
        assert_eq!(
            categorize_comment("adjust layout of the actor boxes"),
            CommentCategory::Structure
        );
        assert_eq!(
            categorize_comment("this step must run before auth"),
            CommentCategory::Flow
        );
        assert_eq!(
            categorize_comment("handle retries in the API client"),
            CommentCategory::Functionality
        );
        assert_eq!(categorize_comment("TODO revisit"), CommentCategory::Other);
    }
}
