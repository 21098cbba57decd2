//! Diagnostic codes emitted by the floorplanning engine.

use mosaic_diagnostics::{Category, DiagnosticCode};

/// Summary of a finished floorplanning request.
pub const ANNEAL_SUMMARY: DiagnosticCode = DiagnosticCode::new(Category::Note, 401);

/// The outline was missed; the least-violating placement is reported.
pub const OUTLINE_MISSED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 402);

/// A quadrant of the partition adapter failed to fit its box.
pub const QUADRANT_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 403);

/// The legalizer could not clear a block.
pub const LEGALIZER_UNRESOLVED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 404);

/// The hierarchical solver kept a least-violating cluster placement.
pub const HIERARCHY_FALLBACK: DiagnosticCode = DiagnosticCode::new(Category::Warning, 405);

/// The annealer changed solution encoding.
pub const REPRESENTATION_SWITCH: DiagnosticCode = DiagnosticCode::new(Category::Note, 406);

/// Whitespace was insufficient and hard blocks were shrunk for clustering.
pub const WHITESPACE_SHRINK: DiagnosticCode = DiagnosticCode::new(Category::Warning, 407);

/// The request was rejected as malformed.
pub const INVALID_INPUT: DiagnosticCode = DiagnosticCode::new(Category::Error, 408);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_and_prefixed() {
        let codes = [
            ANNEAL_SUMMARY,
            OUTLINE_MISSED,
            QUADRANT_FAILED,
            LEGALIZER_UNRESOLVED,
            HIERARCHY_FALLBACK,
            REPRESENTATION_SWITCH,
            WHITESPACE_SHRINK,
            INVALID_INPUT,
        ];
        let shown: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            shown,
            vec!["N401", "W402", "W403", "W404", "W405", "N406", "W407", "E408"]
        );
    }
}
