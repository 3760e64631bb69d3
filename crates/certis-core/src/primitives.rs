//! # Fixed Rules
//!
//! Compile-time constants for grading, validation and listing.
//!
//! Scores are fixed-point hundredths (100.00 = 10_000) and weights are
//! basis points (1.0 = 10_000). Nothing here is configurable at runtime
//! except through [`crate::grading::GradingConfig`], which only chooses the
//! scheme; thresholds and cutoffs stay fixed.

/// Fractional digits carried by a score.
pub const SCORE_DECIMALS: u32 = 2;

/// Hundredths per whole point.
pub const SCORE_SCALE: u32 = 100;

/// The highest score, in hundredths (100.00).
pub const MAX_SCORE: u32 = 100 * SCORE_SCALE;

/// Weights must sum to exactly this many basis points (1.0).
pub const WEIGHT_TOTAL: u32 = 10_000;

/// Minimum final score, in hundredths, for a passing result (70.00).
pub const PASS_THRESHOLD: u32 = 7_000;

/// Grade cutoffs in hundredths: A, B, C, D. Anything below D is E.
pub const GRADE_A_CUTOFF: u32 = 9_000;
pub const GRADE_B_CUTOFF: u32 = 8_000;
pub const GRADE_C_CUTOFF: u32 = 7_000;
pub const GRADE_D_CUTOFF: u32 = 6_000;

/// Component count bounds for averaged assessments.
pub const MIN_AVERAGE_COMPONENTS: usize = 3;
pub const MAX_AVERAGE_COMPONENTS: usize = 7;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of names and titles, in bytes.
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum length of free text (descriptions, notes, motivation), in bytes.
pub const MAX_TEXT_LENGTH: usize = 2_000;

/// Maximum length of an opaque URL (thumbnail, material, document), in bytes.
pub const MAX_URL_LENGTH: usize = 2_048;

/// Maximum supporting documents attached to one registration.
pub const MAX_DOCUMENTS: usize = 10;

/// Maximum length of a component name, in bytes.
pub const MAX_COMPONENT_NAME_LENGTH: usize = 64;

// =============================================================================
// LISTING
// =============================================================================

/// Page size when none is requested.
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Upper bound on a requested page size.
pub const MAX_PAGE_SIZE: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoffs_descend() {
        assert!(GRADE_A_CUTOFF > GRADE_B_CUTOFF);
        assert!(GRADE_B_CUTOFF > GRADE_C_CUTOFF);
        assert!(GRADE_C_CUTOFF > GRADE_D_CUTOFF);
    }

    #[test]
    fn pass_threshold_matches_grade_c() {
        assert_eq!(PASS_THRESHOLD, GRADE_C_CUTOFF);
        assert_eq!(MAX_SCORE, 10_000);
    }
}
