//! # Grading
//!
//! Pure scoring: component scores in, final score and classification out.
//!
//! - The scheme (weights or plain average) is declared per program kind
//!   in [`GradingConfig`]; nothing is inferred from the submitted data
//! - The final score is rounded half-up to two decimals
//! - Pass/fail and the letter grade are pure functions of the final score

use crate::primitives::{
    GRADE_A_CUTOFF, GRADE_B_CUTOFF, GRADE_C_CUTOFF, GRADE_D_CUTOFF, MAX_AVERAGE_COMPONENTS,
    MAX_COMPONENT_NAME_LENGTH, MAX_SCORE, MIN_AVERAGE_COMPONENTS, PASS_THRESHOLD, WEIGHT_TOTAL,
};
use crate::score::{Score, Weight, div_round_half_up};
use crate::{CertisError, ProgramKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// GRADE
// =============================================================================

/// Letter grade derived from the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
}

impl Grade {
    /// Classify a final score using the fixed cutoffs.
    #[must_use]
    pub fn from_score(score: Score) -> Self {
        match score.hundredths() {
            s if s >= GRADE_A_CUTOFF => Grade::A,
            s if s >= GRADE_B_CUTOFF => Grade::B,
            s if s >= GRADE_C_CUTOFF => Grade::C,
            s if s >= GRADE_D_CUTOFF => Grade::D,
            _ => Grade::E,
        }
    }

    #[must_use]
    pub fn letter(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Grade::A => "Excellent",
            Grade::B => "Good",
            Grade::C => "Satisfactory",
            Grade::D => "Needs Improvement",
            Grade::E => "Unsatisfactory",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.letter(), self.label())
    }
}

/// Whether a final score passes.
#[must_use]
pub fn is_passing(score: Score) -> bool {
    score.hundredths() >= PASS_THRESHOLD
}

/// Final score plus its classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub final_score: Score,
    pub passed: bool,
    pub grade: Grade,
}

impl Outcome {
    /// Classify an already computed final score.
    #[must_use]
    pub fn classify(final_score: Score) -> Self {
        Self {
            final_score,
            passed: is_passing(final_score),
            grade: Grade::from_score(final_score),
        }
    }
}

// =============================================================================
// COMPONENTS
// =============================================================================

/// One named component score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub name: String,
    pub score: Score,
}

/// A component and its share of the final score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightedComponent {
    pub name: String,
    pub weight: Weight,
}

/// Parse raw `(name, decimal text)` pairs.
///
/// Names must be non-empty, short and unique. The first bad score aborts
/// the whole parse.
pub fn parse_components(raw: &[(String, String)]) -> Result<Vec<ComponentScore>, CertisError> {
    let mut seen = BTreeSet::new();
    let mut components = Vec::with_capacity(raw.len());

    for (name, text) in raw {
        let name = name.trim();
        if name.is_empty() {
            return Err(CertisError::validation("scores", "component name is empty"));
        }
        if name.len() > MAX_COMPONENT_NAME_LENGTH {
            return Err(CertisError::validation(
                name,
                format!("component name exceeds {} bytes", MAX_COMPONENT_NAME_LENGTH),
            ));
        }
        if !seen.insert(name.to_string()) {
            return Err(CertisError::validation(name, "component submitted twice"));
        }
        components.push(ComponentScore {
            name: name.to_string(),
            score: Score::parse(name, text)?,
        });
    }

    Ok(components)
}

// =============================================================================
// SCHEMES
// =============================================================================

/// How component scores combine into the final score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssessmentScheme {
    /// Fixed components, each with a weight; weights sum to 1.0.
    Weighted { components: Vec<WeightedComponent> },
    /// Unweighted mean over a bounded number of freely named components.
    Average {
        min_components: usize,
        max_components: usize,
    },
}

impl AssessmentScheme {
    /// Build a weighted scheme from `(name, basis points)` pairs and validate it.
    pub fn weighted(pairs: &[(&str, u32)]) -> Result<Self, CertisError> {
        let mut components = Vec::with_capacity(pairs.len());
        for (name, bp) in pairs {
            let weight = Weight::from_basis_points(*bp).ok_or_else(|| {
                CertisError::validation(*name, format!("weight {} bp outside (0, 10000]", bp))
            })?;
            components.push(WeightedComponent {
                name: (*name).to_string(),
                weight,
            });
        }
        let scheme = AssessmentScheme::Weighted { components };
        scheme.validate()?;
        Ok(scheme)
    }

    /// The default averaged scheme (3 to 7 components).
    #[must_use]
    pub fn average() -> Self {
        AssessmentScheme::Average {
            min_components: MIN_AVERAGE_COMPONENTS,
            max_components: MAX_AVERAGE_COMPONENTS,
        }
    }

    /// Check the scheme is usable.
    pub fn validate(&self) -> Result<(), CertisError> {
        match self {
            AssessmentScheme::Weighted { components } => {
                if components.is_empty() {
                    return Err(CertisError::validation(
                        "scheme",
                        "weighted scheme declares no components",
                    ));
                }
                let mut names = BTreeSet::new();
                for c in components {
                    if c.name.trim().is_empty() {
                        return Err(CertisError::validation("scheme", "component name is empty"));
                    }
                    if !names.insert(c.name.as_str()) {
                        return Err(CertisError::validation(
                            c.name.as_str(),
                            "component declared twice",
                        ));
                    }
                }
                let total: u32 = components.iter().map(|c| c.weight.basis_points()).sum();
                if total != WEIGHT_TOTAL {
                    return Err(CertisError::validation(
                        "scheme",
                        format!("weights sum to {} bp, expected {}", total, WEIGHT_TOTAL),
                    ));
                }
                Ok(())
            }
            AssessmentScheme::Average {
                min_components,
                max_components,
            } => {
                if *min_components == 0 || min_components > max_components {
                    return Err(CertisError::validation(
                        "scheme",
                        format!(
                            "component bounds {}..={} are not a valid range",
                            min_components, max_components
                        ),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Combine parsed components into a final score.
    ///
    /// Weighted schemes require exactly the declared component names;
    /// averaged schemes require a component count within bounds.
    pub fn final_score(&self, components: &[ComponentScore]) -> Result<Score, CertisError> {
        match self {
            AssessmentScheme::Weighted {
                components: declared,
            } => {
                for c in components {
                    if !declared.iter().any(|d| d.name == c.name) {
                        return Err(CertisError::validation(
                            c.name.as_str(),
                            "component is not part of this assessment",
                        ));
                    }
                }

                let mut total: u64 = 0;
                for d in declared {
                    let score = components
                        .iter()
                        .find(|c| c.name == d.name)
                        .ok_or_else(|| {
                            CertisError::validation(d.name.as_str(), "component score missing")
                        })?
                        .score;
                    total = total.saturating_add(
                        u64::from(d.weight.basis_points()) * u64::from(score.hundredths()),
                    );
                }
                Ok(clamp_score(div_round_half_up(total, u64::from(WEIGHT_TOTAL))))
            }
            AssessmentScheme::Average {
                min_components,
                max_components,
            } => {
                let n = components.len();
                if n < *min_components || n > *max_components {
                    return Err(CertisError::validation(
                        "scores",
                        format!(
                            "expected {} to {} components, got {}",
                            min_components, max_components, n
                        ),
                    ));
                }
                let total: u64 = components
                    .iter()
                    .map(|c| u64::from(c.score.hundredths()))
                    .sum();
                Ok(clamp_score(div_round_half_up(total, n as u64)))
            }
        }
    }

    /// Order components the way the scheme declares them.
    ///
    /// Averaged schemes keep submission order.
    #[must_use]
    pub fn canonical_order(&self, mut components: Vec<ComponentScore>) -> Vec<ComponentScore> {
        if let AssessmentScheme::Weighted { components: declared } = self {
            components.sort_by_key(|c| {
                declared
                    .iter()
                    .position(|d| d.name == c.name)
                    .unwrap_or(usize::MAX)
            });
        }
        components
    }
}

fn clamp_score(hundredths: u64) -> Score {
    Score::from_hundredths(hundredths.min(u64::from(MAX_SCORE)) as u32).unwrap_or(Score::MAX)
}

/// Parse, score and classify in one step.
pub fn grade(
    scheme: &AssessmentScheme,
    raw: &[(String, String)],
) -> Result<(Vec<ComponentScore>, Outcome), CertisError> {
    let components = parse_components(raw)?;
    let final_score = scheme.final_score(&components)?;
    Ok((
        scheme.canonical_order(components),
        Outcome::classify(final_score),
    ))
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// The scheme used for each program kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradingConfig {
    pub certification: AssessmentScheme,
    pub internship: AssessmentScheme,
}

impl Default for GradingConfig {
    /// Certification: theory 40% / practice 60%. Internship: average of 3 to 7 aspects.
    fn default() -> Self {
        Self {
            certification: AssessmentScheme::Weighted {
                components: vec![
                    WeightedComponent {
                        name: "theory".to_string(),
                        weight: Weight::fixed(4_000),
                    },
                    WeightedComponent {
                        name: "practice".to_string(),
                        weight: Weight::fixed(6_000),
                    },
                ],
            },
            internship: AssessmentScheme::average(),
        }
    }
}

impl GradingConfig {
    #[must_use]
    pub fn scheme_for(&self, kind: ProgramKind) -> &AssessmentScheme {
        match kind {
            ProgramKind::Certification => &self.certification,
            ProgramKind::Internship => &self.internship,
        }
    }

    pub fn validate(&self) -> Result<(), CertisError> {
        self.certification.validate()?;
        self.internship.validate()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, s)| (n.to_string(), s.to_string()))
            .collect()
    }

    fn score(text: &str) -> Score {
        Score::parse("t", text).unwrap()
    }

    #[test]
    fn weighted_example_fails_with_d() {
        let config = GradingConfig::default();
        let (_, outcome) = grade(
            config.scheme_for(ProgramKind::Certification),
            &raw(&[("theory", "80"), ("practice", "60")]),
        )
        .unwrap();

        assert_eq!(outcome.final_score.to_string(), "68.00");
        assert!(!outcome.passed);
        assert_eq!(outcome.grade, Grade::D);
    }

    #[test]
    fn grade_boundaries_are_exact() {
        assert_eq!(Outcome::classify(score("70.00")).grade, Grade::C);
        assert!(Outcome::classify(score("70.00")).passed);
        assert_eq!(Outcome::classify(score("69.99")).grade, Grade::D);
        assert!(!Outcome::classify(score("69.99")).passed);

        assert_eq!(Grade::from_score(score("90")), Grade::A);
        assert_eq!(Grade::from_score(score("89.99")), Grade::B);
        assert_eq!(Grade::from_score(score("80")), Grade::B);
        assert_eq!(Grade::from_score(score("60")), Grade::D);
        assert_eq!(Grade::from_score(score("59.99")), Grade::E);
        assert_eq!(Grade::from_score(Score::ZERO), Grade::E);
    }

    #[test]
    fn weighted_rounds_half_up() {
        let scheme = AssessmentScheme::weighted(&[("a", 3_333), ("b", 3_333), ("c", 3_334)]).unwrap();
        let components = parse_components(&raw(&[("a", "70"), ("b", "70"), ("c", "71")])).unwrap();
        // 3333*7000 + 3333*7000 + 3334*7100 = 70_334_000 → 7033.4 → 70.33
        assert_eq!(scheme.final_score(&components).unwrap().to_string(), "70.33");
    }

    #[test]
    fn average_rounds_half_up() {
        let scheme = AssessmentScheme::average();
        let components =
            parse_components(&raw(&[("discipline", "70"), ("teamwork", "70"), ("skill", "70.01")]))
                .unwrap();
        // 21001 / 3 = 7000.33 → 70.00
        assert_eq!(scheme.final_score(&components).unwrap().to_string(), "70.00");

        let components =
            parse_components(&raw(&[("a", "69.99"), ("b", "70"), ("c", "70"), ("d", "70")]))
                .unwrap();
        // 27999 / 4 = 6999.75 → 70.00
        assert_eq!(scheme.final_score(&components).unwrap().to_string(), "70.00");
    }

    #[test]
    fn weighted_requires_declared_components() {
        let scheme = GradingConfig::default().certification;

        let missing = grade(&scheme, &raw(&[("theory", "80")]));
        assert!(matches!(
            missing,
            Err(CertisError::ValidationFailed { ref field, .. }) if field == "practice"
        ));

        let extra = grade(
            &scheme,
            &raw(&[("theory", "80"), ("practice", "80"), ("attitude", "80")]),
        );
        assert!(matches!(
            extra,
            Err(CertisError::ValidationFailed { ref field, .. }) if field == "attitude"
        ));
    }

    #[test]
    fn average_enforces_component_bounds() {
        let scheme = AssessmentScheme::average();
        assert!(grade(&scheme, &raw(&[("a", "80"), ("b", "80")])).is_err());

        let eight: Vec<(String, String)> =
            (0..8).map(|i| (format!("c{i}"), "80".to_string())).collect();
        assert!(grade(&scheme, &eight).is_err());

        let seven: Vec<(String, String)> =
            (0..7).map(|i| (format!("c{i}"), "80".to_string())).collect();
        assert!(grade(&scheme, &seven).is_ok());
    }

    #[test]
    fn out_of_range_component_is_named() {
        let scheme = GradingConfig::default().certification;
        let result = grade(&scheme, &raw(&[("theory", "101"), ("practice", "80")]));
        assert!(matches!(
            result,
            Err(CertisError::OutOfRange { ref component, .. }) if component == "theory"
        ));
    }

    #[test]
    fn duplicate_component_rejected() {
        let result = parse_components(&raw(&[("theory", "80"), (" theory ", "90")]));
        assert!(matches!(result, Err(CertisError::ValidationFailed { .. })));
    }

    #[test]
    fn weights_must_sum_to_one() {
        assert!(AssessmentScheme::weighted(&[("a", 4_000), ("b", 5_000)]).is_err());
        assert!(AssessmentScheme::weighted(&[("a", 4_000), ("a", 6_000)]).is_err());
        assert!(AssessmentScheme::weighted(&[]).is_err());
        assert!(AssessmentScheme::weighted(&[("a", 10_000)]).is_ok());
    }

    #[test]
    fn canonical_order_follows_declaration() {
        let scheme = GradingConfig::default().certification;
        let (components, _) =
            grade(&scheme, &raw(&[("practice", "60"), ("theory", "80")])).unwrap();
        let names: Vec<_> = components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["theory", "practice"]);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(GradingConfig::default().validate().is_ok());
        let bad = AssessmentScheme::Average {
            min_components: 5,
            max_components: 3,
        };
        assert!(bad.validate().is_err());
    }
}
