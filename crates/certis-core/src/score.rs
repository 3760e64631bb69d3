//! # Fixed-Point Scores and Weights
//!
//! Scores carry two decimals and are stored as integer hundredths; weights
//! are stored as basis points. Input is decimal text, so the API layer can
//! forward whatever the client sent (`"80"`, `"80.5"`, `69.99`) without
//! going through binary floating point.

use crate::CertisError;
use crate::primitives::{MAX_SCORE, SCORE_DECIMALS, SCORE_SCALE, WEIGHT_TOTAL};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a decimal literal was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FixedError {
    /// Not a decimal literal.
    Malformed,
    /// Below zero.
    Negative,
    /// More significant fractional digits than the scale allows.
    TooPrecise,
    /// Magnitude does not fit.
    Overflow,
}

/// Exponents beyond this are clamped; the result overflows or is too precise either way.
const EXPONENT_CLAMP: i64 = 1 << 20;

fn all_digits(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii_digit())
}

/// Parse `text` as a decimal and scale it by `10^decimals`.
///
/// Accepts an optional sign, digits, an optional fractional part and an
/// optional exponent (`"1e2"`, `"7.05E1"`). Trailing fractional zeros beyond
/// the scale are ignored (`"80.500"` is fine at two decimals, `"80.505"` is
/// not). Magnitude and sign are checked before precision, so `"1e300"` is an
/// overflow and `"-0.001"` is negative.
fn parse_fixed(text: &str, decimals: u32) -> Result<i64, FixedError> {
    let text = text.trim();
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (mantissa, exponent) = match body.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (body, None),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let empty = int_part.is_empty() && frac_part.is_empty();
    if empty || !all_digits(int_part) || !all_digits(frac_part) {
        return Err(FixedError::Malformed);
    }

    let exponent = match exponent {
        None => 0,
        Some(e) => {
            let (sign, digits) = match e.as_bytes().first() {
                Some(b'-') => (-1, &e[1..]),
                Some(b'+') => (1, &e[1..]),
                _ => (1, e),
            };
            if digits.is_empty() || !all_digits(digits) {
                return Err(FixedError::Malformed);
            }
            let magnitude = digits.bytes().fold(0i64, |acc, b| {
                acc.saturating_mul(10)
                    .saturating_add(i64::from(b - b'0'))
                    .min(EXPONENT_CLAMP)
            });
            sign * magnitude
        }
    };

    // All significant digits in order; `point` is how many of them sit left
    // of the decimal point once the exponent is applied.
    let digits: Vec<u8> = int_part.bytes().chain(frac_part.bytes()).map(|b| b - b'0').collect();
    let point = int_part.len() as i64 + exponent;

    let Some(lead) = digits.iter().position(|&d| d != 0) else {
        return Ok(0);
    };
    let last = digits.iter().rposition(|&d| d != 0).unwrap_or(lead);

    if point - lead as i64 > 19 {
        return Err(FixedError::Overflow);
    }
    if negative {
        return Err(FixedError::Negative);
    }
    if last as i64 + 1 - point > i64::from(decimals) {
        return Err(FixedError::TooPrecise);
    }

    let mut value: i64 = 0;
    for i in lead as i64..point + i64::from(decimals) {
        let digit = usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i))
            .map_or(0, |&d| i64::from(d));
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit))
            .ok_or(FixedError::Overflow)?;
    }
    Ok(value)
}

/// Divide rounding half away from zero. Both operands are non-negative here.
pub(crate) fn div_round_half_up(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    numerator
        .saturating_mul(2)
        .saturating_add(denominator)
        / denominator.saturating_mul(2)
}

// =============================================================================
// SCORE
// =============================================================================

/// A score in [0.00, 100.00], stored as hundredths.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Score(u16);

impl Score {
    /// 0.00
    pub const ZERO: Score = Score(0);
    /// 100.00
    pub const MAX: Score = Score(MAX_SCORE as u16);

    /// Build from hundredths; `None` above 100.00.
    #[must_use]
    pub fn from_hundredths(hundredths: u32) -> Option<Self> {
        (hundredths <= MAX_SCORE).then_some(Self(hundredths as u16))
    }

    /// Build from whole points; `None` above 100.
    #[must_use]
    pub fn from_points(points: u32) -> Option<Self> {
        Self::from_hundredths(points.checked_mul(SCORE_SCALE)?)
    }

    /// Parse the decimal text submitted for `component`.
    ///
    /// Non-numeric or over-precise input is a validation failure; anything
    /// numeric outside [0, 100] is `OutOfRange`, naming the component.
    pub fn parse(component: &str, text: &str) -> Result<Self, CertisError> {
        let out_of_range = || CertisError::OutOfRange {
            component: component.to_string(),
            value: text.trim().to_string(),
        };

        match parse_fixed(text, SCORE_DECIMALS) {
            Ok(v) if (0..=i64::from(MAX_SCORE)).contains(&v) => Ok(Self(v as u16)),
            Ok(_) | Err(FixedError::Overflow | FixedError::Negative) => Err(out_of_range()),
            Err(FixedError::Malformed) => Err(CertisError::validation(
                component,
                format!("'{}' is not a number", text.trim()),
            )),
            Err(FixedError::TooPrecise) => Err(CertisError::validation(
                component,
                format!("'{}' has more than {} decimal places", text.trim(), SCORE_DECIMALS),
            )),
        }
    }

    /// Raw hundredths.
    #[must_use]
    pub fn hundredths(self) -> u32 {
        u32::from(self.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// WEIGHT
// =============================================================================

/// A component weight, stored as basis points of 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weight(u16);

impl Weight {
    /// Build from basis points; `None` for zero or above 10_000.
    #[must_use]
    pub fn from_basis_points(bp: u32) -> Option<Self> {
        (bp > 0 && bp <= WEIGHT_TOTAL).then_some(Self(bp as u16))
    }

    /// Built-in weights; callers pass literals known to be in range.
    pub(crate) const fn fixed(bp: u16) -> Self {
        Self(bp)
    }

    /// Parse a percentage with up to two decimals (`"40"` → 40.00%).
    pub fn parse_percent(component: &str, text: &str) -> Result<Self, CertisError> {
        match parse_fixed(text, 2) {
            Ok(v) if v > 0 && v <= i64::from(WEIGHT_TOTAL) => Ok(Self(v as u16)),
            Ok(_) | Err(FixedError::Overflow | FixedError::Negative) => Err(CertisError::validation(
                component,
                format!("weight '{}' must be within (0, 100] percent", text.trim()),
            )),
            Err(_) => Err(CertisError::validation(
                component,
                format!("weight '{}' is not a percentage with at most 2 decimals", text.trim()),
            )),
        }
    }

    #[must_use]
    pub fn basis_points(self) -> u32 {
        u32::from(self.0)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_fractional_scores() {
        assert_eq!(Score::parse("x", "80").ok(), Score::from_hundredths(8000));
        assert_eq!(Score::parse("x", "80.5").ok(), Score::from_hundredths(8050));
        assert_eq!(Score::parse("x", "69.99").ok(), Score::from_hundredths(6999));
        assert_eq!(Score::parse("x", " 100.00 ").ok(), Some(Score::MAX));
        assert_eq!(Score::parse("x", "0").ok(), Some(Score::ZERO));
        assert_eq!(Score::parse("x", ".5").ok(), Score::from_hundredths(50));
        assert_eq!(Score::parse("x", "72.500").ok(), Score::from_hundredths(7250));
    }

    #[test]
    fn out_of_range_names_component() {
        match Score::parse("practice", "100.01") {
            Err(CertisError::OutOfRange { component, value }) => {
                assert_eq!(component, "practice");
                assert_eq!(value, "100.01");
            }
            other => panic!("expected OutOfRange, got {:?}", other),
        }
        assert!(matches!(
            Score::parse("theory", "-1"),
            Err(CertisError::OutOfRange { .. })
        ));
        assert!(matches!(
            Score::parse("theory", "99999999999999999999999"),
            Err(CertisError::OutOfRange { .. })
        ));
    }

    #[test]
    fn malformed_input_is_validation_failure() {
        for bad in ["", "abc", "8O", "1e", "e2", "1e+", "1e2.5", "--5", "7.0.1", "+"] {
            let result = Score::parse("theory", bad);
            assert!(
                matches!(result, Err(CertisError::ValidationFailed { ref field, .. }) if field == "theory"),
                "input {:?} gave {:?}",
                bad,
                result
            );
        }
        assert_eq!(Score::parse("theory", "70.").ok(), Score::from_points(70));
    }

    #[test]
    fn over_precise_input_rejected() {
        for text in ["69.995", "69.99999999999999999", "6.99999e1", "1e-3"] {
            assert!(
                matches!(Score::parse("theory", text), Err(CertisError::ValidationFailed { .. })),
                "input {:?}",
                text
            );
        }
    }

    #[test]
    fn exponent_form_is_a_number() {
        assert_eq!(Score::parse("x", "7e1").ok(), Score::from_points(70));
        assert_eq!(Score::parse("x", "7.05E1").ok(), Score::from_hundredths(7050));
        assert_eq!(Score::parse("x", "1e-2").ok(), Score::from_hundredths(1));
        assert_eq!(Score::parse("x", "0e999999999999").ok(), Some(Score::ZERO));
        for text in ["1e300", "1E+3", "-1e300", "-2.5e-1", "1e99999999999999999999"] {
            assert!(
                matches!(
                    Score::parse("theory", text),
                    Err(CertisError::OutOfRange { ref component, .. }) if component == "theory"
                ),
                "input {:?}",
                text
            );
        }
    }

    #[test]
    fn display_keeps_two_decimals() {
        assert_eq!(Score::from_hundredths(6800).map(|s| s.to_string()), Some("68.00".into()));
        assert_eq!(Score::from_hundredths(7).map(|s| s.to_string()), Some("0.07".into()));
        assert_eq!(Score::MAX.to_string(), "100.00");
    }

    #[test]
    fn weights_parse_as_percent() {
        assert_eq!(
            Weight::parse_percent("theory", "40").ok(),
            Weight::from_basis_points(4000)
        );
        assert_eq!(
            Weight::parse_percent("a", "33.34").map(|w| w.basis_points()).ok(),
            Some(3334)
        );
        assert!(Weight::parse_percent("a", "0").is_err());
        assert!(Weight::parse_percent("a", "100.5").is_err());
        assert!(Weight::parse_percent("a", "forty").is_err());
    }

    #[test]
    fn rounding_half_up() {
        assert_eq!(div_round_half_up(5, 10), 1);
        assert_eq!(div_round_half_up(4, 10), 0);
        assert_eq!(div_round_half_up(15, 10), 2);
        assert_eq!(div_round_half_up(20_001, 3), 6667);
        assert_eq!(div_round_half_up(1, 0), 0);
    }
}
