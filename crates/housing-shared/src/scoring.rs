//! Priority scoring used to rank applications for room allocation.
//!
//! GPA contributes up to 70 points and distance from the university up to
//! 30 points:
//!
//! ```text
//! score = round(min(100, (gpa / 5) * 70 + distance_weight(province) * 0.3))
//! ```
//!
//! The raw GPA goes into the formula unrounded. Two-decimal GPAs that land on
//! a half point (x.25, x.75) are exact in binary, so halves always round up
//! (GPA 4.75 from Najran scores 67, not 66).

use crate::constants::{DEFAULT_DISTANCE_WEIGHT, GPA_POINTS, GPA_SCALE};
use crate::types::{Application, Province};

pub const MAX_SCORE: u8 = 100;

/// Distance weight for a province, falling back to the default for
/// provinces outside the distance table.
pub fn distance_weight(province: &Province) -> u32 {
    province.distance_weight().unwrap_or(DEFAULT_DISTANCE_WEIGHT)
}

pub fn priority_score(gpa: f64, province: &Province) -> u8 {
    // (gpa / 5) * 70 == gpa * 14 points; weight * 0.3 == weight * 30 hundredths
    let per_gpa_unit = f64::from(GPA_POINTS) / GPA_SCALE;
    let hundredths = gpa * per_gpa_unit * 100.0 + f64::from(distance_weight(province)) * 30.0;

    // NaN casts to 0; everything else is clamped into [0, 100] points and
    // rounded once, halves away from zero.
    let points = hundredths.clamp(0.0, f64::from(MAX_SCORE) * 100.0) / 100.0;
    points.round() as u8
}

impl Application {
    pub fn priority_score(&self) -> u8 {
        priority_score(self.form.gpa, &self.form.province)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_student_half_rounds_up() {
        // (4.75 / 5) * 70 = 66.5
        assert_eq!(priority_score(4.75, &Province::Najran), 67);
    }

    #[test]
    fn test_half_boundary_with_distance() {
        // 4.75 * 14 = 66.5, plus 30 * 0.3 = 9 -> 75.5
        assert_eq!(priority_score(4.75, &Province::Asir), 76);
        // 0.25 * 14 = 3.5
        assert_eq!(priority_score(0.25, &Province::Najran), 4);
        // 5 * 14 = 70, plus 95 * 0.3 = 28.5 -> 98.5
        assert_eq!(priority_score(5.0, &Province::Eastern), 99);
    }

    #[test]
    fn test_below_half_rounds_down() {
        // 4.7 * 14 = 65.8 -> 66; 4.73 * 14 = 66.22 -> 66
        assert_eq!(priority_score(4.7, &Province::Najran), 66);
        assert_eq!(priority_score(4.73, &Province::Najran), 66);
    }

    #[test]
    fn test_gpa_is_not_rounded_before_scoring() {
        // 4.746 * 14 = 66.444
        assert_eq!(priority_score(4.746, &Province::Najran), 66);
        // 4.7499 * 14 = 66.4986
        assert_eq!(priority_score(4.7499, &Province::Najran), 66);
        // 4.7501 * 14 = 66.5014
        assert_eq!(priority_score(4.7501, &Province::Najran), 67);
    }

    #[test]
    fn test_unknown_province_uses_default_weight() {
        let province = Province::from_name("Atlantis");
        assert_eq!(distance_weight(&province), 50);
        // 70 + 15
        assert_eq!(priority_score(5.0, &province), 85);
    }

    #[test]
    fn test_score_bounds() {
        let provinces = [
            Province::Najran,
            Province::Eastern,
            Province::NorthernBorders,
            Province::from_name("unmapped"),
        ];
        for province in &provinces {
            for step in 0..=500 {
                let gpa = f64::from(step) / 100.0;
                let score = priority_score(gpa, province);
                assert!(score <= MAX_SCORE, "gpa {gpa} in {province} scored {score}");
            }
        }
    }

    #[test]
    fn test_out_of_range_inputs_clamp() {
        assert_eq!(priority_score(-3.0, &Province::Najran), 0);
        assert_eq!(priority_score(12.0, &Province::Eastern), 100);
        assert_eq!(priority_score(f64::NAN, &Province::Najran), 0);
    }
}
