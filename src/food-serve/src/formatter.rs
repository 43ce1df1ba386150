use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{Error, Result};

/// The food categories, in the order the model emits its scores.
pub const CATEGORIES: [&str; 10] = [
    "healthy",
    "junk",
    "dessert",
    "appetizer",
    "mains",
    "soups",
    "carbs",
    "protein",
    "fats",
    "meat",
];

/// Integer percentage per category, kept in model order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPercentages(Vec<(&'static str, u8)>);

impl CategoryPercentages {
    /// Turn raw model scores into percentages: `floor(score * 100)`, clamped
    /// to `[0, 100]`.
    pub fn from_scores(scores: &[f64]) -> Result<Self> {
        if scores.len() != CATEGORIES.len() {
            return Err(Error::ContractViolation(format!(
                "expected {} scores, got {}",
                CATEGORIES.len(),
                scores.len()
            )));
        }

        let mut percentages = Vec::with_capacity(CATEGORIES.len());
        for (category, score) in CATEGORIES.iter().zip(scores) {
            if score.is_nan() {
                return Err(Error::ContractViolation(format!(
                    "score for '{}' is NaN",
                    category
                )));
            }
            let percent = (score * 100.0).floor().clamp(0.0, 100.0) as u8;
            percentages.push((*category, percent));
        }

        Ok(CategoryPercentages(percentages))
    }

    pub fn get(&self, category: &str) -> Option<u8> {
        self.0
            .iter()
            .find(|(name, _)| *name == category)
            .map(|(_, percent)| *percent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u8)> + '_ {
        self.0.iter().copied()
    }
}

impl Serialize for CategoryPercentages {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (category, percent) in &self.0 {
            map.serialize_entry(category, percent)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn scores_are_floored_not_rounded() {
        let scores = [0.91, 0.12, 0.04, 0.5, 0.3, 0.2, 0.6, 0.7, 0.05, 0.99];
        let percentages = CategoryPercentages::from_scores(&scores).unwrap();

        assert_eq!(
            serde_json::to_string(&percentages).unwrap(),
            r#"{"healthy":91,"junk":12,"dessert":4,"appetizer":50,"mains":30,"soups":20,"carbs":60,"protein":70,"fats":5,"meat":99}"#
        );
    }

    #[test]
    fn near_one_truncates() {
        let mut scores = [0.0; 10];
        scores[3] = 0.999;
        scores[4] = 0.0099;
        let percentages = CategoryPercentages::from_scores(&scores).unwrap();
        assert_eq!(percentages.get("appetizer"), Some(99));
        assert_eq!(percentages.get("mains"), Some(0));
        assert_eq!(percentages.get("sushi"), None);
    }

    #[test]
    fn wrong_length_is_a_contract_violation() {
        for len in [0, 9, 11] {
            let err = CategoryPercentages::from_scores(&vec![0.5; len]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ContractViolation);
        }
    }

    #[test]
    fn nan_is_rejected() {
        let mut scores = [0.1; 10];
        scores[7] = f64::NAN;
        let err = CategoryPercentages::from_scores(&scores).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContractViolation);
        assert!(err.to_string().contains("protein"));
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let scores = [1.7, -0.2, f64::INFINITY, f64::NEG_INFINITY, 1.0, 0.0, 0.5, 0.5, 0.5, 0.5];
        let percentages = CategoryPercentages::from_scores(&scores).unwrap();
        let values: Vec<u8> = percentages.iter().map(|(_, p)| p).collect();
        assert_eq!(values, vec![100, 0, 100, 0, 100, 0, 50, 50, 50, 50]);
    }
}
