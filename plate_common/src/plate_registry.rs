use difflib::sequencematcher::SequenceMatcher;

/// Ratcliff/Obershelp similarity of two plate strings in `[0, 1]`:
/// twice the matched characters over the total length.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    f64::from(SequenceMatcher::new(&a, &b).ratio())
}

/// Plates accepted so far for one video, in first-seen order.
///
/// A plate close enough to an already accepted one is treated as another OCR
/// read of the same vehicle and dropped.
#[derive(Debug, Clone)]
pub struct PlateRegistry {
    threshold: f64,
    plates: Vec<String>,
}

impl PlateRegistry {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            plates: Vec::new(),
        }
    }

    pub fn is_known(&self, plate: &str) -> bool {
        self.plates
            .iter()
            .any(|existing| existing == plate || similarity(plate, existing) >= self.threshold)
    }

    /// Returns true when the plate was accepted.
    pub fn offer(&mut self, plate: &str) -> bool {
        if self.is_known(plate) {
            return false;
        }
        self.plates.push(plate.to_string());
        true
    }

    pub fn plates(&self) -> &[String] {
        &self.plates
    }

    pub fn len(&self) -> usize {
        self.plates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }

    pub fn into_plates(self) -> Vec<String> {
        self.plates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_substitution_is_a_duplicate() {
        assert!(similarity("MH12AB1234", "MH12AB1284") >= 0.85);

        let mut registry = PlateRegistry::new(0.85);
        assert!(registry.offer("MH12AB1234"));
        assert!(!registry.offer("MH12AB1284"));
        assert!(!registry.offer("MH12AB1234"));
        assert_eq!(registry.plates(), ["MH12AB1234".to_string()]);
    }

    #[test]
    fn swapped_characters_are_a_duplicate() {
        assert!((similarity("MH12AB1234", "MH12BA1234") - 0.9).abs() < 1e-6);

        let mut registry = PlateRegistry::new(0.85);
        assert!(registry.offer("MH12AB1234"));
        assert!(!registry.offer("MH12BA1234"));
        assert_eq!(registry.plates(), ["MH12AB1234".to_string()]);
    }

    #[test]
    fn dropped_series_letter_is_a_duplicate() {
        // 9 vs 10 characters with 9 in common: 18 / 19
        let score = similarity("MH12AB1234", "MH12A1234");
        assert!((score - 18.0 / 19.0).abs() < 1e-6);

        let mut registry = PlateRegistry::new(0.85);
        assert!(registry.offer("MH12AB1234"));
        assert!(!registry.offer("MH12A1234"));
    }

    #[test]
    fn short_plate_with_two_changes_is_kept() {
        // 7 of the 9 + 10 characters match: 14 / 19
        let score = similarity("MH12AB1234", "MH12C1284");
        assert!(score < 0.85, "{score}");

        let mut registry = PlateRegistry::new(0.85);
        assert!(registry.offer("MH12AB1234"));
        assert!(registry.offer("MH12C1284"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn empty_strings_are_identical() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("MH12AB1234", ""), 0.0);
    }

    #[test]
    fn distinct_plates_keep_first_seen_order() {
        let mut registry = PlateRegistry::new(0.85);
        for plate in ["KA05MN4321", "MH12AB1234", "DL01C0001"] {
            assert!(registry.offer(plate));
        }
        assert_eq!(
            registry.into_plates(),
            vec!["KA05MN4321", "MH12AB1234", "DL01C0001"]
        );
    }

    #[test]
    fn threshold_of_one_only_drops_exact_repeats() {
        let mut registry = PlateRegistry::new(1.0);
        assert!(registry.offer("MH12AB1234"));
        assert!(registry.offer("MH12AB1284"));
        assert!(!registry.offer("MH12AB1284"));
        assert_eq!(registry.len(), 2);
    }
}
