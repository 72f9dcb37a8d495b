//! Plate text rules: two letters, two digits, one or two letters, four digits,
//! and a known state code up front.

use std::collections::HashSet;

/// Joins OCR fragments, strips whitespace and uppercases.
pub fn normalize<S: AsRef<str>>(fragments: &[S]) -> String {
    fragments
        .iter()
        .flat_map(|fragment| fragment.as_ref().chars())
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Shape check only, equivalent to `^[A-Z]{2}\d{2}[A-Z]{1,2}\d{4}$`.
pub fn has_plate_shape(text: &str) -> bool {
    let bytes = text.as_bytes();
    if !text.is_ascii() || !(9..=10).contains(&bytes.len()) {
        return false;
    }
    let series_len = bytes.len() - 8;
    let (state, rest) = bytes.split_at(2);
    let (district, rest) = rest.split_at(2);
    let (series, number) = rest.split_at(series_len);

    state.iter().all(u8::is_ascii_uppercase)
        && district.iter().all(u8::is_ascii_digit)
        && series.iter().all(u8::is_ascii_uppercase)
        && number.iter().all(u8::is_ascii_digit)
}

#[derive(Debug, Clone)]
pub struct PlateFormat {
    state_codes: HashSet<String>,
}

impl PlateFormat {
    pub fn new<I, S>(state_codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state_codes: state_codes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_valid(&self, plate: &str) -> bool {
        has_plate_shape(plate)
            && self
                .state_codes
                .iter()
                .any(|code| plate.starts_with(code.as_str()))
    }
}
