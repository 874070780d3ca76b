//! Character-level query/pattern normalization

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalization {
    #[serde(default = "default_true")]
    pub case_insensitive: bool,
    /// Map full-width ASCII variants (U+FF01..U+FF5E) and the ideographic
    /// space to their half-width forms
    #[serde(default = "default_true")]
    pub fold_width: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            fold_width: true,
        }
    }
}

impl Normalization {
    pub fn exact() -> Self {
        Self {
            case_insensitive: false,
            fold_width: false,
        }
    }

    /// Normalize a single char. Always maps one char to one char so that char
    /// offsets in the normalized text equal offsets in the input.
    pub fn fold_char(&self, c: char) -> char {
        let c = if self.fold_width { fold_width(c) } else { c };
        if self.case_insensitive {
            let mut lower = c.to_lowercase();
            match (lower.next(), lower.next()) {
                (Some(l), None) => l,
                _ => c,
            }
        } else {
            c
        }
    }

    pub fn apply(&self, text: &str) -> String {
        text.chars().map(|c| self.fold_char(c)).collect()
    }
}

fn fold_width(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_and_case_folding() {
        let norm = Normalization::default();
        assert_eq!(norm.apply("ＧＭＶ"), "gmv");
        assert_eq!(norm.apply("Order_Status"), "order_status");
        assert_eq!(norm.apply("已完成"), "已完成");
    }

    #[test]
    fn test_char_count_is_preserved() {
        let norm = Normalization::default();
        for text in ["İstanbul", "ＡＢＣ　ｄｅｆ", "订单ID"] {
            assert_eq!(norm.apply(text).chars().count(), text.chars().count());
        }
    }

    #[test]
    fn test_exact_is_identity() {
        assert_eq!(Normalization::exact().apply("ＡbC"), "ＡbC");
    }
}
