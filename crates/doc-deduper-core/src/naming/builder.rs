//! Short, filesystem-safe file names under a hard length budget.
//!
//! A stem has the shape `<date>_<category>_<suffix>`. The date and the suffix are
//! never shortened while the category still has characters to give up, so two
//! names built from different suffixes always differ.

/// Default stem budget, extension excluded
pub const DEFAULT_MAX_STEM_LEN: usize = 20;

/// Suffix indices rendered as a single letter (`a`..`z`)
pub const LETTER_SUFFIXES: usize = 26;

/// Stands in for a category or component that sanitizes to nothing
pub const PLACEHOLDER: &str = "x";

const SEPARATORS: [char; 2] = ['_', '-'];

/// Transliterate to ASCII and keep only `[A-Za-z0-9_-]`.
///
/// Whitespace becomes `_`, runs of separators collapse to their first character,
/// and separators are trimmed from both ends. An empty result becomes
/// [`PLACEHOLDER`].
pub fn sanitize_component(text: &str) -> String {
    let ascii = deunicode::deunicode(text);
    let mut out = String::with_capacity(ascii.len());
    let mut last_was_separator = false;

    for ch in ascii.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || SEPARATORS.contains(&ch) {
            ch
        } else if ch.is_whitespace() {
            '_'
        } else {
            continue;
        };

        if SEPARATORS.contains(&mapped) {
            if !last_was_separator {
                out.push(mapped);
            }
            last_was_separator = true;
        } else {
            out.push(mapped);
            last_was_separator = false;
        }
    }

    let trimmed = out.trim_matches(&SEPARATORS[..]);
    if trimmed.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `2024-11-07` -> `20241107`; anything but ASCII letters and digits is dropped
pub fn sanitize_date(date: &str) -> String {
    date.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// `0..=25` -> `a..=z`, then `26` -> `1`, `27` -> `2`, ...
pub fn disambiguation_suffix(index: usize) -> String {
    if index < LETTER_SUFFIXES {
        ((b'a' + index as u8) as char).to_string()
    } else {
        (index - (LETTER_SUFFIXES - 1)).to_string()
    }
}

/// `pdf`, `.pdf` -> `.pdf`; empty stays empty
pub fn normalize_extension(extension: &str) -> String {
    let cleaned: String = extension
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if cleaned.is_empty() {
        String::new()
    } else {
        format!(".{}", cleaned)
    }
}

/// Pure function from (date, category, index, extension) to a file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameBuilder {
    max_stem_len: usize,
}

impl Default for NameBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEM_LEN)
    }
}

impl NameBuilder {
    pub fn new(max_stem_len: usize) -> Self {
        Self {
            max_stem_len: max_stem_len.max(1),
        }
    }

    pub fn max_stem_len(&self) -> usize {
        self.max_stem_len
    }

    /// Full file name: the stem plus the normalized extension (not budgeted)
    pub fn build(&self, date: &str, category: &str, index: usize, extension: &str) -> String {
        format!(
            "{}{}",
            self.build_stem(date, category, index),
            normalize_extension(extension)
        )
    }

    /// Stem only, never longer than the budget
    pub fn build_stem(&self, date: &str, category: &str, index: usize) -> String {
        let max = self.max_stem_len;
        let mut date = sanitize_date(date);
        let suffix = disambiguation_suffix(index);
        let mut category = sanitize_component(category);

        let separators = if date.is_empty() { 1 } else { 2 };
        let reserved = date.len() + suffix.len() + separators;
        if max <= reserved {
            category = PLACEHOLDER.to_string();
        } else {
            fit_category(&mut category, max - reserved);
        }

        let mut stem = assemble(&date, &category, &suffix);

        // Only reachable when the suffix alone leaves no room for a category
        while stem.len() > max && category.len() > 1 {
            category.pop();
            stem = assemble(&date, &category, &suffix);
        }
        while stem.len() > max && !date.is_empty() {
            date.pop();
            stem = assemble(&date, &category, &suffix);
        }
        if stem.len() > max {
            stem = stem[stem.len() - max..].to_string();
        }

        stem
    }
}

fn fit_category(category: &mut String, budget: usize) {
    if category.len() > budget {
        category.truncate(budget);
        let trimmed_len = category.trim_end_matches(&SEPARATORS[..]).len();
        category.truncate(trimmed_len);
        if category.is_empty() {
            category.push_str(PLACEHOLDER);
        }
    }
}

fn assemble(date: &str, category: &str, suffix: &str) -> String {
    if date.is_empty() {
        format!("{}_{}", category, suffix)
    } else {
        format!("{}_{}_{}", date, category, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_only_safe_characters() {
        for input in [
            "договір",
            "рахунок-фактура",
            "Акт виконаних робіт",
            "тендер/пропозиція",
            "звіт №123",
            "інше@документ!",
            "Straße & Co.",
        ] {
            let out = sanitize_component(input);
            assert!(!out.is_empty());
            assert!(
                out.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
                "unsafe characters in {:?}",
                out
            );
        }
    }

    #[test]
    fn test_sanitize_examples() {
        assert_eq!(sanitize_component("Акт виконаних робіт").split('_').count(), 3);
        assert!(sanitize_component("Акт виконаних робіт").starts_with("Akt_"));
        assert!(!sanitize_component("тендер/пропозиція").contains('/'));
        assert_eq!(sanitize_component("  annual   report  "), "annual_report");
        assert_eq!(sanitize_component("--a__-b--"), "a_b");
        assert_eq!(sanitize_component("invoice"), "invoice");
    }

    #[test]
    fn test_sanitize_empty_falls_back_to_placeholder() {
        assert_eq!(sanitize_component(""), PLACEHOLDER);
        assert_eq!(sanitize_component("!!!"), PLACEHOLDER);
        assert_eq!(sanitize_component("___"), PLACEHOLDER);
    }

    #[test]
    fn test_suffix_sequence() {
        assert_eq!(disambiguation_suffix(0), "a");
        assert_eq!(disambiguation_suffix(1), "b");
        assert_eq!(disambiguation_suffix(25), "z");
        assert_eq!(disambiguation_suffix(26), "1");
        assert_eq!(disambiguation_suffix(27), "2");
        assert_eq!(disambiguation_suffix(50), "25");
        assert_eq!(disambiguation_suffix(125), "100");
    }

    #[test]
    fn test_simple_name() {
        let builder = NameBuilder::default();
        assert_eq!(
            builder.build("20241107", "invoice", 0, ".pdf"),
            "20241107_invoice_a.pdf"
        );
        assert_eq!(builder.build("2024-11-07", "invoice", 1, "pdf"), "20241107_invoice_b.pdf");
        assert_eq!(builder.build("20241107", "memo", 2, ""), "20241107_memo_c");
    }

    #[test]
    fn test_long_category_is_truncated_to_budget() {
        let builder = NameBuilder::new(20);
        let category = "a".repeat(40);
        let stem = builder.build_stem("20241107", &category, 0);
        assert_eq!(stem.len(), 20);
        assert_eq!(stem, format!("20241107_{}_a", "a".repeat(9)));
    }

    #[test]
    fn test_truncation_does_not_leave_trailing_separator() {
        let builder = NameBuilder::new(20);
        // "rakhunok_" would be the raw 9-character cut
        let stem = builder.build_stem("20241107", "rakhunok faktura", 0);
        assert_eq!(stem, "20241107_rakhunok_a");
    }

    #[test]
    fn test_extension_is_not_counted() {
        let builder = NameBuilder::new(20);
        let name = builder.build("20241107", &"b".repeat(30), 0, ".xlsx");
        assert_eq!(name.len(), 20 + ".xlsx".len());
        assert!(name.ends_with(".xlsx"));
    }

    #[test]
    fn test_empty_date_drops_its_segment() {
        let builder = NameBuilder::new(20);
        assert_eq!(builder.build_stem("", "invoice", 0), "invoice_a");
    }

    #[test]
    fn test_budget_holds_for_all_inputs() {
        let dates = ["20241107", "241107", "", "2024-11-07", "not a date at all 123456"];
        let long = "x".repeat(200);
        let categories = [
            "",
            "a",
            "invoice",
            "рахунок-фактура-за-виконані-роботи",
            long.as_str(),
            "!!!",
        ];
        for budget in [8, 12, 20, 32] {
            let builder = NameBuilder::new(budget);
            for date in dates {
                for category in categories {
                    for index in 0..=150 {
                        let stem = builder.build_stem(date, category, index);
                        assert!(
                            stem.len() <= budget,
                            "{:?} exceeds {} for ({:?}, {:?}, {})",
                            stem,
                            budget,
                            date,
                            category,
                            index
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_builder_is_deterministic() {
        let builder = NameBuilder::new(20);
        let first = builder.build("241107", "звіт", 30, ".docx");
        let second = builder.build("241107", "звіт", 30, ".docx");
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_indices_give_distinct_stems() {
        let builder = NameBuilder::new(20);
        let stems: std::collections::HashSet<_> = (0..=150)
            .map(|i| builder.build_stem("20241107", &"c".repeat(40), i))
            .collect();
        assert_eq!(stems.len(), 151);
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".pdf"), ".pdf");
        assert_eq!(normalize_extension("pdf"), ".pdf");
        assert_eq!(normalize_extension(""), "");
        assert_eq!(normalize_extension("."), "");
    }
}
