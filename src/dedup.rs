//! Duplicate asset-name disambiguation
//!
//! A batch of visually similar assets often comes back from the metadata
//! service with identical names. Duplicate English or Arabic names within a
//! batch receive ` - 001`-style suffixes so that exported rows stay uniquely
//! addressable in the asset library. Duplicates are detected on a normalized
//! key that folds Arabic letter variants and digits, so "مُخطّط" and "مخطط"
//! collide as intended.

use crate::types::{TaskOutcome, TaskResult};

/// Fold a character for duplicate detection. `None` drops the character.
fn fold_char(c: char) -> Option<char> {
    match c {
        // Alef variants -> bare alef
        '\u{0622}' | '\u{0623}' | '\u{0625}' | '\u{0671}' => Some('\u{0627}'),
        // Alef maksura -> yeh
        '\u{0649}' => Some('\u{064A}'),
        // Waw with hamza -> waw
        '\u{0624}' => Some('\u{0648}'),
        // Yeh with hamza -> yeh
        '\u{0626}' => Some('\u{064A}'),
        // Teh marbuta -> heh
        '\u{0629}' => Some('\u{0647}'),
        // Tatweel and harakat carry no identity
        '\u{0640}' | '\u{064B}'..='\u{065F}' | '\u{0670}' => None,
        // Arabic-Indic digits -> ASCII
        '\u{0660}'..='\u{0669}' => char::from_u32('0' as u32 + (c as u32 - 0x0660)),
        // Extended Arabic-Indic digits -> ASCII
        '\u{06F0}'..='\u{06F9}' => char::from_u32('0' as u32 + (c as u32 - 0x06F0)),
        _ => Some(c),
    }
}

/// Normalized comparison key for a name: folded, lowercased, alphanumeric
/// runs separated by single spaces.
fn normalize_key(value: &str) -> String {
    let folded: String = value
        .chars()
        .filter_map(fold_char)
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse internal whitespace without otherwise altering the name
fn clean_base(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Suffix duplicate names with ` - NNN` counters, in input order.
fn apply_suffixes(names: &[String]) -> Vec<String> {
    let keys: Vec<String> = names.iter().map(|n| normalize_key(n)).collect();

    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for key in &keys {
        if !key.is_empty() {
            *counts.entry(key.as_str()).or_insert(0) += 1;
        }
    }

    let mut seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    names
        .iter()
        .zip(&keys)
        .map(|(original, key)| {
            let base = clean_base(original);
            if base.is_empty() || counts.get(key.as_str()).copied().unwrap_or(0) <= 1 {
                return base;
            }
            let n = seen.entry(key.as_str()).or_insert(0);
            *n += 1;
            format!("{} - {:03}", base, n)
        })
        .collect()
}

/// Disambiguate duplicate English and Arabic names across a batch's results.
///
/// Failed tasks carry no names and are left untouched; only successful
/// results participate in (and are affected by) duplicate counting.
pub fn apply_duplicate_suffixes(results: &mut [TaskResult]) {
    let english: Vec<String> = results
        .iter()
        .map(|r| match &r.outcome {
            TaskOutcome::Ok { english_name, .. } => english_name.clone(),
            TaskOutcome::Failed { .. } => String::new(),
        })
        .collect();
    let arabic: Vec<String> = results
        .iter()
        .map(|r| match &r.outcome {
            TaskOutcome::Ok { arabic_name, .. } => arabic_name.clone(),
            TaskOutcome::Failed { .. } => String::new(),
        })
        .collect();

    let english = apply_suffixes(&english);
    let arabic = apply_suffixes(&arabic);

    for ((result, en), ar) in results.iter_mut().zip(english).zip(arabic) {
        if let TaskOutcome::Ok {
            english_name,
            arabic_name,
            ..
        } = &mut result.outcome
        {
            *english_name = en;
            *arabic_name = ar;
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;

    fn ok_result(index: usize, english: &str, arabic: &str) -> TaskResult {
        TaskResult {
            index,
            uploaded: format!("file{index}.png"),
            outcome: TaskOutcome::Ok {
                english_name: english.to_string(),
                arabic_name: arabic.to_string(),
                tags: vec![],
            },
        }
    }

    fn english_names(results: &[TaskResult]) -> Vec<String> {
        results
            .iter()
            .map(|r| match &r.outcome {
                TaskOutcome::Ok { english_name, .. } => english_name.clone(),
                TaskOutcome::Failed { .. } => String::new(),
            })
            .collect()
    }

    #[test]
    fn distinct_names_are_untouched() {
        let mut results = vec![ok_result(0, "Chart", "مخطط"), ok_result(1, "Logo", "شعار")];
        apply_duplicate_suffixes(&mut results);
        assert_eq!(english_names(&results), vec!["Chart", "Logo"]);
    }

    #[test]
    fn duplicates_get_ordered_suffixes() {
        let mut results = vec![
            ok_result(0, "Business Chart", "مخطط"),
            ok_result(1, "Business Chart", "شعار"),
            ok_result(2, "Business Chart", "جدول"),
        ];
        apply_duplicate_suffixes(&mut results);
        assert_eq!(
            english_names(&results),
            vec![
                "Business Chart - 001",
                "Business Chart - 002",
                "Business Chart - 003"
            ]
        );
    }

    #[test]
    fn case_and_whitespace_collide() {
        let mut results = vec![
            ok_result(0, "Business  Chart", ""),
            ok_result(1, "business chart", ""),
        ];
        apply_duplicate_suffixes(&mut results);
        assert_eq!(
            english_names(&results),
            vec!["Business Chart - 001", "business chart - 002"]
        );
    }

    #[test]
    fn arabic_letter_variants_collide() {
        // Alef-with-hamza vs bare alef; teh marbuta vs heh
        let mut results = vec![ok_result(0, "", "أيقونة"), ok_result(1, "", "ايقونه")];
        apply_duplicate_suffixes(&mut results);

        let arabic: Vec<String> = results
            .iter()
            .map(|r| match &r.outcome {
                TaskOutcome::Ok { arabic_name, .. } => arabic_name.clone(),
                TaskOutcome::Failed { .. } => String::new(),
            })
            .collect();
        assert_eq!(arabic, vec!["أيقونة - 001", "ايقونه - 002"]);
    }

    #[test]
    fn arabic_indic_digits_collide_with_ascii() {
        let mut results = vec![ok_result(0, "Chart ٣", ""), ok_result(1, "Chart 3", "")];
        apply_duplicate_suffixes(&mut results);
        assert!(english_names(&results)[0].ends_with("- 001"));
        assert!(english_names(&results)[1].ends_with("- 002"));
    }

    #[test]
    fn failed_results_are_untouched_and_do_not_count() {
        let mut results = vec![
            ok_result(0, "Chart", ""),
            TaskResult {
                index: 1,
                uploaded: "broken.png".to_string(),
                outcome: TaskOutcome::Failed {
                    kind: FailureKind::Transport,
                    message: "timeout".to_string(),
                },
            },
            ok_result(2, "Chart", ""),
        ];
        apply_duplicate_suffixes(&mut results);

        assert_eq!(english_names(&results)[0], "Chart - 001");
        assert_eq!(english_names(&results)[2], "Chart - 002");
        assert!(matches!(
            results[1].outcome,
            TaskOutcome::Failed { kind: FailureKind::Transport, .. }
        ));
    }

    #[test]
    fn empty_names_never_get_suffixes() {
        let mut results = vec![ok_result(0, "", ""), ok_result(1, "", "")];
        apply_duplicate_suffixes(&mut results);
        assert_eq!(english_names(&results), vec!["", ""]);
    }

    #[test]
    fn normalize_key_strips_harakat() {
        assert_eq!(normalize_key("مُخطّط"), normalize_key("مخطط"));
    }
}
