//! Fixed-format metadata response parsing
//!
//! The metadata service is instructed to answer with exactly two labelled
//! lines: `Asset Name: <English> / <Arabic>` and `Tags: <comma-separated
//! bilingual list>`. Real responses drift from that contract in recurring
//! ways (tags wrapped onto continuation lines, the Arabic name pushed onto
//! its own line, assorted separators), so parsing is tolerant of those
//! shapes while still rejecting anything that cannot be mapped onto the
//! name/tags pair. A rejected response surfaces as
//! [`TaskError::Parse`] carrying the raw text — never as silently empty
//! fields.

use crate::error::TaskError;

/// Successfully parsed metadata for one asset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedMetadata {
    /// English asset name
    pub english_name: String,
    /// Arabic asset name (may be empty when the service ignored the bilingual rule)
    pub arabic_name: String,
    /// Parsed tag list
    pub tags: Vec<String>,
}

/// Separators the service uses between the English and Arabic name halves.
/// Ordered: the spaced forms are less ambiguous than the bare ones.
const NAME_SEPARATORS: &[&str] = &[
    " - ", " \u{2013} ", " \u{2014} ", " / ", " \u{2022} ", " /", "/ ", " | ", "|",
];

/// Characters trimmed from the edges of names and tags
const EDGE_PUNCT: &[char] = &['-', '\u{2013}', '\u{2014}', '/', '|', ':', '\u{2022}'];

/// Parse one raw metadata response against the two-line contract.
///
/// Both labelled lines must be present and the name must be non-empty;
/// anything else is a [`TaskError::Parse`].
pub fn parse_metadata(text: &str) -> Result<ParsedMetadata, TaskError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let asset_line_index = lines.iter().position(|l| is_label(l, "asset name:"));
    let tags_line_index = lines.iter().position(|l| is_label(l, "tags:"));

    let (Some(asset_idx), Some(tags_idx)) = (asset_line_index, tags_line_index) else {
        return Err(TaskError::Parse {
            raw: text.to_string(),
        });
    };

    let mut asset_value = label_value(lines[asset_idx]);
    let tags_value = label_value(lines[tags_idx]);

    // The service sometimes wraps the tag list, typically putting the Arabic
    // half on its own line. Collect lines that still look like tag content.
    let mut continuation_lines: Vec<&str> = Vec::new();
    for line in &lines[tags_idx + 1..] {
        if is_label(line, "asset name:") || is_label(line, "tags:") {
            break;
        }
        if line.contains(',') || line.contains('\u{060C}') {
            continuation_lines.push(line);
            continue;
        }
        if has_arabic(line) && !has_latin(line) {
            continuation_lines.push(line);
            continue;
        }
        break;
    }
    let tags = merge_tag_lines(&tags_value, &continuation_lines);

    // English-only name line followed by an Arabic-only line: recombine.
    if !asset_value.is_empty() && !has_arabic(&asset_value) {
        if let Some(next) = lines.get(asset_idx + 1) {
            if has_arabic(next) && !is_label(next, "tags:") {
                asset_value = format!("{} / {}", asset_value, next);
            }
        }
    }

    let (english_name, arabic_name) = split_bilingual_name(&asset_value);
    if english_name.is_empty() && arabic_name.is_empty() {
        return Err(TaskError::Parse {
            raw: text.to_string(),
        });
    }

    Ok(ParsedMetadata {
        english_name,
        arabic_name,
        tags,
    })
}

fn is_label(line: &str, label: &str) -> bool {
    // get() rather than slicing: the prefix boundary may fall inside a
    // multibyte character on Arabic-leading lines
    line.get(..label.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(label))
}

/// Everything after the first `:`, trimmed
fn label_value(line: &str) -> String {
    match line.split_once(':') {
        Some((_, value)) => value.trim().to_string(),
        None => String::new(),
    }
}

/// True for characters in the Arabic script blocks
fn is_arabic_char(c: char) -> bool {
    matches!(c,
        '\u{0600}'..='\u{06FF}'
        | '\u{0750}'..='\u{077F}'
        | '\u{08A0}'..='\u{08FF}'
        | '\u{FB50}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}')
}

/// True if the string contains any Arabic-script character
fn has_arabic(value: &str) -> bool {
    value.chars().any(is_arabic_char)
}

/// True if the string contains any ASCII letter
fn has_latin(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_alphabetic())
}

fn clean_segment(value: &str) -> String {
    value
        .trim()
        .trim_matches(EDGE_PUNCT)
        .trim()
        .to_string()
}

/// Split a tag value on `,` and the Arabic comma `،`
fn split_tags(value: &str) -> Vec<String> {
    value
        .split([',', '\u{060C}'])
        .map(clean_segment)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Merge the primary tag line with any continuation lines.
///
/// When the primary line is (mostly) English-only and the continuation is
/// (mostly) Arabic-only, the service has split one bilingual list in two;
/// pair entries by index to recover `english / arabic` tags. Otherwise just
/// concatenate.
fn merge_tag_lines(primary_line: &str, continuation_lines: &[&str]) -> Vec<String> {
    let primary_tags = split_tags(primary_line);
    if continuation_lines.is_empty() {
        return primary_tags;
    }
    let extra_tags = split_tags(&continuation_lines.join(", "));
    if primary_tags.is_empty() {
        return extra_tags;
    }
    if extra_tags.is_empty() {
        return primary_tags;
    }

    let primary_latin_only = primary_tags
        .iter()
        .filter(|t| has_latin(t) && !has_arabic(t))
        .count();
    let extra_arabic_only = extra_tags
        .iter()
        .filter(|t| has_arabic(t) && !has_latin(t))
        .count();

    if primary_latin_only >= std::cmp::max(1, primary_tags.len() / 2)
        && extra_arabic_only >= std::cmp::max(1, extra_tags.len() / 2)
    {
        let pair_count = std::cmp::min(primary_tags.len(), extra_tags.len());
        let mut paired: Vec<String> = (0..pair_count)
            .map(|i| format!("{} / {}", primary_tags[i], extra_tags[i]))
            .collect();
        paired.extend(primary_tags.into_iter().skip(pair_count));
        paired.extend(extra_tags.into_iter().skip(pair_count));
        return paired;
    }

    let mut merged = primary_tags;
    merged.extend(extra_tags);
    merged
}

/// Split a name value into (english, arabic).
///
/// Tries the explicit separators first, falling back to the script boundary
/// when English and Arabic are run together without one.
fn split_bilingual_name(value: &str) -> (String, String) {
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if value.is_empty() {
        return (String::new(), String::new());
    }

    if let Some((left, right)) = value.split_once('|') {
        let (left, right) = (left.trim(), right.trim());
        if !left.is_empty() && !right.is_empty() {
            return (left.to_string(), right.to_string());
        }
    }

    for separator in NAME_SEPARATORS {
        if let Some((left, right)) = value.split_once(separator) {
            let (left, right) = (left.trim(), right.trim());
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let left_arabic = has_arabic(left);
            if left_arabic != has_arabic(right) {
                if left_arabic {
                    return (clean_segment(right), clean_segment(left));
                }
                return (clean_segment(left), clean_segment(right));
            }
        }
    }

    if !has_arabic(&value) {
        return (clean_segment(&value), String::new());
    }
    if !has_latin(&value) {
        return (String::new(), clean_segment(&value));
    }

    // Both scripts without a usable separator: split at the script boundary
    let first_arabic = value.char_indices().find(|(_, c)| is_arabic_char(*c));
    let first_latin = value.char_indices().find(|(_, c)| c.is_ascii_alphabetic());
    match (first_latin, first_arabic) {
        (Some((latin_at, _)), Some((arabic_at, _))) if latin_at < arabic_at => (
            clean_segment(&value[..arabic_at]),
            clean_segment(&value[arabic_at..]),
        ),
        (Some((latin_at, _)), Some(_)) => (
            clean_segment(&value[latin_at..]),
            clean_segment(&value[..latin_at]),
        ),
        _ => (clean_segment(&value), String::new()),
    }
}
