//! Entity extraction: dates, class names, student tokens, numbers and periods.

use chrono::{Duration, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq)]
pub struct Entities {
    /// Resolved query date; `today` unless the text names another one.
    pub date: NaiveDate,
    pub date_explicit: bool,
    /// Canonical class name, e.g. "2nd Year Computer Science A".
    pub class_name: Option<String>,
    /// First student token; see [`student_candidates`] for the full list.
    pub student: Option<String>,
    pub numbers: Vec<i64>,
    pub period: Option<u32>,
}

static TODAY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btoday\b").expect("Invalid regex"));
static YESTERDAY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\byesterday\b").expect("Invalid regex"));
static ISO_DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("Invalid regex"));
static PERIOD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bperiod\s+(\d{1,2})\b").expect("Invalid regex"));
static NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("Invalid regex"));
static COMPACT_CLASS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(cse|cs|it)([23])([ab])?$").expect("Invalid regex"));
/// A bare section letter only counts right after a year or department word.
static BARE_SECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:science|technology|cse|cs|it|year|2nd|3rd|second|third|2|3) ([ab])\b")
        .expect("Invalid regex")
});
static STUDENT_CAPTURE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:student|for|about)\s+(\w+)").expect("Invalid regex"));

struct LexiconEntry {
    label: &'static str,
    phrases: &'static [&'static str],
}

const YEARS: &[LexiconEntry] = &[
    LexiconEntry {
        label: "2nd",
        phrases: &["2nd year", "second year", "year 2", "2nd", "second", "2"],
    },
    LexiconEntry {
        label: "3rd",
        phrases: &["3rd year", "third year", "year 3", "3rd", "third", "3"],
    },
];

const DEPARTMENTS: &[LexiconEntry] = &[
    LexiconEntry {
        label: "Computer Science",
        phrases: &["computer science", "cse", "cs"],
    },
    LexiconEntry {
        label: "Information Technology",
        phrases: &["information technology", "it"],
    },
];

const SECTIONS: &[LexiconEntry] = &[
    LexiconEntry {
        label: "A",
        phrases: &["section a", "sec a"],
    },
    LexiconEntry {
        label: "B",
        phrases: &["section b", "sec b"],
    },
];

/// Words that never name a student.
const STOPWORDS: &[&str] = &[
    "about", "absent", "all", "and", "attendance", "class", "classes", "details", "for", "get",
    "find", "history", "how", "info", "information", "late", "latecomers", "list", "me",
    "please", "present", "profile", "record", "records", "roll", "show", "student", "students",
    "the", "this", "today", "week", "what", "yesterday",
];

pub fn extract(text: &str, today: NaiveDate) -> Entities {
    let text = text.to_lowercase();
    let (date, date_explicit) = extract_date(&text, today);
    let period = PERIOD_PATTERN
        .captures(&text)
        .and_then(|c| c[1].parse::<u32>().ok())
        .filter(|p| *p >= 1);
    Entities {
        date,
        date_explicit,
        class_name: extract_class_name(&text),
        student: student_candidates(&text).into_iter().next(),
        numbers: NUMBER_PATTERN
            .find_iter(&text)
            .filter_map(|m| m.as_str().parse().ok())
            .collect(),
        period,
    }
}

/// `today`, `yesterday` or an ISO date, in that order. Anything else (including an
/// invalid calendar date) resolves to `today`.
pub fn extract_date(text: &str, today: NaiveDate) -> (NaiveDate, bool) {
    if TODAY_PATTERN.is_match(text) {
        return (today, true);
    }
    if YESTERDAY_PATTERN.is_match(text) {
        return (today - Duration::days(1), true);
    }
    if let Some(caps) = ISO_DATE_PATTERN.captures(text) {
        if let Ok(date) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
            return (date, true);
        }
    }
    (today, false)
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Longer phrases win across all entries, so "section b" beats a stray "2" or "a".
fn find_label(joined: &str, entries: &'static [LexiconEntry]) -> Option<&'static str> {
    let mut phrases: Vec<(&'static str, &'static str)> = entries
        .iter()
        .flat_map(|e| e.phrases.iter().map(move |p| (*p, e.label)))
        .collect();
    phrases.sort_by_key(|(p, _)| std::cmp::Reverse(p.split(' ').count()));
    phrases
        .into_iter()
        .find(|(p, _)| joined.contains(&format!(" {} ", p)))
        .map(|(_, label)| label)
}

fn find_section(joined: &str) -> &'static str {
    if let Some(label) = find_label(joined, SECTIONS) {
        return label;
    }
    match BARE_SECTION_PATTERN.captures(joined) {
        Some(caps) if &caps[1] == "b" => "B",
        _ => "A",
    }
}

/// Builds a canonical class name from a year, a department and an optional section
/// (default A). Compact tokens such as `cs2a` or `it3` are accepted too.
pub fn extract_class_name(text: &str) -> Option<String> {
    let text = text.to_lowercase();
    // Numbers in dates and period phrases must not be read as a year.
    let text = ISO_DATE_PATTERN.replace_all(&text, " ");
    let text = PERIOD_PATTERN.replace_all(&text, " ");
    let toks = tokens(&text);

    for tok in &toks {
        if let Some(caps) = COMPACT_CLASS_PATTERN.captures(tok) {
            let dept = if &caps[1] == "it" {
                "Information Technology"
            } else {
                "Computer Science"
            };
            let year = if &caps[2] == "2" { "2nd" } else { "3rd" };
            let section = caps
                .get(3)
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_else(|| "A".to_string());
            return Some(format!("{} Year {} {}", year, dept, section));
        }
    }

    let joined = format!(" {} ", toks.join(" "));
    let year = find_label(&joined, YEARS)?;
    let dept = find_label(&joined, DEPARTMENTS)?;
    let section = find_section(&joined);
    Some(format!("{} Year {} {}", year, dept, section))
}

/// Possible student tokens, best first: words captured after `student`, `for` or
/// `about`, then every alphanumeric word of three or more characters.
pub fn student_candidates(text: &str) -> Vec<String> {
    let text = text.to_lowercase();
    let mut out: Vec<String> = Vec::new();
    let captured = STUDENT_CAPTURE_PATTERN
        .captures_iter(&text)
        .map(|c| c[1].to_string());
    let words = tokens(&text).into_iter().filter(|w| w.chars().count() >= 3);
    for word in captured.chain(words) {
        if STOPWORDS.contains(&word.as_str()) || out.contains(&word) {
            continue;
        }
        out.push(word);
    }
    out
}
