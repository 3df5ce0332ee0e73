//! Intent classification.
//!
//! Each intent owns a set of patterns and keywords. A pattern hit is worth 0.8, each
//! keyword contained in the query adds 0.2, and the total is capped at 1.0. The highest
//! score wins; ties go to the rule declared first. A query that scores zero everywhere
//! falls back to attendance with zero confidence.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Attendance,
    Latecomer,
    Student,
    Analytics,
    Prediction,
    Comparison,
    Insights,
    Summary,
    Classes,
    Help,
    Unknown,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Attendance => "attendance",
            Intent::Latecomer => "latecomer",
            Intent::Student => "student",
            Intent::Analytics => "analytics",
            Intent::Prediction => "prediction",
            Intent::Comparison => "comparison",
            Intent::Insights => "insights",
            Intent::Summary => "summary",
            Intent::Classes => "classes",
            Intent::Help => "help",
            Intent::Unknown => "unknown",
        }
    }
}

const PATTERN_SCORE: f64 = 0.8;
const KEYWORD_SCORE: f64 = 0.2;

struct IntentRule {
    intent: Intent,
    patterns: &'static [&'static str],
    keywords: &'static [&'static str],
}

const RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::Attendance,
        patterns: &[
            r"(?:show|get|what|how).*attendance.*\b(?:for|of|in)\b",
            r"attendance.*\b(?:for|of|in)\b",
            r"(?:how many|who).*(?:present|absent)",
        ],
        keywords: &["attendance", "present", "absent", "show"],
    },
    IntentRule {
        intent: Intent::Latecomer,
        patterns: &[
            r"(?:show|get|who|list).*(?:late|latecomer|tardy).*\b(?:in|for)\b",
            r"(?:late|latecomer|tardy).*(?:students|people).*\b(?:in|for)\b",
        ],
        keywords: &["late", "latecomer", "tardy"],
    },
    IntentRule {
        intent: Intent::Student,
        patterns: &[
            r"(?:show|get|find).*(?:student|info|details).*\b(?:for|of|about)\s+\w+",
            r"(?:student|info|details).*\b(?:for|of|about)\s+\w+",
            r"attendance.*\b(?:for|of)\b.*student\s+\w+",
        ],
        keywords: &["student", "info", "details"],
    },
    IntentRule {
        intent: Intent::Analytics,
        patterns: &[
            r"(?:analytics|analysis|trend|pattern|statistics)",
            r"(?:show|get).*(?:chart|graph|visualization)",
            r"(?:performance|improvement|decline).*\b(?:over|in)\b.*(?:time|period)",
        ],
        keywords: &["analytics", "trend", "pattern", "chart"],
    },
    IntentRule {
        intent: Intent::Prediction,
        patterns: &[
            r"(?:predict|forecast|estimate|expect)",
            r"(?:what|how).*\b(?:will|might|could)\b.*\b(?:happen|be)\b",
            r"(?:future|upcoming|next).*(?:attendance|performance)",
        ],
        keywords: &["predict", "forecast", "future", "tomorrow"],
    },
    IntentRule {
        intent: Intent::Comparison,
        patterns: &[
            r"\b(?:compare|comparison|versus|vs|against)\b",
            r"(?:better|worse|higher|lower).*\b(?:than|compared)\b",
            r"\b(?:which|what)\b.*\b(?:best|worst|highest|lowest)\b",
        ],
        keywords: &["compare", "versus", "better", "best"],
    },
    IntentRule {
        intent: Intent::Insights,
        patterns: &[
            r"\b(?:insights?|recommendations?|suggestions?|tips)\b",
            r"\b(?:how|what)\b.*\b(?:improve|doing)\b",
        ],
        keywords: &["insight", "recommend", "improve"],
    },
    IntentRule {
        intent: Intent::Summary,
        patterns: &[r"\b(?:summary|overview|report)\b"],
        keywords: &["summary", "overview", "report"],
    },
    IntentRule {
        intent: Intent::Classes,
        patterns: &[r"\b(?:all|list|every)\s+(?:the\s+)?classes\b"],
        keywords: &["classes"],
    },
    IntentRule {
        intent: Intent::Help,
        patterns: &[r"^\s*help\b", r"\bwhat can you do\b", r"\bcommands\b"],
        keywords: &["help"],
    },
];

struct CompiledRule {
    intent: Intent,
    patterns: Vec<Regex>,
    keywords: &'static [&'static str],
}

static COMPILED_RULES: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|r| CompiledRule {
            intent: r.intent,
            patterns: r
                .patterns
                .iter()
                .map(|p| Regex::new(p).expect("Invalid regex"))
                .collect(),
            keywords: r.keywords,
        })
        .collect()
});

static FOLLOW_UP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:what about|how about|and|also|more|details|explain)\b")
        .expect("Invalid regex")
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f64,
}

fn score(rule: &CompiledRule, query: &str) -> f64 {
    let mut confidence = 0.0;
    if rule.patterns.iter().any(|p| p.is_match(query)) {
        confidence += PATTERN_SCORE;
    }
    let hits = rule.keywords.iter().filter(|k| query.contains(*k)).count();
    confidence + KEYWORD_SCORE * hits as f64
}

/// Classifies a query. Empty or whitespace-only input is `Unknown`.
pub fn classify(query: &str) -> Classification {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Classification {
            intent: Intent::Unknown,
            confidence: 0.0,
        };
    }
    let mut best = Classification {
        intent: Intent::Attendance,
        confidence: 0.0,
    };
    for rule in COMPILED_RULES.iter() {
        let s = score(rule, &query);
        if s > best.confidence {
            best = Classification {
                intent: rule.intent,
                confidence: s,
            };
        }
    }
    best.confidence = best.confidence.min(1.0);
    best
}

/// True when the query contains a continuation phrase as whole words.
pub fn is_follow_up(query: &str) -> bool {
    FOLLOW_UP_PATTERN.is_match(&query.to_lowercase())
}
