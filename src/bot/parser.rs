use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

static CLUE_SCAFFOLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:my|the|your)\s+)?clue\b(?:\s+is)?[\s:*\-]*")
        .expect("Failed to compile clue scaffold regex")
});

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Failed to compile number regex"));

// Consecutive ALL-CAPS words. Commas, whitespace, quotes and "2." style markers
// may sit between them.
static CAPS_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b[A-Z]{2,}\b(?:(?:[\s,;"“”]|\d+[.)])+\b[A-Z]{2,}\b)*"#)
        .expect("Failed to compile caps run regex")
});

static CAPS_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]{2,}").expect("Failed to compile caps word regex"));

static NUMBERED_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*\d+\s*[.)]\s*["'“]?([A-Za-z][A-Za-z'\-]*)"#)
        .expect("Failed to compile numbered list regex")
});

static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"\n]+)"|“([^”\n]+)”"#).expect("Failed to compile quoted word regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseIssue {
    #[error("no clue word found")]
    MissingClue,
    #[error("no number found")]
    MissingCount,
    #[error("no candidate words found")]
    NoCandidates,
}

/// What could be recovered from one completion reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBotResult {
    pub response: String,
    pub clue: String,
    pub count: Option<u32>,
    pub candidates: Vec<String>,
    pub issues: Vec<ParseIssue>,
}

impl ParsedBotResult {
    pub fn is_partial(&self) -> bool {
        !self.issues.is_empty()
    }
}

pub fn parse_response(text: &str) -> ParsedBotResult {
    let mut issues = Vec::new();

    let clue = extract_clue(text);
    if clue.is_empty() {
        issues.push(ParseIssue::MissingClue);
    }

    let mut count = extract_count(text);
    if count.is_none() {
        issues.push(ParseIssue::MissingCount);
    }

    let candidates = extract_candidates(text);
    if candidates.is_empty() {
        issues.push(ParseIssue::NoCandidates);
    }

    if count.is_none() && !candidates.is_empty() {
        count = u32::try_from(candidates.len()).ok();
    }

    ParsedBotResult {
        response: text.to_string(),
        clue,
        count,
        candidates,
        issues,
    }
}

fn strip_markup(line: &str) -> &str {
    line.trim_start_matches(|c: char| !c.is_alphanumeric())
}

fn clean_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

fn extract_clue(text: &str) -> String {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let Some(first) = lines.next() else {
        return String::new();
    };

    let first = strip_markup(first);
    let rest = match CLUE_SCAFFOLD.find(first) {
        Some(scaffold) => &first[scaffold.end()..],
        None => first,
    };
    // "Clue:" alone on the first line; the word follows on the next one.
    let source = if rest.trim().is_empty() {
        lines.next().map(strip_markup).unwrap_or_default()
    } else {
        rest
    };

    source
        .split_whitespace()
        .next()
        .map(clean_token)
        .unwrap_or_default()
}

fn extract_count(text: &str) -> Option<u32> {
    FIRST_NUMBER
        .find_iter(text)
        .find_map(|m| m.as_str().parse::<u32>().ok())
}

fn extract_candidates(text: &str) -> Vec<String> {
    let caps = longest_caps_run(text);
    if !caps.is_empty() {
        return dedupe_upper(caps);
    }

    let numbered: Vec<&str> = NUMBERED_ITEM
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if !numbered.is_empty() {
        return dedupe_upper(numbered);
    }

    let quoted: Vec<&str> = QUOTED
        .captures_iter(text)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).map(|m| m.as_str()))
        .collect();
    dedupe_upper(quoted)
}

fn longest_caps_run(text: &str) -> Vec<&str> {
    let mut best: Vec<&str> = Vec::new();
    for run in CAPS_RUN.find_iter(text) {
        let words: Vec<&str> = CAPS_WORD
            .find_iter(run.as_str())
            .map(|m| m.as_str())
            .collect();
        if words.len() > best.len() {
            best = words;
        }
    }
    best
}

fn dedupe_upper<'a, I>(words: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    words
        .into_iter()
        .map(|word| word.trim().to_uppercase())
        .filter(|word| !word.is_empty() && seen.insert(word.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clue_with_caps_list_and_no_number() {
        let parsed =
            parse_response("Clue: Measure\nWords that match the clue: SCALE, WATCH, MAPLE");
        assert_eq!(parsed.clue, "Measure");
        assert_eq!(parsed.candidates, vec!["SCALE", "WATCH", "MAPLE"]);
        assert_eq!(parsed.count, Some(3), "Count falls back to the candidate count");
        assert_eq!(parsed.issues, vec![ParseIssue::MissingCount]);
        assert!(parsed.is_partial());
    }

    #[test]
    fn test_numbered_list_dedupes() {
        let parsed = parse_response("1. Alpha\n2. Beta\n3. Beta");
        assert_eq!(parsed.candidates, vec!["ALPHA", "BETA"]);
        assert_eq!(parsed.count, Some(1), "First integer literal wins");
    }

    #[test]
    fn test_full_clue_reply() {
        let parsed = parse_response(
            "Clue: Based\nNumber of matches: 3\nMatching words: FOUNDATION, ROOT, GROUND",
        );
        assert_eq!(parsed.clue, "Based");
        assert_eq!(parsed.count, Some(3));
        assert_eq!(parsed.candidates, vec!["FOUNDATION", "ROOT", "GROUND"]);
        assert!(!parsed.is_partial());
    }

    #[test]
    fn test_first_number_wins() {
        assert_eq!(
            extract_count("It will 4 only 3 return 2 the 1st number"),
            Some(4)
        );
        assert_eq!(extract_count("no digits here"), None);
    }

    #[test]
    fn test_clue_without_scaffold() {
        let parsed = parse_response("Encoding 2");
        assert_eq!(parsed.clue, "Encoding");
        assert_eq!(parsed.count, Some(2));
        assert!(parsed.candidates.is_empty());
        assert_eq!(parsed.issues, vec![ParseIssue::NoCandidates]);
    }

    #[test]
    fn test_clue_scaffold_variants() {
        assert_eq!(extract_clue("My clue is: \"Orbit\", 2"), "Orbit");
        assert_eq!(extract_clue("The clue is Harbor"), "Harbor");
        assert_eq!(extract_clue("**Clue:** Measure (3)"), "Measure");
        assert_eq!(extract_clue("Clue:\nRiver 2"), "River");
        assert_eq!(extract_clue("Clueless 2"), "Clueless");
    }

    #[test]
    fn test_longest_caps_run_wins() {
        let text = "IT MATCHES, THE, FIRST, GROUP, OF ALL CAPS WORDS, possibly separated by commas, BUT NOT THE LAST COMMA IN THE SET";
        let parsed = parse_response(text);
        assert_eq!(
            parsed.candidates,
            vec!["IT", "MATCHES", "THE", "FIRST", "GROUP", "OF", "ALL", "CAPS", "WORDS"]
        );
    }

    #[test]
    fn test_caps_run_beats_uppercase_clue_line() {
        let parsed = parse_response("MEASURE 3\nSCALE\nWATCH\nMAPLE");
        assert_eq!(parsed.clue, "MEASURE");
        assert_eq!(parsed.count, Some(3));
        assert_eq!(parsed.candidates, vec!["SCALE", "WATCH", "MAPLE"]);
    }

    #[test]
    fn test_missing_number_uses_candidates() {
        let parsed = parse_response(
            "Clue: My\nWords that match the clue: SHADOW SHOW SLIP VACUUM WATCH WITCH",
        );
        assert_eq!(parsed.clue, "My");
        assert_eq!(parsed.count, Some(6));
        assert!(parsed.issues.contains(&ParseIssue::MissingCount));
    }

    #[test]
    fn test_numbered_caps_items_form_one_run() {
        let parsed = parse_response("1. SCALE\n2. WATCH\n3. SCALE");
        assert_eq!(parsed.candidates, vec!["SCALE", "WATCH"]);
    }

    #[test]
    fn test_quoted_fallback() {
        let parsed = parse_response("Orbit, 2\nMatches: \"Moon\" and “Satellite”");
        assert_eq!(parsed.clue, "Orbit");
        assert_eq!(parsed.count, Some(2));
        assert_eq!(parsed.candidates, vec!["MOON", "SATELLITE"]);
    }

    #[test]
    fn test_numbered_lowercase_items() {
        let parsed = parse_response("**Clue:** Measure (3)\n1) scale\n2) \"Watch\"");
        assert_eq!(parsed.clue, "Measure");
        assert_eq!(parsed.count, Some(3));
        assert_eq!(parsed.candidates, vec!["SCALE", "WATCH"]);
    }

    #[test]
    fn test_empty_reply_records_every_issue() {
        let parsed = parse_response("   \n");
        assert_eq!(parsed.clue, "");
        assert_eq!(parsed.count, None);
        assert!(parsed.candidates.is_empty());
        assert_eq!(
            parsed.issues,
            vec![
                ParseIssue::MissingClue,
                ParseIssue::MissingCount,
                ParseIssue::NoCandidates
            ]
        );
    }
}
