//! Local heuristic suggestions (fallback when the model API is unavailable)
//!
//! These are shallow pattern checks, not a grammar parser. Every check runs
//! over the whole text and all matches are concatenated in check order; the
//! caller sorts by position when it needs to.

use super::{Suggestion, SuggestionType};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// Sentences longer than this many characters are candidates for a run-on warning
const RUN_ON_MIN_CHARS: usize = 100;
/// ...and must also have more than this many words
const RUN_ON_MIN_WORDS: usize = 20;

/// Characters that keep a lone "i" from being flagged ("i.e.", "i'm", quoted "i")
const LONE_I_EXEMPT_FOLLOWERS: &[char] = &['.', ',', ';', ':', '\'', '"'];

struct Patterns {
    doubled_punctuation: Regex,
    sentence_break: Regex,
    passive_voice: Regex,
    its: Regex,
    your: Regex,
    article: Regex,
    extra_whitespace: Regex,
    missing_space: Regex,
    lone_i: Regex,
}

impl Patterns {
    fn compile() -> Option<Self> {
        Some(Self {
            doubled_punctuation: Regex::new(r"[.!?]{2,}").ok()?,
            sentence_break: Regex::new(r"[.!?]+").ok()?,
            passive_voice: Regex::new(r"\b(?:is|are|was|were|be|been|being)\s+\w+ed\b").ok()?,
            its: Regex::new(r"\bits\b").ok()?,
            your: Regex::new(r"\byour\b").ok()?,
            article: Regex::new(r"(?i)\b(an?)(\s+)([a-z][\w'-]*)").ok()?,
            extra_whitespace: Regex::new(r"\s{2,}").ok()?,
            missing_space: Regex::new(r"[,.!?][A-Za-z]\w*").ok()?,
            lone_i: Regex::new(r"\bi\b").ok()?,
        })
    }
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS.get_or_init(Patterns::compile).as_ref()
}

/// Scan text with the full battery of local checks.
///
/// Deterministic: the same input always produces the same suggestions in the
/// same order.
pub fn scan(text: &str) -> Vec<Suggestion> {
    let Some(p) = patterns() else {
        return Vec::new();
    };

    let mut suggestions = Vec::new();
    doubled_punctuation(p, text, &mut suggestions);
    run_on_sentences(p, text, &mut suggestions);
    passive_voice(p, text, &mut suggestions);
    its_contraction(p, text, &mut suggestions);
    your_contraction(p, text, &mut suggestions);
    article_agreement(p, text, &mut suggestions);
    extra_whitespace(p, text, &mut suggestions);
    missing_space(p, text, &mut suggestions);
    lowercase_i(p, text, &mut suggestions);
    suggestions
}

fn doubled_punctuation(p: &Patterns, text: &str, out: &mut Vec<Suggestion>) {
    for m in p.doubled_punctuation.find_iter(text) {
        let first: String = m.as_str().chars().take(1).collect();
        out.push(Suggestion::new(
            SuggestionType::Grammar,
            m.as_str(),
            first,
            "Avoid using multiple punctuation marks in formal writing.",
        ));
    }
}

fn run_on_sentences(p: &Patterns, text: &str, out: &mut Vec<Suggestion>) {
    for sentence in p.sentence_break.split(text) {
        let trimmed = sentence.trim();
        if trimmed.chars().count() > RUN_ON_MIN_CHARS
            && trimmed.split_whitespace().count() > RUN_ON_MIN_WORDS
        {
            out.push(Suggestion::flag(
                SuggestionType::Clarity,
                trimmed,
                "This may be a run-on sentence. Consider breaking it into smaller sentences.",
            ));
        }
    }
}

fn passive_voice(p: &Patterns, text: &str, out: &mut Vec<Suggestion>) {
    for m in p.passive_voice.find_iter(text) {
        out.push(Suggestion::flag(
            SuggestionType::Engagement,
            m.as_str(),
            "Consider using active voice for more engaging writing.",
        ));
    }
}

// The two confused-word checks only fire on a couple of literal phrases. They
// are placeholders and deliberately miss most real cases.

fn its_contraction(p: &Patterns, text: &str, out: &mut Vec<Suggestion>) {
    if !text.contains("its the") {
        return;
    }
    for _ in p.its.find_iter(text) {
        out.push(Suggestion::new(
            SuggestionType::Grammar,
            "its",
            "it's",
            "Use 'it's' (contraction of 'it is') instead of 'its' (possessive).",
        ));
    }
}

fn your_contraction(p: &Patterns, text: &str, out: &mut Vec<Suggestion>) {
    if !(text.contains("your welcome") || text.contains("your right")) {
        return;
    }
    for _ in p.your.find_iter(text) {
        out.push(Suggestion::new(
            SuggestionType::Grammar,
            "your",
            "you're",
            "Use 'you're' (contraction of 'you are') instead of 'your' (possessive).",
        ));
    }
}

fn article_agreement(p: &Patterns, text: &str, out: &mut Vec<Suggestion>) {
    for caps in p.article.captures_iter(text) {
        let (Some(whole), Some(article), Some(gap), Some(word)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        let article = article.as_str();
        let Some(lead) = word.as_str().chars().next() else {
            continue;
        };
        let vowel_lead = is_vowel(lead);

        let corrected = match (article.len(), vowel_lead) {
            // "a apple" -> "an apple", keeping the article's case
            (1, true) => Some((
                format!("{}n", article),
                "Use 'an' before words that begin with a vowel sound.",
            )),
            // "an dog" -> "a dog"
            (2, false) => Some((
                article[..1].to_string(),
                "Use 'a' before words that begin with a consonant sound.",
            )),
            _ => None,
        };

        if let Some((fixed_article, explanation)) = corrected {
            out.push(Suggestion::new(
                SuggestionType::Grammar,
                whole.as_str(),
                format!("{}{}{}", fixed_article, gap.as_str(), word.as_str()),
                explanation,
            ));
        }
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

fn extra_whitespace(p: &Patterns, text: &str, out: &mut Vec<Suggestion>) {
    for m in p.extra_whitespace.find_iter(text) {
        out.push(Suggestion::new(
            SuggestionType::Grammar,
            m.as_str(),
            " ",
            "Remove extra spaces.",
        ));
    }
}

fn missing_space(p: &Patterns, text: &str, out: &mut Vec<Suggestion>) {
    for m in p.missing_space.find_iter(text) {
        // the whole following word is part of the target so it is found again
        let Some(punct) = m.as_str().chars().next() else {
            continue;
        };
        let word = &m.as_str()[punct.len_utf8()..];
        out.push(Suggestion::new(
            SuggestionType::Grammar,
            m.as_str(),
            format!("{} {}", punct, word),
            "Add a space after punctuation.",
        ));
    }
}

fn lowercase_i(p: &Patterns, text: &str, out: &mut Vec<Suggestion>) {
    for m in p.lone_i.find_iter(text) {
        let exempt = text[m.end()..]
            .chars()
            .next()
            .is_some_and(|next| LONE_I_EXEMPT_FOLLOWERS.contains(&next));
        if exempt {
            continue;
        }
        let target = pronoun_target(text, m.start(), m.end());
        let replacement = format!(
            "{}I{}",
            &text[target.start..m.start()],
            &text[m.end()..target.end]
        );
        out.push(Suggestion::new(
            SuggestionType::Grammar,
            &text[target.clone()],
            replacement,
            "The pronoun 'I' should always be capitalized.",
        ));
    }
}

/// Widen a lone "i" to take in its neighbouring word ("i said", "did i"), so
/// the edit lands on this pronoun and not on an earlier "i".
fn pronoun_target(text: &str, start: usize, end: usize) -> Range<usize> {
    let after = &text[end..];
    let gap = after.len() - after.trim_start().len();
    let word = word_len(&after[gap..]);
    if gap > 0 && word > 0 {
        return start..end + gap + word;
    }

    let before = &text[..start];
    let gap = before.len() - before.trim_end().len();
    let word = word_len_back(&before[..start - gap]);
    if gap > 0 && word > 0 {
        return start - gap - word..end;
    }
    start..end
}

fn word_len(text: &str) -> usize {
    text.chars()
        .take_while(|c| c.is_alphanumeric())
        .map(char::len_utf8)
        .sum()
}

fn word_len_back(text: &str) -> usize {
    text.chars()
        .rev()
        .take_while(|c| c.is_alphanumeric())
        .map(char::len_utf8)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(suggestions: &'a [Suggestion], original: &str) -> Option<&'a Suggestion> {
        suggestions.iter().find(|s| s.original == original)
    }

    #[test]
    fn test_reports_article_and_double_space() {
        let text = "This is a apple and their going too fast.  Okay";
        let suggestions = scan(text);

        let article = find(&suggestions, "a apple").expect("article suggestion");
        assert_eq!(article.kind, SuggestionType::Grammar);
        assert_eq!(article.replacement, "an apple");

        let spaces = find(&suggestions, "  ").expect("double space suggestion");
        assert_eq!(spaces.kind, SuggestionType::Grammar);
        assert_eq!(spaces.replacement, " ");
        let space_at = text.find("  ").unwrap();
        assert_eq!(&text[space_at + 2..], "Okay");
    }

    #[test]
    fn test_scan_is_deterministic() {
        let text = "i think its the best!! it was walked a lot,really.  Done";
        let first = scan(text);
        let second = scan(text);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_doubled_punctuation_keeps_first_char() {
        let suggestions = scan("Really?!? That is great...");
        let doubled: Vec<_> = suggestions
            .iter()
            .filter(|s| s.explanation.contains("multiple punctuation"))
            .collect();
        assert_eq!(doubled.len(), 2);
        assert_eq!(doubled[0].original, "?!?");
        assert_eq!(doubled[0].replacement, "?");
        assert_eq!(doubled[1].original, "...");
        assert_eq!(doubled[1].replacement, ".");
    }

    #[test]
    fn test_run_on_sentence_needs_length_and_words() {
        let long_words = "supercalifragilistic ".repeat(6);
        assert!(scan(&long_words)
            .iter()
            .all(|s| s.kind != SuggestionType::Clarity));

        let run_on = "we went to the shop and then we bought some bread and then we walked home and then we ate the bread and then we slept for a while";
        let suggestions = scan(run_on);
        let clarity = suggestions
            .iter()
            .find(|s| s.kind == SuggestionType::Clarity)
            .expect("run-on flagged");
        assert_eq!(clarity.original, run_on);
        assert!(clarity.is_informational());
    }

    #[test]
    fn test_passive_voice_is_flagged_verbatim() {
        let suggestions = scan("The report was finished yesterday.");
        let passive = find(&suggestions, "was finished").expect("passive flagged");
        assert_eq!(passive.kind, SuggestionType::Engagement);
        assert_eq!(passive.replacement, "was finished");
    }

    #[test]
    fn test_article_agreement_both_directions() {
        let suggestions = scan("She ate an banana and A orange.");
        assert_eq!(
            find(&suggestions, "an banana").map(|s| s.replacement.as_str()),
            Some("a banana")
        );
        assert_eq!(
            find(&suggestions, "A orange").map(|s| s.replacement.as_str()),
            Some("An orange")
        );
        assert!(scan("an apple and a pear").iter().all(|s| !s
            .explanation
            .contains("vowel sound")
            && !s.explanation.contains("consonant sound")));
    }

    #[test]
    fn test_missing_space_after_punctuation() {
        let suggestions = scan("Hello,world");
        let fix = find(&suggestions, ",world").expect("missing space flagged");
        assert_eq!(fix.replacement, ", world");

        let chained = scan("one.two.three");
        assert!(find(&chained, ".two").is_some());
        assert!(find(&chained, ".three").is_some());
    }

    #[test]
    fn test_lowercase_i_skips_exempt_followers() {
        let suggestions = scan("so i went home, i.e. back");
        let lone: Vec<_> = suggestions
            .iter()
            .filter(|s| s.explanation.contains("pronoun"))
            .collect();
        assert_eq!(lone.len(), 1);
        assert_eq!(lone[0].original, "i went");
        assert_eq!(lone[0].replacement, "I went");
    }

    #[test]
    fn test_lowercase_i_target_carries_a_neighbouring_word() {
        let suggestions = scan("so i said that i would, or did i");
        let targets: Vec<_> = suggestions
            .iter()
            .filter(|s| s.explanation.contains("pronoun"))
            .map(|s| (s.original.as_str(), s.replacement.as_str()))
            .collect();
        assert_eq!(
            targets,
            vec![("i said", "I said"), ("i would", "I would"), ("did i", "did I")]
        );
        assert_eq!(scan("i").first().map(|s| s.original.as_str()), Some("i"));
    }

    #[test]
    fn test_its_check_does_not_touch_longer_words() {
        let text = "its the dog that visits";
        let fix = find(&scan(text), "its").expect("its flagged").clone();
        let out = crate::patch::apply_once("she visits, its the best", &fix);
        assert_eq!(out.text, "she visits, it's the best");
    }

    #[test]
    fn test_confused_words_only_fire_on_literal_phrases() {
        assert!(find(&scan("its the end of the road"), "its").is_some());
        assert!(find(&scan("the dog wagged its tail"), "its").is_none());
        assert!(find(&scan("your welcome to stay"), "your").is_some());
        assert!(find(&scan("your coat is here"), "your").is_none());
        // their/there and to/too are intentionally not checked
        assert!(scan("their going too fast")
            .iter()
            .all(|s| s.original != "their" && s.original != "too"));
    }

    #[test]
    fn test_collapsed_space_not_reported_again() {
        let text = "Hello there.  How are you doing";
        let before = scan(text);
        let spaces = find(&before, "  ").expect("double space").clone();
        let patched = text.replacen(&spaces.original, &spaces.replacement, 1);
        assert!(!scan(&patched).iter().any(|s| s.same_edit(&spaces)));
    }
}
