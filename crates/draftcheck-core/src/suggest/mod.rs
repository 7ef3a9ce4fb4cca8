//! Suggestion model for draftcheck
//!
//! A suggestion is one flagged span of the analysed text. Suggestions carry no
//! identity beyond their content, so the same text always yields equal values.

pub mod local;

use serde::{Deserialize, Serialize};

/// Category of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SuggestionType {
    /// Spelling, grammar and punctuation
    Grammar,
    /// Unclear or wordy sentences
    Clarity,
    /// Engagement and impact
    Engagement,
    /// Tone and style
    Delivery,
}

impl SuggestionType {
    pub const ALL: [SuggestionType; 4] = [
        SuggestionType::Grammar,
        SuggestionType::Clarity,
        SuggestionType::Engagement,
        SuggestionType::Delivery,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SuggestionType::Grammar => "GRAMMAR",
            SuggestionType::Clarity => "CLARITY",
            SuggestionType::Engagement => "ENGAGEMENT",
            SuggestionType::Delivery => "DELIVERY",
        }
    }

    /// Parse the wire name. Only the four exact upper-case names are accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

impl std::fmt::Display for SuggestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A flagged span with a proposed replacement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionType,
    /// Exact substring of the analysed text
    pub original: String,
    #[serde(rename = "suggestion")]
    pub replacement: String,
    #[serde(default)]
    pub explanation: String,
}

impl Suggestion {
    pub fn new(
        kind: SuggestionType,
        original: impl Into<String>,
        replacement: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            original: original.into(),
            replacement: replacement.into(),
            explanation: explanation.into(),
        }
    }

    /// Flag a span without proposing an edit.
    pub fn flag(
        kind: SuggestionType,
        original: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        let original = original.into();
        Self {
            kind,
            replacement: original.clone(),
            original,
            explanation: explanation.into(),
        }
    }

    /// Informational suggestions point at text but change nothing when applied.
    pub fn is_informational(&self) -> bool {
        self.original == self.replacement
    }

    /// Same target and same edit, ignoring the explanation.
    pub fn same_edit(&self, other: &Suggestion) -> bool {
        self.kind == other.kind
            && self.original == other.original
            && self.replacement == other.replacement
    }
}

/// Per-category counts, always recomputed from a suggestion set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub grammar: usize,
    pub clarity: usize,
    pub engagement: usize,
    pub delivery: usize,
}

impl Statistics {
    pub fn from_suggestions<'a>(suggestions: impl IntoIterator<Item = &'a Suggestion>) -> Self {
        let mut stats = Statistics::default();
        for suggestion in suggestions {
            match suggestion.kind {
                SuggestionType::Grammar => stats.grammar += 1,
                SuggestionType::Clarity => stats.clarity += 1,
                SuggestionType::Engagement => stats.engagement += 1,
                SuggestionType::Delivery => stats.delivery += 1,
            }
        }
        stats
    }

    pub fn count(&self, kind: SuggestionType) -> usize {
        match kind {
            SuggestionType::Grammar => self.grammar,
            SuggestionType::Clarity => self.clarity,
            SuggestionType::Engagement => self.engagement,
            SuggestionType::Delivery => self.delivery,
        }
    }

    pub fn total(&self) -> usize {
        self.grammar + self.clarity + self.engagement + self.delivery
    }
}

/// Which categories the user wants to see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryToggles {
    #[serde(default = "enabled")]
    pub grammar: bool,
    #[serde(default = "enabled")]
    pub clarity: bool,
    #[serde(default = "enabled")]
    pub engagement: bool,
    #[serde(default = "enabled")]
    pub delivery: bool,
}

fn enabled() -> bool {
    true
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            grammar: true,
            clarity: true,
            engagement: true,
            delivery: true,
        }
    }
}

impl CategoryToggles {
    pub fn allows(&self, kind: SuggestionType) -> bool {
        match kind {
            SuggestionType::Grammar => self.grammar,
            SuggestionType::Clarity => self.clarity,
            SuggestionType::Engagement => self.engagement,
            SuggestionType::Delivery => self.delivery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_wire_shape() {
        let suggestion = Suggestion::new(
            SuggestionType::Grammar,
            "a apple",
            "an apple",
            "Use 'an' before vowels.",
        );
        let value = serde_json::to_value(&suggestion).unwrap();
        assert_eq!(value["type"], "GRAMMAR");
        assert_eq!(value["original"], "a apple");
        assert_eq!(value["suggestion"], "an apple");
    }

    #[test]
    fn test_suggestion_rejects_unknown_type() {
        let json = r#"{"type":"STYLE","original":"x","suggestion":"y"}"#;
        assert!(serde_json::from_str::<Suggestion>(json).is_err());
    }

    #[test]
    fn test_from_label_is_exact() {
        assert_eq!(
            SuggestionType::from_label("CLARITY"),
            Some(SuggestionType::Clarity)
        );
        assert_eq!(SuggestionType::from_label("clarity"), None);
    }

    #[test]
    fn test_flag_is_informational() {
        let flagged = Suggestion::flag(SuggestionType::Engagement, "was walked", "passive");
        assert!(flagged.is_informational());
    }

    #[test]
    fn test_statistics_projection() {
        let suggestions = vec![
            Suggestion::new(SuggestionType::Grammar, "i", "I", ""),
            Suggestion::new(SuggestionType::Grammar, "  ", " ", ""),
            Suggestion::flag(SuggestionType::Delivery, "hey", ""),
        ];
        let stats = Statistics::from_suggestions(&suggestions);
        assert_eq!(stats.grammar, 2);
        assert_eq!(stats.delivery, 1);
        assert_eq!(stats.clarity, 0);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.count(SuggestionType::Grammar), 2);
    }

    #[test]
    fn test_toggles_default_on_and_partial_json() {
        let toggles: CategoryToggles = serde_json::from_str(r#"{"clarity":false}"#).unwrap();
        assert!(toggles.grammar);
        assert!(!toggles.allows(SuggestionType::Clarity));
        assert!(CategoryToggles::default().allows(SuggestionType::Delivery));
    }
}
