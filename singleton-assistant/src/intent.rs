//! Chooses how a search query should be answered

use crate::responder::ResponseMode;
use regex::Regex;

const CODE_REQUEST: &[&str] = &[
    "add", "implement", "create", "write", "build", "generate", "feature", "ekle", "yaz",
    "oluştur", "olustur", "özellik", "ozellik",
];
const ERROR_HELP: &[&str] = &[
    "error", "bug", "fix", "crash", "exception", "fails", "failing", "broken", "debug", "hata",
    "düzelt", "duzelt", "sorun", "çöküyor",
];
const SUMMARY_REQUEST: &[&str] = &[
    "summary", "summarize", "summarise", "overview", "architecture", "structure", "explain",
    "özet", "ozet", "özetle", "mimari", "yapı", "açıkla",
];

struct IntentRule {
    mode: ResponseMode,
    pattern: Regex,
}

/// Ordered keyword rules; the first whole-word match decides.
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl IntentClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        let rule = |mode, words: &[&str]| -> Result<IntentRule, regex::Error> {
            let alternation = words.iter().map(|w| regex::escape(w)).collect::<Vec<_>>().join("|");
            Ok(IntentRule {
                mode,
                pattern: Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))?,
            })
        };
        Ok(Self {
            rules: vec![
                rule(ResponseMode::FeatureSuggestion, CODE_REQUEST)?,
                rule(ResponseMode::Debugging, ERROR_HELP)?,
                rule(ResponseMode::ArchitectureSummary, SUMMARY_REQUEST)?,
            ],
        })
    }

    pub fn classify(&self, query: &str) -> ResponseMode {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(query))
            .map(|rule| rule.mode)
            .unwrap_or(ResponseMode::CodeAnalysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() -> Result<(), regex::Error> {
        let intents = IntentClassifier::new()?;
        assert_eq!(intents.classify("add a login page"), ResponseMode::FeatureSuggestion);
        assert_eq!(intents.classify("why does this CRASH"), ResponseMode::Debugging);
        assert_eq!(intents.classify("proje mimari özet"), ResponseMode::ArchitectureSummary);
        assert_eq!(intents.classify("database.ts"), ResponseMode::CodeAnalysis);
        Ok(())
    }

    #[test]
    fn test_order_and_whole_words() -> Result<(), regex::Error> {
        let intents = IntentClassifier::new()?;
        // code request comes before error help
        assert_eq!(intents.classify("write a fix for the bug"), ResponseMode::FeatureSuggestion);
        assert_eq!(intents.classify("hata var"), ResponseMode::Debugging);
        assert_eq!(intents.classify("address parser"), ResponseMode::CodeAnalysis);
        assert_eq!(intents.classify("errors.rs"), ResponseMode::CodeAnalysis);
        Ok(())
    }
}
