//! Keyword sentiment classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PhraseLists;

/// Coarse visitor mood. `Timeout` is never produced by classification; the
/// inactivity reaper stamps it on sessions it closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Frustrated,
    Timeout,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Frustrated => "frustrated",
            Sentiment::Timeout => "timeout",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `true` if any phrase (lowercased) occurs in `lowered`.
pub fn contains_any(lowered: &str, phrases: &[String]) -> bool {
    phrases
        .iter()
        .any(|p| !p.is_empty() && lowered.contains(&p.to_lowercase()))
}

/// The frustrated list is scanned in full before the positive list.
pub fn classify(message: &str, phrases: &PhraseLists) -> Sentiment {
    let lowered = message.to_lowercase();
    if contains_any(&lowered, &phrases.frustrated) {
        Sentiment::Frustrated
    } else if contains_any(&lowered, &phrases.positive) {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_default(msg: &str) -> Sentiment {
        classify(msg, &PhraseLists::default())
    }

    #[test]
    fn frustrated_phrase() {
        assert_eq!(classify_default("aku kesel banget"), Sentiment::Frustrated);
    }

    #[test]
    fn positive_phrase() {
        assert_eq!(classify_default("Terima kasih ya"), Sentiment::Positive);
    }

    #[test]
    fn neutral_otherwise() {
        assert_eq!(classify_default("berapa lama prosesnya?"), Sentiment::Neutral);
    }

    #[test]
    fn frustrated_wins_over_positive() {
        // "terima kasih" is positive, "payah" is frustrated.
        assert_eq!(classify_default("terima kasih, tapi payah"), Sentiment::Frustrated);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(classify_default("SAYA KECEWA"), Sentiment::Frustrated);
    }

    #[test]
    fn custom_lists_respected() {
        let phrases = PhraseLists {
            frustrated: vec!["ugh".into()],
            positive: vec!["yay".into()],
            human_request: vec![],
            uncertainty: vec![],
        };
        assert_eq!(classify("UGH", &phrases), Sentiment::Frustrated);
        assert_eq!(classify("yay", &phrases), Sentiment::Positive);
        assert_eq!(classify("kesel", &phrases), Sentiment::Neutral);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Sentiment::Timeout).unwrap(), "\"timeout\"");
        assert_eq!(Sentiment::default(), Sentiment::Neutral);
    }
}
