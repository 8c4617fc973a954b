//! Lexical indicators read from input text: explicit mode cues and a small
//! lexicon-based sentiment polarity.

/// Explicit mode cues found in a piece of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexicalCues {
    /// The text asks for reflection or introspection.
    pub reflect: bool,
    /// The text asks for action or execution.
    pub act: bool,
}

const REFLECT_PHRASES: &[&str] = &["/takt", "/reflect"];
const REFLECT_PREFIXES: &[&str] = &["reflect", "reflekt", "introspect", "denk", "ponder"];

const ACT_PHRASES: &[&str] = &["/act", "tu was"];
const ACT_PREFIXES: &[&str] = &["execut", "aktion", "mach"];
const ACT_WORDS: &[&str] = &["act"];

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "happy", "joy", "love", "like", "excellent", "wonderful", "glad", "clear",
    "calm", "hope", "gut", "toll", "super", "freude", "liebe", "schön", "klar", "glücklich",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "sad", "hate", "terrible", "awful", "wrong", "angry", "afraid", "worried", "confused",
    "unsure", "uncertain", "lost", "fail", "failed", "schlecht", "traurig", "falsch", "angst",
    "hass", "schrecklich", "unsicher", "verwirrt", "wütend",
];

const NEGATORS: &[&str] = &["not", "no", "never", "nicht", "kein", "keine", "nie"];

fn words(lowered: &str) -> impl Iterator<Item = &str> {
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}

/// Scan `text` for explicit reflect/act cues.
pub fn scan_cues(text: &str) -> LexicalCues {
    let lowered = text.to_lowercase();

    let reflect = REFLECT_PHRASES.iter().any(|p| lowered.contains(p))
        || words(&lowered).any(|w| REFLECT_PREFIXES.iter().any(|p| w.starts_with(p)));

    let act = ACT_PHRASES.iter().any(|p| lowered.contains(p))
        || words(&lowered).any(|w| {
            ACT_WORDS.contains(&w) || ACT_PREFIXES.iter().any(|p| w.starts_with(p))
        });

    LexicalCues { reflect, act }
}

/// Sentiment polarity of `text` in `[-1, 1]`; 0 when no sentiment word occurs.
///
/// Each lexicon hit scores +1 or -1, flipped when the previous word is a
/// negator. The result is the mean over all hits.
pub fn sentiment(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    let mut total = 0.0;
    let mut hits = 0usize;
    let mut negated = false;

    for word in words(&lowered) {
        let value = if POSITIVE_WORDS.contains(&word) {
            Some(1.0)
        } else if NEGATIVE_WORDS.contains(&word) {
            Some(-1.0)
        } else {
            None
        };

        if let Some(value) = value {
            total += if negated { -value } else { value };
            hits += 1;
        }
        negated = NEGATORS.contains(&word);
    }

    if hits == 0 {
        0.0
    } else {
        total / hits as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect_cues() {
        assert!(scan_cues("Please reflect on this").reflect);
        assert!(scan_cues("Ich denke darüber nach").reflect);
        assert!(scan_cues("/takt").reflect);
        assert!(!scan_cues("Music causes joy").reflect);
    }

    #[test]
    fn test_act_cues() {
        assert!(scan_cues("Execute the plan").act);
        assert!(scan_cues("act now").act);
        assert!(scan_cues("Mach weiter").act);
        assert!(scan_cues("tu was!").act);
        assert!(!scan_cues("an exact fact").act);
    }

    #[test]
    fn test_sentiment_polarity() {
        assert!(sentiment("this is good and wonderful") > 0.9);
        assert!(sentiment("I feel sad and confused") < -0.9);
        assert_eq!(sentiment("the sky has colour"), 0.0);
    }

    #[test]
    fn test_negation_flips_sentiment() {
        assert!(sentiment("this is not good") < 0.0);
        assert!(sentiment("das ist nicht schlecht") > 0.0);
    }
}
