/// Where a participant utterance gets dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutedIntent {
    Greeting,
    Farewell,
    EscalationRequest,
    Question,
}

/// Lexical first-pass classifier. Routing is decided here, in code, and the
/// turn processor dispatches on the result; no prompt text is involved.
/// Anything not recognized falls through to `Question`, the handler that can
/// actually retrieve context and answer.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntentRouter;

const ESCALATION_PHRASES: &[&str] = &[
    "speak to a human",
    "talk to a human",
    "speak to someone",
    "talk to someone",
    "speak with a human",
    "human agent",
    "real person",
    "real human",
    "customer representative",
    "speak to a representative",
    "talk to a representative",
    "connect me to",
    "escalate",
];

const GREETING_WORDS: &[&str] =
    &["hi", "hello", "hey", "hiya", "howdy", "good morning", "good afternoon", "good evening"];

const FAREWELL_WORDS: &[&str] =
    &["bye", "goodbye", "bye bye", "see you", "see ya", "good night", "that's all", "thats all"];

impl IntentRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, utterance: &str) -> RoutedIntent {
        let normalized = normalize(utterance);
        if normalized.is_empty() {
            return RoutedIntent::Question;
        }

        if ESCALATION_PHRASES.iter().any(|phrase| normalized.contains(phrase)) {
            return RoutedIntent::EscalationRequest;
        }

        // Greetings and farewells only win for short utterances; "hi, where
        // is my refund" is a question with a greeting attached.
        let word_count = normalized.split_whitespace().count();
        if word_count <= 4 {
            if GREETING_WORDS.iter().any(|word| starts_with_word(&normalized, word)) {
                return RoutedIntent::Greeting;
            }
            if FAREWELL_WORDS.iter().any(|word| matches_word(&normalized, word)) {
                return RoutedIntent::Farewell;
            }
        }

        RoutedIntent::Question
    }
}

fn normalize(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch.is_whitespace() || ch == '\'' {
            normalized.extend(ch.to_lowercase());
        } else {
            normalized.push(' ');
        }
    }
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_word(normalized: &str, word: &str) -> bool {
    normalized == word || normalized.starts_with(&format!("{word} "))
}

fn matches_word(normalized: &str, word: &str) -> bool {
    normalized == word
        || normalized.starts_with(&format!("{word} "))
        || normalized.ends_with(&format!(" {word}"))
        || normalized.contains(&format!(" {word} "))
}
