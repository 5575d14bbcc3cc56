use regex::{Regex, RegexSet};

use parley_core::errors::{CoreError, CoreResult};

/// Reply returned when the legacy block keyword appears in the utterance.
pub const BLOCKED_CONTENT_REPLY: &str =
    "I cannot process this request because it contains unsafe content.";

/// Reply returned when a prompt-injection phrasing is detected.
pub const INJECTION_REPLY: &str =
    "I'm here to help with your questions about our services. How can I assist you today?";

/// Known prompt-injection phrasings, matched case-insensitively against the
/// latest participant utterance before the model is ever called.
const INJECTION_PATTERNS: &[&str] = &[
    r"(?i)ignore\s+(all\s+)?(previous|prior|above)\s+instructions?",
    r"(?i)disregard\s+(all\s+)?(previous|prior|above)\s+instructions?",
    r"(?i)forget\s+(all\s+)?(previous|prior|above)\s+instructions?",
    r"(?i)you\s+are\s+now\s+(a|an|being)",
    r"(?i)new\s+instructions?",
    r"(?i)system\s+prompt",
    r"(?i)reveal\s+your\s+(instructions?|prompt|system)",
    r"(?i)show\s+(me\s+)?your\s+(instructions?|prompt|system)",
    r"(?i)what\s+(are|is)\s+your\s+(instructions?|prompt|system)",
    r"(?i)list\s+(all\s+)?(available\s+)?tools?",
    r"(?i)show\s+(me\s+)?(all\s+)?tools?",
    r"(?i)what\s+tools\s+do\s+you\s+have",
    r"(?i)bypass\s+restrictions?",
    r"(?i)override\s+your\s+(instructions?|rules?|settings?)",
    r"(?i)pretend\s+(you|to)\s+(are|be)",
    r"(?i)roleplay\s+as",
    r"(?i)act\s+as\s+if",
];

/// Ordered substitutions stripping internal nouns from generated replies.
/// Replacements must not themselves match any earlier pattern, which keeps
/// the table idempotent.
const SANITIZE_RULES: &[(&str, &str)] = &[
    (r"(?i)\b(greeting_handler|farewell_handler|question_handler|escalation_handler)\b", ""),
    (
        r"(?i)(transfer|delegate|forward)\s+(you\s+)?to\s+(the\s+)?(greeting|farewell|question|escalation)[\s_]handler",
        "help you",
    ),
    (r"(?i)I\s+can\s+(transfer|delegate|forward)\s+you\s+to", "I can help you with"),
    (r"(?i)my\s+knowledge\s+base\s+(includes?|contains?|has)", "I can help with"),
    (
        r"(?i)I\s+can\s+access\s+(information|data)\s+(about|on)",
        "I can provide information about",
    ),
    (r"(?i)according\s+to\s+my\s+knowledge\s+base", "based on the information available"),
    (r"(?i)using\s+the\s+'?query_context'?\s+tool", "by checking our resources"),
    (r"(?i)I'll\s+use\s+the\s+'?query_context'?\s+tool", "I'll look that up for you"),
    (r"(?i)\b(query_context|escalate_to_human)\b", ""),
    (r"(?i)specialized\s+handlers?", "our support team"),
    (r"(?i)in\s+(the|our)\s+database", "in our records"),
];

/// Pre-call inspector plus post-call sanitizer around the model call.
pub struct GuardrailChain {
    injection: RegexSet,
    sanitize_rules: Vec<(Regex, &'static str)>,
    whitespace: Regex,
}

impl GuardrailChain {
    pub fn new() -> CoreResult<Self> {
        let injection = RegexSet::new(INJECTION_PATTERNS)
            .map_err(|err| CoreError::Configuration(format!("guardrail pattern: {err}")))?;

        let mut sanitize_rules = Vec::with_capacity(SANITIZE_RULES.len());
        for (pattern, replacement) in SANITIZE_RULES {
            let regex = Regex::new(pattern)
                .map_err(|err| CoreError::Configuration(format!("sanitizer pattern: {err}")))?;
            sanitize_rules.push((regex, *replacement));
        }

        let whitespace = Regex::new(r"\s+")
            .map_err(|err| CoreError::Configuration(format!("sanitizer pattern: {err}")))?;

        Ok(Self { injection, sanitize_rules, whitespace })
    }

    /// Scans a participant utterance before the model call. Returns the fixed
    /// safe reply when the utterance must be blocked; the model is never
    /// called in that case.
    pub fn inspect(&self, utterance: &str) -> Option<&'static str> {
        // Legacy keyword check predates the pattern list and is kept as-is.
        if utterance.to_uppercase().contains("BLOCK") {
            return Some(BLOCKED_CONTENT_REPLY);
        }

        if self.injection.is_match(utterance) {
            return Some(INJECTION_REPLY);
        }

        None
    }

    /// Applies the substitution table in order, then normalizes whitespace.
    /// Returns `Some` only when the text actually changed.
    pub fn sanitize(&self, reply: &str) -> Option<String> {
        let mut sanitized = reply.to_string();
        for (regex, replacement) in &self.sanitize_rules {
            sanitized = regex.replace_all(&sanitized, *replacement).into_owned();
        }
        sanitized = self.whitespace.replace_all(&sanitized, " ").trim().to_string();

        (sanitized != reply).then_some(sanitized)
    }
}
