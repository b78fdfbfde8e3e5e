//! Auto-responder rules.
//!
//! A rule pairs a regex with a canned reply. Rules are kept in an ordered
//! list; the first rule whose regex matches the incoming text wins.

use regex::Regex;

use crate::config::ChatRuleConfig;
use crate::error::{Error, Result};

/// A compiled reply rule.
#[derive(Debug, Clone)]
pub struct ReplyRule {
    /// Name of the rule for identification.
    pub name: String,

    /// The canned reply.
    pub reply: String,

    regex: Regex,
}

impl ReplyRule {
    /// Create a rule from a pattern.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern is not a valid regex.
    pub fn new(name: impl Into<String>, pattern: &str, reply: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let regex = Regex::new(pattern).map_err(|e| Error::ConfigValidation {
            message: format!("invalid regex pattern in rule '{name}': {e}"),
        })?;
        Ok(Self {
            name,
            reply: reply.into(),
            regex,
        })
    }

    /// Create a rule from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern is not a valid regex.
    pub fn from_config(rule: &ChatRuleConfig) -> Result<Self> {
        Self::new(rule.name.clone(), &rule.pattern, rule.reply.clone())
    }

    /// # Panics
    ///
    /// Panics if the regex pattern is invalid.
    fn builtin(name: &str, pattern: &str, reply: &str) -> Self {
        Self {
            name: name.to_string(),
            reply: reply.to_string(),
            regex: Regex::new(pattern).expect("Invalid built-in regex pattern"),
        }
    }

    /// Check if the text matches this rule.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// The rule's regex source.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// Get the built-in rules, in match order.
#[must_use]
pub fn builtin_rules() -> Vec<ReplyRule> {
    vec![
        ReplyRule::builtin(
            "price",
            r"(?i)(price|pricing|\bcosts?\b|\brates?\b|how much|discount|cheaper)",
            "The daily rate is on the listing. Longer rentals can get a better rate, just ask!",
        ),
        ReplyRule::builtin(
            "availability",
            r"(?i)\b(available|availability|free|book|booking|booked|this weekend)\b",
            "Yes, it's available! When would you like to pick it up?",
        ),
        ReplyRule::builtin(
            "pickup",
            r"(?i)\b(pick ?up|drop ?off|location|where|meet|address)\b",
            "We can meet at the location on the listing, or somewhere nearby that suits you.",
        ),
        ReplyRule::builtin(
            "documents",
            r"(?i)\b(licen[cs]e|documents?|insurance|registration|agreement)\b",
            "I'll need to see your license and we can sign the rental agreement.",
        ),
        ReplyRule::builtin(
            "deposit",
            r"(?i)\b(deposit|payment|pay|refund)\b",
            "There's a refundable security deposit, paid when the rental starts.",
        ),
        ReplyRule::builtin(
            "greeting",
            r"(?i)^\s*(hi|hello|hey|good (morning|afternoon|evening))\b",
            "Hi! Thanks for your interest in the car. How can I help?",
        ),
    ]
}

/// Get the built-in fallback replies.
#[must_use]
pub fn default_fallbacks() -> Vec<String> {
    [
        "That sounds good!",
        "I'll get back to you shortly.",
        "Perfect timing!",
        "Let me check my schedule.",
        "Great choice!",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_match(text: &str) -> Option<String> {
        builtin_rules()
            .into_iter()
            .find(|r| r.matches(text))
            .map(|r| r.name)
    }

    #[test]
    fn test_builtin_rules_compile() {
        let rules = builtin_rules();
        assert_eq!(rules.len(), 6);
        assert!(rules.iter().all(|r| !r.reply.is_empty()));
    }

    #[test]
    fn test_price_rule() {
        assert_eq!(first_match("What's the price?").as_deref(), Some("price"));
        assert_eq!(first_match("how much for 3 days").as_deref(), Some("price"));
        assert_eq!(first_match("PRICE").as_deref(), Some("price"));
    }

    #[test]
    fn test_rule_order_decides() {
        // mentions both availability and price, price comes first
        assert_eq!(
            first_match("Is it available and what is the price?").as_deref(),
            Some("price")
        );
        assert_eq!(
            first_match("Hi, is it still available?").as_deref(),
            Some("availability")
        );
    }

    #[test]
    fn test_other_rules() {
        assert_eq!(first_match("Where do we meet?").as_deref(), Some("pickup"));
        assert_eq!(
            first_match("Do you need my driver's license?").as_deref(),
            Some("documents")
        );
        assert_eq!(
            first_match("When do I pay the deposit?").as_deref(),
            Some("deposit")
        );
        assert_eq!(first_match("hello there").as_deref(), Some("greeting"));
    }

    #[test]
    fn test_word_boundaries() {
        // short words need a leading boundary, "price" matches anywhere
        assert_eq!(first_match("underrated car, very accurate"), None);
        assert_eq!(first_match("Is it overpriced?").as_deref(), Some("price"));
        assert_eq!(first_match("How is it priced?").as_deref(), Some("price"));
        assert_eq!(first_match("thanks!"), None);
    }

    #[test]
    fn test_custom_rule() {
        let rule = ReplyRule::new("pets", r"(?i)\bdogs?\b", "Pets are welcome.").unwrap();
        assert!(rule.matches("Can I bring my dog?"));
        assert!(!rule.matches("Can I bring my cat?"));
        assert_eq!(rule.pattern(), r"(?i)\bdogs?\b");
    }

    #[test]
    fn test_invalid_custom_rule() {
        let err = ReplyRule::new("broken", "[oops", "x").unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_default_fallbacks() {
        let fallbacks = default_fallbacks();
        assert_eq!(fallbacks.len(), 5);
        assert!(fallbacks.contains(&"Let me check my schedule.".to_string()));
    }
}
