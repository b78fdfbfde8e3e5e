//! Renter/owner chat with an automatic owner reply.
//!
//! Every message the renter sends is answered on the owner's behalf by an
//! [`AutoResponder`]: the first [`ReplyRule`] whose regex matches the text
//! supplies a canned reply, otherwise one of the fallback replies is picked
//! at random. The reply lands after a random delay drawn from a
//! [`ReplyDelay`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use carshare::chat::{AutoResponder, Conversation, ReplyDelay};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut chat = Conversation::new(
//!     Arc::new(AutoResponder::default()),
//!     ReplyDelay::none(),
//!     StdRng::seed_from_u64(7),
//! );
//! let reply = chat.send("What's the price?").await.unwrap();
//! assert!(reply.text.contains("daily rate"));
//! # }
//! ```

mod rules;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ChatConfig;
use crate::error::Result;

pub use rules::{builtin_rules, default_fallbacks, ReplyRule};

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The prospective renter.
    Renter,
    /// The car's owner.
    Owner,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier, unique within a conversation.
    pub id: String,
    /// Message text.
    pub text: String,
    /// Who sent it.
    pub sender: Sender,
    /// When it was sent.
    pub timestamp: DateTime<Utc>,
}

/// Picks the owner's reply to a renter message.
#[derive(Debug, Clone)]
pub struct AutoResponder {
    rules: Vec<ReplyRule>,
    fallbacks: Vec<String>,
}

impl Default for AutoResponder {
    fn default() -> Self {
        Self::new(builtin_rules(), default_fallbacks())
    }
}

impl AutoResponder {
    /// Create a responder from ordered rules and fallback replies.
    ///
    /// An empty fallback list is replaced with the built-in one.
    #[must_use]
    pub fn new(rules: Vec<ReplyRule>, fallbacks: Vec<String>) -> Self {
        let fallbacks = if fallbacks.is_empty() {
            default_fallbacks()
        } else {
            fallbacks
        };
        Self { rules, fallbacks }
    }

    /// Build from configuration: configured rules first, then the built-ins.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a configured pattern is invalid.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        let mut rules = config
            .rules
            .iter()
            .map(ReplyRule::from_config)
            .collect::<Result<Vec<_>>>()?;
        rules.extend(builtin_rules());
        Ok(Self::new(rules, config.fallbacks.clone()))
    }

    /// Rules in match order.
    #[must_use]
    pub fn rules(&self) -> &[ReplyRule] {
        &self.rules
    }

    /// Fallback replies.
    #[must_use]
    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }

    /// The first rule matching `text`.
    #[must_use]
    pub fn matching_rule(&self, text: &str) -> Option<&ReplyRule> {
        self.rules.iter().find(|rule| rule.matches(text))
    }

    /// Choose the reply to `text`.
    pub fn respond<R: Rng>(&self, text: &str, rng: &mut R) -> &str {
        if let Some(rule) = self.matching_rule(text) {
            debug!(rule = %rule.name, "Matched reply rule");
            return &rule.reply;
        }
        let pick = rng.gen_range(0..self.fallbacks.len());
        debug!(fallback = pick, "No rule matched");
        &self.fallbacks[pick]
    }
}

/// Range the owner reply delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyDelay {
    min: Duration,
    max: Duration,
}

impl ReplyDelay {
    /// A delay between `min` and `max`; the bounds are swapped if inverted.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Reply immediately.
    #[must_use]
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// The configured delay range.
    #[must_use]
    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.reply_delay_min(), config.reply_delay_max())
    }

    /// Draw a delay.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

/// A chat between a renter and a car's owner.
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    responder: Arc<AutoResponder>,
    delay: ReplyDelay,
    rng: StdRng,
    next_id: u64,
}

impl Conversation {
    /// Start an empty conversation.
    #[must_use]
    pub fn new(responder: Arc<AutoResponder>, delay: ReplyDelay, rng: StdRng) -> Self {
        Self {
            messages: Vec::new(),
            responder,
            delay,
            rng,
            next_id: 1,
        }
    }

    /// Messages in the order they were sent.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Append a message without triggering a reply.
    pub fn post(&mut self, sender: Sender, text: impl Into<String>) -> &ChatMessage {
        let message = ChatMessage {
            id: format!("msg-{}", self.next_id),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        };
        self.next_id += 1;
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    /// Send a renter message and wait for the owner's reply.
    ///
    /// The text is trimmed; blank input is ignored and returns `None`.
    pub async fn send(&mut self, text: &str) -> Option<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.post(Sender::Renter, text);

        let reply = self.responder.respond(text, &mut self.rng).to_string();
        let delay = self.delay.sample(&mut self.rng);
        debug!(?delay, "Owner reply scheduled");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Some(self.post(Sender::Owner, reply).clone())
    }
}
