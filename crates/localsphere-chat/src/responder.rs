//! Canned intent responder.
//!
//! Classifies free text against a greeting pattern and two department
//! keywords, then answers with a fixed string after a simulated processing
//! delay. There is no state and no failure path.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use localsphere_core::config::ChatConfig;
use localsphere_core::types::Department;

/// Fixed greeting, also used as the landing-page welcome.
pub const GREETING: &str =
    "Welcome to LocalSphere. Welcome to PublicSphere. How can I assist you with city services today?";

pub const HOUSING_ANSWER: &str = "To apply for housing assistance, start by verifying your eligibility based on [regional income limits](https://www.hud.gov/contactus/public-housing-contacts). Once confirmed, you can submit an initial application to the [Section 8 waitlist](https://www.huduser.gov/portal/datasets/il.html) or view current affordable [listings](https://www.hud.gov/fha) for affordable housing.";

pub const TAX_ANSWER: &str = "To file your local taxes, start by gathering your income statements (W-2s, 1099s) and previous year's return. Calculate your local deduction, then choose a digital filing option below for immediate processing.";

pub const GENERAL_ANSWER: &str = "I can assist you with local government services. Please select a department or type your specific question below.";

static GREETING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(hi|hello|hey|greetings)\b").expect("Invalid greeting regex"));

const HOUSING_KEYWORD: &str = "hous";
const TAX_KEYWORD: &str = "tax";

/// Outcome of classifying one input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Housing,
    Tax,
    General,
}

impl Intent {
    /// Classify `input` in the context of the caller's department.
    ///
    /// Order: greeting, then housing keyword, then tax keyword, then the
    /// caller's department.
    pub fn classify(input: &str, department: Department) -> Self {
        let text = input.to_lowercase();
        if GREETING_RE.is_match(&text) {
            return Intent::Greeting;
        }

        let context = if text.contains(HOUSING_KEYWORD) {
            Department::Housing
        } else if text.contains(TAX_KEYWORD) {
            Department::Tax
        } else {
            department
        };

        match context {
            Department::Housing => Intent::Housing,
            Department::Tax => Intent::Tax,
            _ => Intent::General,
        }
    }

    pub fn answer(&self) -> &'static str {
        match self {
            Intent::Greeting => GREETING,
            Intent::Housing => HOUSING_ANSWER,
            Intent::Tax => TAX_ANSWER,
            Intent::General => GENERAL_ANSWER,
        }
    }
}

/// A responder answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub intent: Intent,
    pub text: String,
}

/// Something that answers chat input. Always succeeds.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, input: &str, department: Department) -> Reply;
}

/// Keyword responder with a randomized simulated latency.
#[derive(Clone, Debug)]
pub struct IntentResponder {
    min_latency: Duration,
    max_latency: Duration,
}

impl IntentResponder {
    /// Latency is drawn uniformly from `[min_latency, max_latency)`.
    pub fn new(min_latency: Duration, max_latency: Duration) -> Self {
        Self {
            min_latency,
            max_latency,
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        let (min, max) = config.responder_latency();
        Self::new(min, max)
    }

    /// A responder that answers without delay.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draw one simulated latency. A degenerate range yields `min_latency`.
    pub fn sample_latency(&self) -> Duration {
        let min = self.min_latency.as_millis() as u64;
        let max = self.max_latency.as_millis() as u64;
        if max <= min {
            return self.min_latency;
        }
        Duration::from_millis(rand::rng().random_range(min..max))
    }
}

impl Default for IntentResponder {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}

#[async_trait]
impl Responder for IntentResponder {
    async fn respond(&self, input: &str, department: Department) -> Reply {
        let delay = self.sample_latency();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let intent = Intent::classify(input, department);
        tracing::debug!(?intent, department = %department, delay_ms = delay.as_millis() as u64, "Responder answered");
        Reply {
            intent,
            text: intent.answer().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Greetings ----

    #[test]
    fn test_greeting_wins_in_every_department() {
        for dept in Department::ALL {
            for input in ["hi", "Hello there", "HEY!", "greetings, clerk", "well hi"] {
                assert_eq!(Intent::classify(input, dept), Intent::Greeting, "{input} in {dept}");
            }
        }
    }

    #[test]
    fn test_greeting_beats_keywords() {
        assert_eq!(
            Intent::classify("hello, I need housing", Department::Tax),
            Intent::Greeting
        );
    }

    #[test]
    fn test_greeting_needs_word_boundary() {
        // "this" and "they" contain greeting letters but not greeting words.
        assert_ne!(Intent::classify("this", Department::Home), Intent::Greeting);
        assert_ne!(Intent::classify("they said", Department::Home), Intent::Greeting);
        assert_ne!(Intent::classify("highway", Department::Home), Intent::Greeting);
    }

    // ---- Keywords ----

    #[test]
    fn test_housing_keyword_overrides_department() {
        for dept in Department::ALL {
            assert_eq!(
                Intent::classify("How to apply for housing?", dept),
                Intent::Housing
            );
        }
    }

    #[test]
    fn test_housing_keyword_substring() {
        assert_eq!(Intent::classify("my HOUSE needs repairs", Department::Home), Intent::Housing);
    }

    #[test]
    fn test_housing_beats_tax() {
        assert_eq!(
            Intent::classify("property tax on my house", Department::Vehicle),
            Intent::Housing
        );
    }

    #[test]
    fn test_tax_keyword_overrides_department() {
        assert_eq!(Intent::classify("How to file taxes?", Department::Benefits), Intent::Tax);
        assert_eq!(Intent::classify("syntax", Department::Home), Intent::Tax);
    }

    // ---- Department fallback ----

    #[test]
    fn test_department_context_when_no_keyword() {
        assert_eq!(Intent::classify("what forms?", Department::Housing), Intent::Housing);
        assert_eq!(Intent::classify("what forms?", Department::Tax), Intent::Tax);
        assert_eq!(Intent::classify("what forms?", Department::Vehicle), Intent::General);
        assert_eq!(Intent::classify("what forms?", Department::Benefits), Intent::General);
        assert_eq!(Intent::classify("what forms?", Department::Home), Intent::General);
    }

    #[test]
    fn test_empty_input_is_general() {
        assert_eq!(Intent::classify("", Department::Home), Intent::General);
    }

    // ---- Answers ----

    #[test]
    fn test_housing_answer_mentions_waitlist() {
        assert!(Intent::Housing.answer().contains("Section 8 waitlist"));
        assert!(Intent::Housing.answer().contains("](https://"));
    }

    #[test]
    fn test_answers_are_distinct() {
        let answers = [
            Intent::Greeting.answer(),
            Intent::Housing.answer(),
            Intent::Tax.answer(),
            Intent::General.answer(),
        ];
        let unique: std::collections::HashSet<_> = answers.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    // ---- Latency ----

    #[test]
    fn test_sample_latency_within_range() {
        let responder = IntentResponder::default();
        for _ in 0..200 {
            let d = responder.sample_latency();
            assert!(d >= Duration::from_millis(400));
            assert!(d < Duration::from_millis(800));
        }
    }

    #[test]
    fn test_sample_latency_degenerate_range() {
        let responder = IntentResponder::new(Duration::from_millis(50), Duration::from_millis(10));
        assert_eq!(responder.sample_latency(), Duration::from_millis(50));
        assert_eq!(IntentResponder::instant().sample_latency(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_respond_scenario_housing_in_tax() {
        let reply = IntentResponder::instant()
            .respond("How to apply for housing?", Department::Tax)
            .await;
        assert_eq!(reply.intent, Intent::Housing);
        assert!(reply.text.contains("Section 8 waitlist"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_respond_waits_simulated_latency() {
        let responder = IntentResponder::new(Duration::from_millis(400), Duration::from_millis(800));
        let started = tokio::time::Instant::now();
        let reply = responder.respond("hi", Department::Home).await;
        let elapsed = started.elapsed();
        assert_eq!(reply.text, GREETING);
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed < Duration::from_millis(800));
    }
}
