//! Token-budgeted context building for LLM consumption.
//!
//! [`ContextWindowManager`] turns a ranked list of interactions into a
//! single context string bounded by a token budget, preserving the caller's
//! ordering. The last partially-fitting interaction is truncated at a
//! sentence boundary when one exists, else at the nearest word.

mod chunk;
mod tokens;

use std::sync::Arc;

use crate::interaction::Interaction;
use crate::types::ContextSettings;

pub use chunk::{Chunk, ChunkOptions, chunk};
pub use tokens::{CharTokenEstimator, TokenEstimator};

/// Default per-interaction rendering template.
pub const DEFAULT_TEMPLATE: &str = "User: {prompt}\nAssistant: {response}";

/// Separator inserted between rendered interactions.
const ENTRY_SEPARATOR: &str = "\n\n";

/// Options for [`ContextWindowManager::build_context`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Total token budget
    pub max_tokens: usize,
    /// Tokens held back for the downstream prompt
    pub reserve_tokens: usize,
    /// Per-interaction template with `{prompt}` and `{response}`
    /// placeholders; `None` uses [`DEFAULT_TEMPLATE`]
    pub template: Option<String>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        let settings = ContextSettings::default();
        Self {
            max_tokens: settings.default_max_tokens,
            reserve_tokens: 0,
            template: None,
        }
    }
}

impl ContextOptions {
    /// Budgeted options with no reservation.
    #[must_use]
    pub fn with_budget(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }

    /// Hold back tokens for the downstream prompt.
    #[must_use]
    pub fn reserve(mut self, reserve_tokens: usize) -> Self {
        self.reserve_tokens = reserve_tokens;
        self
    }
}

/// Builds token-bounded context strings from ranked interactions.
pub struct ContextWindowManager {
    estimator: Arc<dyn TokenEstimator>,
}

impl Default for ContextWindowManager {
    fn default() -> Self {
        Self::new(Arc::new(CharTokenEstimator::default()))
    }
}

impl ContextWindowManager {
    /// Create a manager with a custom token estimator.
    #[must_use]
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { estimator }
    }

    /// Create a manager using the character-ratio estimator from settings.
    #[must_use]
    pub fn from_settings(settings: &ContextSettings) -> Self {
        Self::new(Arc::new(CharTokenEstimator::new(settings.chars_per_token)))
    }

    /// Render interactions into a context string within the token budget.
    ///
    /// Interactions are included greedily in the given order until
    /// `max_tokens - reserve_tokens` would be exceeded; the first one that
    /// does not fit whole is truncated (sentence boundary preferred, word
    /// boundary otherwise) and ends the context.
    #[must_use]
    pub fn build_context(&self, interactions: &[Interaction], options: &ContextOptions) -> String {
        let budget = options.max_tokens.saturating_sub(options.reserve_tokens);
        if budget == 0 {
            return String::new();
        }
        let template = options.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);

        let mut context = String::new();
        let mut spent = 0usize;
        for interaction in interactions {
            let rendered = render(template, interaction);
            let separator = if context.is_empty() { "" } else { ENTRY_SEPARATOR };
            let cost = self.estimator.estimate(&rendered) + self.estimator.estimate(separator);

            if spent + cost <= budget {
                context.push_str(separator);
                context.push_str(&rendered);
                spent += cost;
                continue;
            }

            // Partial fit: truncate this entry and stop.
            let remaining = budget - spent;
            let sep_cost = self.estimator.estimate(separator);
            if remaining > sep_cost {
                let truncated = self.truncate_to_budget(&rendered, remaining - sep_cost);
                if !truncated.is_empty() {
                    context.push_str(separator);
                    context.push_str(&truncated);
                }
            }
            break;
        }
        context
    }

    /// Longest prefix within the token budget, cut at a sentence boundary
    /// when possible, else at a word boundary.
    fn truncate_to_budget(&self, text: &str, budget: usize) -> String {
        if self.estimator.estimate(text) <= budget {
            return text.to_string();
        }

        // Widest char prefix that fits the budget.
        let mut fit_end = 0usize;
        let mut prefix = String::new();
        for (offset, ch) in text.char_indices() {
            prefix.push(ch);
            if self.estimator.estimate(&prefix) > budget {
                break;
            }
            fit_end = offset + ch.len_utf8();
        }
        if fit_end == 0 {
            return String::new();
        }
        let window = &text[..fit_end];

        if let Some(end) = last_sentence_end(window) {
            return window[..end].trim_end().to_string();
        }
        match window.rfind(char::is_whitespace) {
            Some(end) if end > 0 => window[..end].trim_end().to_string(),
            _ => window.to_string(),
        }
    }
}

fn render(template: &str, interaction: &Interaction) -> String {
    template
        .replace("{prompt}", &interaction.prompt)
        .replace("{response}", &interaction.response)
}

/// Byte offset just past the last sentence terminator in the window, if
/// any.
fn last_sentence_end(window: &str) -> Option<usize> {
    let mut last = None;
    let mut chars = window.char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let next = chars.peek().map(|(_, c)| *c);
            if next.is_none() || next.is_some_and(char::is_whitespace) {
                last = Some(offset + ch.len_utf8());
            }
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn interaction(prompt: &str, response: &str) -> Interaction {
        Interaction::new(
            "id".into(),
            prompt.into(),
            response.into(),
            vec![1.0, 0.0],
            vec![],
            BTreeMap::new(),
        )
    }

    fn manager() -> ContextWindowManager {
        // 1 char = 1 token makes budgets easy to reason about.
        ContextWindowManager::new(Arc::new(CharTokenEstimator::new(1)))
    }

    #[test]
    fn test_everything_fits() {
        let interactions = vec![interaction("hi", "hello"), interaction("bye", "later")];
        let context = manager().build_context(&interactions, &ContextOptions::with_budget(200));
        assert_eq!(
            context,
            "User: hi\nAssistant: hello\n\nUser: bye\nAssistant: later"
        );
    }

    #[test]
    fn test_caller_order_preserved() {
        let interactions = vec![interaction("second", "b"), interaction("first", "a")];
        let context = manager().build_context(&interactions, &ContextOptions::with_budget(200));
        let second_pos = context.find("second").unwrap();
        let first_pos = context.find("first").unwrap();
        assert!(second_pos < first_pos);
    }

    #[test]
    fn test_reserve_shrinks_budget() {
        let interactions = vec![interaction("hi", "hello")];
        let options = ContextOptions::with_budget(30).reserve(30);
        assert!(manager().build_context(&interactions, &options).is_empty());
    }

    #[test]
    fn test_partial_fit_truncates_at_sentence() {
        let interactions = vec![interaction(
            "question",
            "First sentence. Second sentence that will not fit in the budget at all.",
        )];
        let options = ContextOptions::with_budget(50);
        let context = manager().build_context(&interactions, &options);
        assert!(context.ends_with("First sentence."));
        assert!(!context.contains("Second"));
    }

    #[test]
    fn test_partial_fit_falls_back_to_word_boundary() {
        let interactions = vec![interaction("q", "words without any terminator here at all")];
        let options = ContextOptions::with_budget(30);
        let context = manager().build_context(&interactions, &options);
        assert!(context.len() <= 30);
        // Cut on a word boundary, not mid-word.
        assert!(!context.ends_with(char::is_alphanumeric) || {
            let tail = context.rsplit(' ').next().unwrap_or("");
            "words without any terminator here at all".contains(tail)
        });
    }

    #[test]
    fn test_later_entries_dropped_after_partial() {
        let interactions = vec![
            interaction("long", &"x".repeat(100)),
            interaction("never", "seen"),
        ];
        let context = manager().build_context(&interactions, &ContextOptions::with_budget(40));
        assert!(!context.contains("never"));
    }

    #[test]
    fn test_custom_template() {
        let interactions = vec![interaction("p", "r")];
        let options = ContextOptions {
            max_tokens: 100,
            reserve_tokens: 0,
            template: Some("Q={prompt};A={response}".into()),
        };
        let context = manager().build_context(&interactions, &options);
        assert_eq!(context, "Q=p;A=r");
    }

    #[test]
    fn test_empty_interactions() {
        let context = manager().build_context(&[], &ContextOptions::default());
        assert!(context.is_empty());
    }

    #[test]
    fn test_last_sentence_end() {
        assert_eq!(last_sentence_end("One. Two"), Some(4));
        assert_eq!(last_sentence_end("One. Two."), Some(9));
        assert_eq!(last_sentence_end("no terminator"), None);
        // A dot inside a word (version number) is not a boundary.
        assert_eq!(last_sentence_end("v1.2 rocks"), None);
    }
}
