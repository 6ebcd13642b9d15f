//! Message intent classification.
//!
//! Pure, deterministic, case-insensitive substring matching against
//! ordered rule data. The rule sets are plain data rather than branching
//! code, so they can be inspected and tested independently of the
//! dispatch order. Precedence is fixed: creation → modification →
//! question; a message matching several sets takes the first.

use souschef_core::message::MessageIntent;
use tracing::debug;

/// The ordered classification rules. First matching set wins.
const RULES: &[(MessageIntent, &[&str])] = &[
    (
        MessageIntent::RecipeCreation,
        &[
            "recipe for",
            "how to make",
            "how do i make",
            "can you give me a recipe",
            "i want to make",
            "create a recipe",
            "write a recipe",
        ],
    ),
    (
        MessageIntent::RecipeModification,
        &[
            "modify",
            "change",
            "adjust",
            "instead of",
            "substitute",
            "make it",
            "can we",
            "could we",
            "spicier",
            "sweeter",
            "vegan",
            "vegetarian",
            "gluten-free",
            "dairy-free",
        ],
    ),
    (
        MessageIntent::CookingQuestion,
        &[
            "how do i",
            "what temperature",
            "how long",
            "when should i",
            "is it done",
            "what does it mean",
            "how can i tell",
            "what if",
        ],
    ),
];

/// The rule table, exposed so tests can exercise phrase sets directly.
pub fn rules() -> &'static [(MessageIntent, &'static [&'static str])] {
    RULES
}

/// Classify a raw user message into an intent category.
///
/// Falls back to [`MessageIntent::GeneralQuestion`] — classification
/// cannot fail.
pub fn classify(text: &str) -> MessageIntent {
    let lower = text.to_lowercase();

    for (intent, phrases) in RULES {
        if phrases.iter().any(|phrase| lower.contains(phrase)) {
            debug!(intent = %intent, "Classified message");
            return *intent;
        }
    }

    debug!(intent = %MessageIntent::GeneralQuestion, "Classified message");
    MessageIntent::GeneralQuestion
}
