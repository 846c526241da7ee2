//! Model selector parsing.

/// Canonical default model used when a caller does not pick one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Provider assumed when a selector carries no `provider/` prefix.
pub const DEFAULT_PROVIDER: &str = "google";

/// Model-family substrings whose provider is pinned to [`DEFAULT_PROVIDER`].
///
/// The backend routes these families through the google provider regardless
/// of the prefix the caller wrote. Kept for wire parity with the server.
const PINNED_PROVIDER_FAMILIES: [&str; 2] = ["gemini", "claude"];

/// A resolved `(provider, model)` pair for one chat turn.
///
/// Model selection is bound per turn, not per session: the same session can
/// serve turns with different selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelector {
    pub provider: String,
    pub model: String,
}

impl ModelSelector {
    /// Parse a raw selector of the form `provider/model` or bare `model`.
    ///
    /// Splits on the first `/`; a bare model gets [`DEFAULT_PROVIDER`].
    /// Models in a pinned family always resolve to [`DEFAULT_PROVIDER`],
    /// even when an explicit prefix was given.
    pub fn parse(raw: &str) -> Self {
        let (provider, model) = match raw.split_once('/') {
            Some((provider, model)) => (provider.to_string(), model.to_string()),
            None => (DEFAULT_PROVIDER.to_string(), raw.to_string()),
        };

        let provider = if PINNED_PROVIDER_FAMILIES.iter().any(|f| model.contains(f)) {
            DEFAULT_PROVIDER.to_string()
        } else {
            provider
        };

        Self { provider, model }
    }
}

impl std::fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}
