//! Effort auto-upgrade.

use shrimp_core::Effort;

/// Lower-case phrases that ask for a deep research pass.
pub const DEEP_RESEARCH_PHRASES: [&str; 9] = [
    "deep research",
    "long thinking",
    "thorough research",
    "comprehensive research",
    "exhaustive",
    "deep dive",
    "extensive research",
    "as many sources",
    "every relevant",
];

/// Whether the query asks for deep research (case-insensitive substring match).
pub fn is_deep_research(query: &str) -> bool {
    let query = query.to_lowercase();
    DEEP_RESEARCH_PHRASES.iter().any(|p| query.contains(p))
}

/// The tier a Run actually uses.
///
/// Only the default tier is ever upgraded; an explicit `quick` or `deep`
/// is left alone.
pub fn resolve_effort(requested: Effort, query: &str) -> Effort {
    if requested == Effort::Normal && is_deep_research(query) {
        Effort::Deep
    } else {
        requested
    }
}
