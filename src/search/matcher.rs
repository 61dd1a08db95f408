use serde::Deserialize;
use serde::Serialize;

/// How a search term is compared against field values.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Primary field equals the term, ignoring case and padding
    Exact,
    /// Term occurs in any field, ignoring case
    #[default]
    Fuzzy,
}

/// Multi-column match over `(name, value)` pairs.
///
/// In exact mode only the first (primary) field is compared. In fuzzy mode the
/// term is a plain case-insensitive substring test against every non-empty
/// field: a numeric term such as `"100"` also matches `"51005"`.
pub fn matches(term: &str, mode: MatchMode, fields: &[(&str, &str)]) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return false;
    }
    match mode {
        MatchMode::Exact => fields
            .first()
            .map(|(_, value)| value.trim().to_lowercase() == term.to_lowercase())
            .unwrap_or(false),
        MatchMode::Fuzzy => {
            let term = term.to_lowercase();
            fields
                .iter()
                .map(|(_, value)| value.trim())
                .filter(|value| !value.is_empty())
                .any(|value| value.to_lowercase().contains(&term))
        }
    }
}
