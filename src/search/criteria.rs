use crate::search::matcher::MatchMode;

/// Default cap on fuzzy catalog search results.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Criteria for free-text search over a legacy catalog.
#[derive(Clone, Debug)]
pub struct SearchCriteria {
    /// Search term; a blank term yields no results.
    pub term: String,

    /// Columns compared against the term, primary column first.
    pub fields: Vec<String>,

    /// Exact match on the primary column, or substring match on any column.
    pub mode: MatchMode,

    /// Maximum number of results; exact searches stop at the first hit regardless.
    pub limit: Option<usize>,
}

impl SearchCriteria {
    pub fn new(term: &str, fields: &[&str], mode: MatchMode) -> Self {
        Self {
            term: term.to_owned(),
            fields: fields.iter().map(|field| field.to_string()).collect(),
            mode,
            limit: Some(DEFAULT_SEARCH_LIMIT),
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Returns true if there is nothing to search for.
    pub fn is_blank(&self) -> bool {
        self.term.trim().is_empty()
    }

    /// Number of results after which the scan stops.
    pub fn cap(&self) -> usize {
        match self.mode {
            MatchMode::Exact => 1,
            MatchMode::Fuzzy => self.limit.unwrap_or(usize::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_cap() {
        let criteria = SearchCriteria::new("abc", &["CODE", "NAME"], MatchMode::Fuzzy);
        assert_eq!(criteria.cap(), DEFAULT_SEARCH_LIMIT);
        assert_eq!(criteria.clone().with_limit(None).cap(), usize::MAX);
        let criteria = SearchCriteria::new("abc", &["CODE"], MatchMode::Exact).with_limit(Some(10));
        assert_eq!(criteria.cap(), 1);
    }

    #[test]
    fn criteria_blank_term() {
        assert!(SearchCriteria::new("  ", &["CODE"], MatchMode::Fuzzy).is_blank());
        assert!(!SearchCriteria::new(" a ", &["CODE"], MatchMode::Fuzzy).is_blank());
    }
}
