//! Free-text search over legacy catalogs: [`SearchCriteria`](criteria::SearchCriteria)
//! describes the request, [`matches`](matcher::matches) decides a single row.
pub mod criteria;
pub mod matcher;
