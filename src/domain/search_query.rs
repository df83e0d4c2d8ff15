use std::fmt;

use itertools::Itertools;
use serde::Deserialize;

/// One buyer-search request: the query tuple plus the company names the
/// completion service should not repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    hs_code: String,
    keyword: String,
    country: String,
    excluded_company_names: Vec<String>,
}

impl SearchQuery {
    pub fn new(hs_code: &str, keyword: &str, country: &str) -> Self {
        SearchQuery {
            hs_code: hs_code.trim().to_string(),
            keyword: keyword.trim().to_string(),
            country: country.trim().to_string(),
            excluded_company_names: vec![],
        }
    }

    /// Blank names are dropped and repeats collapse onto their first occurrence.
    pub fn excluding<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let excluded_company_names = self
            .excluded_company_names
            .into_iter()
            .chain(names.into_iter().map(Into::into))
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unique()
            .collect();

        SearchQuery {
            excluded_company_names,
            ..self
        }
    }

    pub fn hs_code(&self) -> &str {
        &self.hs_code
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn excluded_company_names(&self) -> &[String] {
        &self.excluded_company_names
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(hs_code={}, keyword={}, country={})",
            self.hs_code, self.keyword, self.country
        )
    }
}

/// Query tuple as it arrives from callers, before exclusions are attached.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryTuple {
    pub hs_code: String,
    pub keyword: String,
    pub country: String,
}

impl From<&QueryTuple> for SearchQuery {
    fn from(value: &QueryTuple) -> Self {
        SearchQuery::new(&value.hs_code, &value.keyword, &value.country)
    }
}
