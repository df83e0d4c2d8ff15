use std::{path::Path, sync::LazyLock};

use itertools::Itertools;
use regex::{Captures, Regex};

use super::search_query::SearchQuery;

const HS_CODE_PLACEHOLDER: &str = "{hs_code}";
const KEYWORD_PLACEHOLDER: &str = "{keyword}";
const COUNTRY_PLACEHOLDER: &str = "{country}";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(hs_code|keyword|country)\}").expect("valid placeholder regex")
});

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("prompt template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),
    #[error("failed to read prompt template {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

/// Renders the buyer-search prompt from a template loaded once up front.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
}

impl PromptBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        PromptBuilder {
            template: template.into(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Ok(PromptBuilder::new(template))
    }

    pub fn build(&self, query: &SearchQuery) -> Result<String, TemplateError> {
        build_prompt(query, &self.template)
    }
}

pub fn build_prompt(query: &SearchQuery, template: &str) -> Result<String, TemplateError> {
    for placeholder in [HS_CODE_PLACEHOLDER, KEYWORD_PLACEHOLDER, COUNTRY_PLACEHOLDER] {
        if !template.contains(placeholder) {
            return Err(TemplateError::MissingPlaceholder(placeholder));
        }
    }

    // One pass, so a value that looks like a placeholder is left as written.
    let mut prompt = PLACEHOLDER
        .replace_all(template, |captures: &Captures| match &captures[1] {
            "hs_code" => query.hs_code(),
            "keyword" => query.keyword(),
            _ => query.country(),
        })
        .into_owned();

    let excluded = query.excluded_company_names();
    if !excluded.is_empty() {
        let names = excluded.iter().map(|n| format!("- {}", n)).join("\n");
        prompt = format!(
            "{}\n\nIMPORTANT: The following companies are already in our lead list. \
            Do NOT include any of them again:\n{}\n\
            Only provide companies that are not listed above.",
            prompt.trim_end(),
            names
        );
    }

    Ok(prompt)
}
