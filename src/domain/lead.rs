use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyLead {
    pub company_name: String,
    pub company_country: Option<String>,
    pub website_url: Option<String>,
    pub description: Option<String>,
    pub source_label: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LeadValidationError {
    #[error("company name is empty")]
    EmptyCompanyName,
    #[error("website {0:?} is not an absolute URL")]
    InvalidWebsite(String),
}

impl CompanyLead {
    pub fn validate(&self) -> Result<(), LeadValidationError> {
        if self.company_name.trim().is_empty() {
            return Err(LeadValidationError::EmptyCompanyName);
        }

        if let Some(website) = &self.website_url {
            match Url::parse(website) {
                Ok(url) if url.has_host() => {}
                _ => return Err(LeadValidationError::InvalidWebsite(website.clone())),
            }
        }

        Ok(())
    }
}

/// A lead as persisted, together with the query tuple it was found for.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StoredLead {
    pub id: String,
    pub hs_code: String,
    pub keyword: String,
    pub country: String,
    pub company_name: String,
    pub company_country: Option<String>,
    #[sqlx(rename = "company_website_link")]
    pub website_url: Option<String>,
    pub description: Option<String>,
    #[sqlx(rename = "source")]
    pub source_label: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredLead> for CompanyLead {
    fn from(value: StoredLead) -> Self {
        CompanyLead {
            company_name: value.company_name,
            company_country: value.company_country,
            website_url: value.website_url,
            description: value.description,
            source_label: value.source_label,
        }
    }
}
