use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    dal::lead_db,
    domain::{
        lead::CompanyLead,
        response_parser::ResponseParser,
        search_query::{QueryTuple, SearchQuery},
    },
};

use super::QueryOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Answer from stored leads when there are any.
    ReuseExisting,
    /// Always ask the completion service, excluding stored companies.
    #[default]
    Fresh,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchOutcome {
    Reused { existing_leads: Vec<CompanyLead> },
    Searched { new_leads: u64 },
}

/// Entry point for callers: ties lookup, orchestration, parsing and storage
/// together.
pub struct LeadFinder {
    pool: SqlitePool,
    orchestrator: QueryOrchestrator,
    parser: Arc<dyn ResponseParser>,
}

impl LeadFinder {
    pub fn new(
        pool: SqlitePool,
        orchestrator: QueryOrchestrator,
        parser: Arc<dyn ResponseParser>,
    ) -> Self {
        LeadFinder {
            pool,
            orchestrator,
            parser,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs a search for `query` and returns how many leads were new.
    pub async fn search_and_save(&self, query: &SearchQuery) -> anyhow::Result<u64> {
        let answer = self
            .orchestrator
            .run(query)
            .await
            .with_context(|| format!("Buyer search failed for {}", query))?;

        let leads = self.parser.parse(&answer);
        if leads.is_empty() {
            log::warn!("No companies could be parsed from the answer for {}", query);
        }

        Ok(lead_db::insert_leads(&self.pool, query, &leads).await)
    }

    pub async fn list_existing(&self, query: &SearchQuery) -> anyhow::Result<Vec<CompanyLead>> {
        let leads = lead_db::get_existing_leads(&self.pool, query)
            .await
            .with_context(|| format!("Failed to read stored leads for {}", query))?;

        Ok(leads.into_iter().map(CompanyLead::from).collect())
    }

    /// A fresh query for the tuple that excludes every company already stored for it.
    pub async fn prepare_query(&self, tuple: &QueryTuple) -> anyhow::Result<SearchQuery> {
        let query = SearchQuery::from(tuple);
        let existing = self.list_existing(&query).await?;

        Ok(exclude_existing(query, &existing))
    }

    pub async fn find_buyers(
        &self,
        tuple: &QueryTuple,
        mode: SearchMode,
    ) -> anyhow::Result<SearchOutcome> {
        let query = SearchQuery::from(tuple);
        let existing = self.list_existing(&query).await?;

        if mode == SearchMode::ReuseExisting && !existing.is_empty() {
            log::info!("Reusing {} stored leads for {}", existing.len(), query);
            return Ok(SearchOutcome::Reused {
                existing_leads: existing,
            });
        }

        let query = exclude_existing(query, &existing);
        log::info!(
            "Searching buyers for {} excluding {} stored companies",
            query,
            query.excluded_company_names().len()
        );
        let new_leads = self.search_and_save(&query).await?;

        Ok(SearchOutcome::Searched { new_leads })
    }
}

fn exclude_existing(query: SearchQuery, existing: &[CompanyLead]) -> SearchQuery {
    query.excluding(existing.iter().map(|lead| lead.company_name.clone()))
}
