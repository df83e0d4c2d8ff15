use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::{
    lead::{CompanyLead, LeadValidationError, StoredLead},
    search_query::SearchQuery,
};

#[derive(Debug, thiserror::Error)]
pub enum InsertLeadError {
    #[error(transparent)]
    Invalid(#[from] LeadValidationError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Returns whether a row was written; `false` means the lead was already
/// stored for this query tuple.
pub async fn insert_lead(
    pool: &SqlitePool,
    query: &SearchQuery,
    lead: &CompanyLead,
) -> Result<bool, InsertLeadError> {
    lead.validate()?;

    let result = sqlx::query(
        r#"
        insert into buyer_lead
            (id, hs_code, keyword, country, company_name, company_country,
             company_website_link, description, source, created_at)
        values
            (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        on conflict (hs_code, keyword, country, company_name) do nothing
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(query.hs_code())
    .bind(query.keyword())
    .bind(query.country())
    .bind(&lead.company_name)
    .bind(&lead.company_country)
    .bind(&lead.website_url)
    .bind(&lead.description)
    .bind(&lead.source_label)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Saves every lead it can and returns how many rows were new. A lead that
/// fails is logged and skipped; the rest of the batch still goes in.
pub async fn insert_leads(pool: &SqlitePool, query: &SearchQuery, leads: &[CompanyLead]) -> u64 {
    let mut inserted = 0;

    for lead in leads {
        match insert_lead(pool, query, lead).await {
            Ok(true) => inserted += 1,
            Ok(false) => log::info!(
                "Skipping {:?}, already stored for {}",
                lead.company_name,
                query
            ),
            Err(e) => log::error!(
                "Failed to save lead {:?} for {}: {}",
                lead.company_name,
                query,
                e
            ),
        }
    }

    log::info!(
        "Saved {} new leads out of {} for {}",
        inserted,
        leads.len(),
        query
    );

    inserted
}

pub async fn get_existing_leads(
    pool: &SqlitePool,
    query: &SearchQuery,
) -> Result<Vec<StoredLead>, sqlx::Error> {
    sqlx::query_as::<_, StoredLead>(
        r#"
        select
            id,
            hs_code,
            keyword,
            country,
            company_name,
            company_country,
            company_website_link,
            description,
            source,
            created_at
        from
            buyer_lead
        where
            hs_code = ? and
            keyword = ? and
            country = ?
        order by created_at desc, rowid desc
        "#,
    )
    .bind(query.hs_code())
    .bind(query.keyword())
    .bind(query.country())
    .fetch_all(pool)
    .await
}

pub async fn get_all_leads(pool: &SqlitePool) -> Result<Vec<StoredLead>, sqlx::Error> {
    sqlx::query_as::<_, StoredLead>(
        r#"
        select
            id,
            hs_code,
            keyword,
            country,
            company_name,
            company_country,
            company_website_link,
            description,
            source,
            created_at
        from
            buyer_lead
        order by created_at desc, rowid desc
        "#,
    )
    .fetch_all(pool)
    .await
}
