use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DuplicateGroup {
    pub company_name: String,
    pub company_country: Option<String>,
    pub duplicate_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateRemoval {
    pub duplicates_found: i64,
    pub duplicates_removed: u64,
    pub duplicate_groups: usize,
}

const DUPLICATE_GROUPS_QUERY: &str = r#"
    select
        company_name,
        company_country,
        count(*) as duplicate_count
    from
        buyer_lead
    group by
        company_name, company_country
    having
        count(*) > 1
    order by duplicate_count desc, company_name
"#;

/// Companies stored more than once across all searches, matched on name and
/// company country.
pub async fn get_duplicate_summary(pool: &SqlitePool) -> Result<Vec<DuplicateGroup>, sqlx::Error> {
    sqlx::query_as::<_, DuplicateGroup>(DUPLICATE_GROUPS_QUERY)
        .fetch_all(pool)
        .await
}

/// Keeps the oldest row of every duplicate group and deletes the others.
pub async fn remove_duplicates(pool: &SqlitePool) -> Result<DuplicateRemoval, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let groups = sqlx::query_as::<_, DuplicateGroup>(DUPLICATE_GROUPS_QUERY)
        .fetch_all(&mut *tx)
        .await?;

    let deleted = sqlx::query(
        r#"
        delete from buyer_lead
        where rowid not in (
            select
                min(rowid)
            from
                buyer_lead
            group by
                company_name, company_country
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let removal = DuplicateRemoval {
        duplicates_found: groups.iter().map(|g| g.duplicate_count).sum(),
        duplicates_removed: deleted.rows_affected(),
        duplicate_groups: groups.len(),
    };
    log::info!(
        "Removed {} duplicate leads across {} groups",
        removal.duplicates_removed,
        removal.duplicate_groups
    );

    Ok(removal)
}

#[cfg(test)]
mod tests {
    use super::{get_duplicate_summary, remove_duplicates, DuplicateGroup, DuplicateRemoval};
    use crate::{
        dal::{lead_db, test_pool},
        domain::{lead::CompanyLead, search_query::SearchQuery},
    };

    fn lead(name: &str, country: Option<&str>, description: &str) -> CompanyLead {
        CompanyLead {
            company_name: name.to_string(),
            company_country: country.map(|c| c.to_string()),
            website_url: None,
            description: Some(description.to_string()),
            source_label: "DeepSeek R1".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicates_across_searches_are_summarised_and_removed() {
        let pool = test_pool().await;
        let gloves = SearchQuery::new("4015", "nitrile gloves", "Malaysia");
        let latex = SearchQuery::new("4015", "latex gloves", "Malaysia");
        let masks = SearchQuery::new("6307", "face masks", "Malaysia");

        lead_db::insert_leads(
            &pool,
            &gloves,
            &[
                lead("Acme Gloves", Some("Malaysia"), "first"),
                lead("Beta Supplies", None, "first"),
            ],
        )
        .await;
        lead_db::insert_leads(
            &pool,
            &latex,
            &[
                lead("Acme Gloves", Some("Malaysia"), "second"),
                lead("Beta Supplies", None, "second"),
                lead("Gamma Health", Some("Malaysia"), "only"),
            ],
        )
        .await;
        lead_db::insert_leads(&pool, &masks, &[lead("Acme Gloves", Some("Malaysia"), "third")])
            .await;

        let summary = get_duplicate_summary(&pool).await.unwrap();
        assert_eq!(
            summary,
            vec![
                DuplicateGroup {
                    company_name: "Acme Gloves".to_string(),
                    company_country: Some("Malaysia".to_string()),
                    duplicate_count: 3,
                },
                DuplicateGroup {
                    company_name: "Beta Supplies".to_string(),
                    company_country: None,
                    duplicate_count: 2,
                },
            ]
        );

        let removal = remove_duplicates(&pool).await.unwrap();
        assert_eq!(
            removal,
            DuplicateRemoval {
                duplicates_found: 5,
                duplicates_removed: 3,
                duplicate_groups: 2,
            }
        );

        let remaining = lead_db::get_all_leads(&pool).await.unwrap();
        assert_eq!(remaining.len(), 3);
        let acme = remaining
            .iter()
            .find(|l| l.company_name == "Acme Gloves")
            .unwrap();
        assert_eq!(acme.description.as_deref(), Some("first"));
        assert_eq!(acme.keyword, "nitrile gloves");
        assert!(get_duplicate_summary(&pool).await.unwrap().is_empty());
    }
}
