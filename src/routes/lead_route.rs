use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    dal::lead_db,
    domain::search_query::{QueryTuple, SearchQuery},
    services::{LeadFinder, SearchMode},
};

#[derive(Deserialize)]
struct SearchLeadsBody {
    #[serde(flatten)]
    tuple: QueryTuple,
    #[serde(default)]
    reuse_existing: bool,
}

#[post("/search")]
async fn search_leads(
    lead_finder: web::Data<LeadFinder>,
    body: web::Json<SearchLeadsBody>,
) -> HttpResponse {
    let mode = match body.reuse_existing {
        true => SearchMode::ReuseExisting,
        false => SearchMode::Fresh,
    };

    match lead_finder.find_buyers(&body.tuple, mode).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => {
            log::error!("{:#}", e);
            HttpResponse::InternalServerError().body(format!("{:#}", e))
        }
    }
}

#[get("")]
async fn get_existing_leads(
    lead_finder: web::Data<LeadFinder>,
    query: web::Query<QueryTuple>,
) -> HttpResponse {
    match lead_finder.list_existing(&SearchQuery::from(&*query)).await {
        Ok(leads) => HttpResponse::Ok().json(leads),
        Err(e) => {
            log::error!("{:#}", e);
            HttpResponse::InternalServerError().body(format!("{:#}", e))
        }
    }
}

#[get("/all")]
async fn get_all_leads(pool: web::Data<SqlitePool>) -> HttpResponse {
    match lead_db::get_all_leads(&pool).await {
        Ok(leads) => HttpResponse::Ok().json(leads),
        Err(e) => {
            log::error!("Failed to read stored leads: {:?}", e);
            HttpResponse::InternalServerError().body(format!("Failed to read stored leads: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::{json, Value};

    use super::{get_all_leads, get_existing_leads, search_leads};
    use crate::{
        dal::test_pool,
        domain::{prompt::PromptBuilder, response_parser::HeuristicResponseParser},
        services::{testing::ScriptedClient, CompletionError, LeadFinder, QueryOrchestrator},
    };

    const TEMPLATE: &str = "Find buyers of {keyword} (HS {hs_code}) in {country}.";

    async fn lead_finder(client: Arc<ScriptedClient>) -> LeadFinder {
        LeadFinder::new(
            test_pool().await,
            QueryOrchestrator::new(client, PromptBuilder::new(TEMPLATE), 5),
            Arc::new(HeuristicResponseParser::new("DeepSeek R1")),
        )
    }

    #[actix_web::test]
    async fn search_then_list_then_reuse() {
        let client = Arc::new(ScriptedClient::from_fn(|_| {
            Ok("1. Company Name: Acme Gloves\nCountry: Malaysia\n2. Company Name: Beta Supplies".to_string())
        }));
        let lead_finder = web::Data::new(lead_finder(client.clone()).await);
        let pool = web::Data::new(lead_finder.pool().clone());
        let app = test::init_service(
            App::new()
                .app_data(lead_finder.clone())
                .app_data(pool)
                .service(
                    web::scope("/lead")
                        .service(search_leads)
                        .service(get_all_leads)
                        .service(get_existing_leads),
                ),
        )
        .await;

        let body = json!({"hs_code": "4015", "keyword": "nitrile gloves", "country": "Malaysia"});
        let req = test::TestRequest::post()
            .uri("/lead/search")
            .set_json(&body)
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp, json!({"new_leads": 2}));

        let req = test::TestRequest::get()
            .uri("/lead?hs_code=4015&keyword=nitrile%20gloves&country=Malaysia")
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp[0]["company_name"], "Beta Supplies");
        assert_eq!(resp[1]["company_country"], "Malaysia");

        let req = test::TestRequest::post()
            .uri("/lead/search")
            .set_json(json!({
                "hs_code": "4015",
                "keyword": "nitrile gloves",
                "country": "Malaysia",
                "reuse_existing": true
            }))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["existing_leads"].as_array().unwrap().len(), 2);
        assert_eq!(client.calls().len(), 1);

        let req = test::TestRequest::get().uri("/lead/all").to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp[0]["keyword"], "nitrile gloves");
    }

    #[actix_web::test]
    async fn failed_search_reports_the_query_tuple() {
        let client = Arc::new(ScriptedClient::from_fn(|_| {
            Err(CompletionError::Transport("connection refused".to_string()))
        }));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lead_finder(client).await))
                .service(web::scope("/lead").service(search_leads)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/lead/search")
            .set_json(json!({"hs_code": "4015", "keyword": "gloves", "country": "Malaysia"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = test::read_body(resp).await;
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("(hs_code=4015, keyword=gloves, country=Malaysia)"));
        assert!(body.contains("connection refused"));
    }
}
