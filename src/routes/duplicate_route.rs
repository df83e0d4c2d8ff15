use actix_web::{get, post, web, HttpResponse};
use sqlx::SqlitePool;

use crate::dal::duplicate_db;

#[get("/duplicates")]
async fn get_duplicate_summary(pool: web::Data<SqlitePool>) -> HttpResponse {
    match duplicate_db::get_duplicate_summary(&pool).await {
        Ok(groups) => HttpResponse::Ok().json(groups),
        Err(e) => {
            log::error!("Failed to summarise duplicate leads: {:?}", e);
            HttpResponse::InternalServerError().body(format!("Failed to summarise duplicates: {}", e))
        }
    }
}

#[post("/duplicates/remove")]
async fn remove_duplicates(pool: web::Data<SqlitePool>) -> HttpResponse {
    match duplicate_db::remove_duplicates(&pool).await {
        Ok(removal) => HttpResponse::Ok().json(removal),
        Err(e) => {
            log::error!("Failed to remove duplicate leads: {:?}", e);
            HttpResponse::InternalServerError().body(format!("Failed to remove duplicates: {}", e))
        }
    }
}
