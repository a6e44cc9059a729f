// src/api/plans.rs

use actix_web::{get, web, HttpResponse};

use crate::db;
use crate::error::ApiError;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/plans",
    tag = "plans",
    responses((status = 200, description = "Active pricing plans"))
)]
#[get("/plans")]
pub async fn list_plans(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let plans = db::list_active_plans(&state.pool).await?;
    Ok(HttpResponse::Ok().json(plans))
}
