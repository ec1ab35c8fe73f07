use actix_web::{web, HttpResponse, Result, ResponseError};
use serde_json::json;
use crate::services::LeadsService;

#[utoipa::path(
    get,
    path = "/admin/leads",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Leads grouped into Today / Yesterday / Past 7 days / Older", body = LeadsPage),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 502, description = "Lead store unavailable")
    )
)]
pub async fn get_leads(leads_service: web::Data<LeadsService>) -> Result<HttpResponse> {
    match leads_service.leads_page().await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/leads", web::get().to(get_leads))
    );
}
