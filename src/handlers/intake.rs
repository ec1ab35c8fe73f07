use actix_web::{web, HttpResponse, Result, ResponseError};
use serde_json::json;
use uuid::Uuid;

use crate::models::*;
use crate::services::{IntakeSessions, IntakeWorkflow};

fn form_response(session_id: Uuid, workflow: &mut IntakeWorkflow) -> HttpResponse {
    let response = IntakeResponse {
        session_id,
        form: workflow.snapshot(),
        notices: workflow.drain_notices(),
    };
    HttpResponse::Ok().json(json!({
        "success": true,
        "data": response
    }))
}

#[utoipa::path(
    post,
    path = "/intake/sessions",
    tag = "intake",
    responses(
        (status = 200, description = "Registration form opened", body = IntakeResponse),
        (status = 503, description = "Too many open registration forms")
    )
)]
pub async fn open_session(sessions: web::Data<IntakeSessions>) -> Result<HttpResponse> {
    match sessions.create().await {
        Ok((id, workflow)) => Ok(form_response(id, &mut *workflow.lock().await)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/intake/sessions/{id}",
    tag = "intake",
    params(("id" = Uuid, Path, description = "Intake session id")),
    responses(
        (status = 200, description = "Current form state", body = IntakeResponse),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    sessions: web::Data<IntakeSessions>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    match sessions.get(id).await {
        Ok(workflow) => Ok(form_response(id, &mut *workflow.lock().await)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/intake/sessions/{id}/fields",
    tag = "intake",
    params(("id" = Uuid, Path, description = "Intake session id")),
    request_body = UpdateFieldRequest,
    responses(
        (status = 200, description = "Field updated; field errors and notices in the body", body = IntakeResponse),
        (status = 404, description = "Session not found")
    )
)]
pub async fn update_field(
    sessions: web::Data<IntakeSessions>,
    path: web::Path<Uuid>,
    request: web::Json<UpdateFieldRequest>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let workflow = match sessions.get(id).await {
        Ok(workflow) => workflow,
        Err(e) => return Ok(e.error_response()),
    };
    let request = request.into_inner();

    let mut workflow = workflow.lock().await;
    if let Some(token) = request.turnstile_token {
        workflow.provide_human_token(token);
    }
    workflow.update_field(request.field, &request.value).await;
    Ok(form_response(id, &mut workflow))
}

#[utoipa::path(
    post,
    path = "/intake/sessions/{id}/challenge",
    tag = "intake",
    params(("id" = Uuid, Path, description = "Intake session id")),
    request_body = RequestChallengeRequest,
    responses(
        (status = 200, description = "Challenge outcome in notices", body = IntakeResponse),
        (status = 400, description = "Phone number invalid or challenge already outstanding"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn request_challenge(
    sessions: web::Data<IntakeSessions>,
    path: web::Path<Uuid>,
    request: Option<web::Json<RequestChallengeRequest>>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let workflow = match sessions.get(id).await {
        Ok(workflow) => workflow,
        Err(e) => return Ok(e.error_response()),
    };

    let mut workflow = workflow.lock().await;
    if let Some(token) = request.and_then(|r| r.into_inner().turnstile_token) {
        workflow.provide_human_token(token);
    }
    match workflow.request_challenge().await {
        Err(e @ crate::error::AppError::ValidationError(_)) if !workflow.has_pending_notices() => {
            Ok(e.error_response())
        }
        // Upstream and anti-automation failures are already in the notices
        _ => Ok(form_response(id, &mut workflow)),
    }
}

#[utoipa::path(
    put,
    path = "/intake/sessions/{id}/code",
    tag = "intake",
    params(("id" = Uuid, Path, description = "Intake session id")),
    request_body = CodeRequest,
    responses(
        (status = 200, description = "Code recorded, confirmed automatically at six digits", body = IntakeResponse),
        (status = 404, description = "Session not found")
    )
)]
pub async fn enter_code(
    sessions: web::Data<IntakeSessions>,
    path: web::Path<Uuid>,
    request: web::Json<CodeRequest>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let workflow = match sessions.get(id).await {
        Ok(workflow) => workflow,
        Err(e) => return Ok(e.error_response()),
    };

    let mut workflow = workflow.lock().await;
    workflow.enter_code(&request.code).await;
    Ok(form_response(id, &mut workflow))
}

#[utoipa::path(
    post,
    path = "/intake/sessions/{id}/code/confirm",
    tag = "intake",
    params(("id" = Uuid, Path, description = "Intake session id")),
    request_body = CodeRequest,
    responses(
        (status = 200, description = "Verification outcome in notices", body = IntakeResponse),
        (status = 400, description = "No challenge outstanding or empty code"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn confirm_code(
    sessions: web::Data<IntakeSessions>,
    path: web::Path<Uuid>,
    request: web::Json<CodeRequest>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let workflow = match sessions.get(id).await {
        Ok(workflow) => workflow,
        Err(e) => return Ok(e.error_response()),
    };

    let mut workflow = workflow.lock().await;
    match workflow.submit_challenge_response(&request.code).await {
        Err(e @ crate::error::AppError::ValidationError(_)) => Ok(e.error_response()),
        _ => Ok(form_response(id, &mut workflow)),
    }
}

#[utoipa::path(
    post,
    path = "/intake/sessions/{id}/submit",
    tag = "intake",
    params(("id" = Uuid, Path, description = "Intake session id")),
    responses(
        (status = 200, description = "Submission outcome in notices; form reset on success", body = IntakeResponse),
        (status = 404, description = "Session not found")
    )
)]
pub async fn submit(
    sessions: web::Data<IntakeSessions>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let workflow = match sessions.get(id).await {
        Ok(workflow) => workflow,
        Err(e) => return Ok(e.error_response()),
    };

    let mut workflow = workflow.lock().await;
    if let Err(e) = workflow.submit().await {
        log::debug!("Intake session {} submit rejected: {}", id, e);
    }
    Ok(form_response(id, &mut workflow))
}

#[utoipa::path(
    delete,
    path = "/intake/sessions/{id}",
    tag = "intake",
    params(("id" = Uuid, Path, description = "Intake session id")),
    responses(
        (status = 200, description = "Session closed"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn close_session(
    sessions: web::Data<IntakeSessions>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    match sessions.remove(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Session closed"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/intake/options",
    tag = "intake",
    responses(
        (status = 200, description = "Course and place choices", body = IntakeOptions)
    )
)]
pub async fn options() -> Result<HttpResponse> {
    let options = IntakeOptions {
        courses: Course::ALL.iter().map(|c| c.label().to_string()).collect(),
        places: Place::ALL.iter().map(|p| p.label().to_string()).collect(),
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(options)))
}

pub fn intake_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/intake")
            .route("/options", web::get().to(options))
            .route("/sessions", web::post().to(open_session))
            .route("/sessions/{id}", web::get().to(get_session))
            .route("/sessions/{id}", web::delete().to(close_session))
            .route("/sessions/{id}/fields", web::put().to(update_field))
            .route("/sessions/{id}/challenge", web::post().to(request_challenge))
            .route("/sessions/{id}/code", web::put().to(enter_code))
            .route("/sessions/{id}/code/confirm", web::post().to(confirm_code))
            .route("/sessions/{id}/submit", web::post().to(submit)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntakeConfig;
    use crate::services::intake_service::tests::{
        FakeStore, FakeVerifier, GOOD_CODE, RejectCheck, service_with, service_with_check,
    };
    use actix_web::{App, test};
    use serde_json::Value;
    use std::sync::Arc;

    fn sessions(store: Arc<FakeStore>) -> IntakeSessions {
        let service = service_with(IntakeConfig::default(), Arc::new(FakeVerifier::default()), store);
        IntakeSessions::new(service, 600, 100)
    }

    #[actix_web::test]
    async fn test_full_registration_over_http() {
        let store = Arc::new(FakeStore::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sessions(store.clone())))
                .configure(intake_config),
        )
        .await;

        let req = test::TestRequest::post().uri("/intake/sessions").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["session_id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["form"]["verification"], "idle");

        for (field, value) in [
            ("name", "Asha Verma"),
            ("email", "asha@example.com"),
            ("course", "Gnm"),
            ("place", "Assam"),
        ] {
            let req = test::TestRequest::put()
                .uri(&format!("/intake/sessions/{id}/fields"))
                .set_json(json!({ "field": field, "value": value }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert!(resp.status().is_success());
        }

        let req = test::TestRequest::put()
            .uri(&format!("/intake/sessions/{id}/fields"))
            .set_json(json!({ "field": "phoneNumber", "value": "9876543210" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["form"]["verification"], "challenge_sent");
        assert_eq!(body["data"]["notices"][0]["message"], "OTP sent successfully!");

        let req = test::TestRequest::put()
            .uri(&format!("/intake/sessions/{id}/code"))
            .set_json(json!({ "code": GOOD_CODE }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["form"]["phone_verified"], true);
        assert_eq!(body["data"]["form"]["can_submit"], true);

        let req = test::TestRequest::post()
            .uri(&format!("/intake/sessions/{id}/submit"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["notices"][0]["level"], "success");
        assert_eq!(body["data"]["form"]["draft"]["name"], "");
        assert_eq!(store.created.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_field_error_reported_in_snapshot() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sessions(Arc::new(FakeStore::default()))))
                .configure(intake_config),
        )
        .await;

        let req = test::TestRequest::post().uri("/intake/sessions").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["session_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri(&format!("/intake/sessions/{id}/fields"))
            .set_json(json!({ "field": "phoneNumber", "value": "98765" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body["data"]["form"]["field_errors"]["phoneNumber"],
            "Phone number must be 10 digits."
        );

        let req = test::TestRequest::post()
            .uri(&format!("/intake/sessions/{id}/challenge"))
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[actix_web::test]
    async fn test_rejected_human_check_returns_form_with_notice() {
        let settings = IntakeConfig {
            auto_send_challenge: false,
            ..IntakeConfig::default()
        };
        let service = service_with_check(
            settings,
            Arc::new(FakeVerifier::default()),
            Arc::new(RejectCheck),
            Arc::new(FakeStore::default()),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(IntakeSessions::new(service, 600, 100)))
                .configure(intake_config),
        )
        .await;

        let req = test::TestRequest::post().uri("/intake/sessions").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["session_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri(&format!("/intake/sessions/{id}/fields"))
            .set_json(json!({ "field": "phoneNumber", "value": "9876543210" }))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post()
            .uri(&format!("/intake/sessions/{id}/challenge"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["form"]["verification"], "idle");
        assert_eq!(body["data"]["notices"][0]["level"], "error");
        assert_eq!(
            body["data"]["notices"][0]["message"],
            "Failed to send OTP. Please try again."
        );

        // Nothing left over for the next response
        let req = test::TestRequest::get()
            .uri(&format!("/intake/sessions/{id}"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["data"]["notices"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_session_limit_is_503() {
        let service = service_with(
            IntakeConfig::default(),
            Arc::new(FakeVerifier::default()),
            Arc::new(FakeStore::default()),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(IntakeSessions::new(service, 600, 1)))
                .configure(intake_config),
        )
        .await;

        let req = test::TestRequest::post().uri("/intake/sessions").to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let req = test::TestRequest::post().uri("/intake/sessions").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 503);
    }

    #[actix_web::test]
    async fn test_unknown_session_is_404() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sessions(Arc::new(FakeStore::default()))))
                .configure(intake_config),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/intake/sessions/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 404);
    }

    #[actix_web::test]
    async fn test_options_lists_courses_and_places() {
        let app = test::init_service(App::new().configure(intake_config)).await;
        let req = test::TestRequest::get().uri("/intake/options").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["courses"].as_array().unwrap().len(), 8);
        assert_eq!(body["data"]["places"].as_array().unwrap().len(), 36);
    }
}
