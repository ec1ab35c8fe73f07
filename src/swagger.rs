use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::intake::open_session,
        handlers::intake::get_session,
        handlers::intake::update_field,
        handlers::intake::request_challenge,
        handlers::intake::enter_code,
        handlers::intake::confirm_code,
        handlers::intake::submit,
        handlers::intake::close_session,
        handlers::intake::options,
        handlers::admin::get_leads,
    ),
    components(
        schemas(
            LeadDraft,
            LeadField,
            LeadRecord,
            LeadSection,
            LeadsPage,
            TimeBucket,
            GroupedLeads,
            VerificationState,
            UpdateFieldRequest,
            RequestChallengeRequest,
            CodeRequest,
            IntakeSnapshot,
            IntakeResponse,
            IntakeOptions,
            Notice,
            NoticeLevel,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "intake", description = "Lead registration form API"),
        (name = "admin", description = "Lead listing API"),
    ),
    info(
        title = "Lead Intake API",
        version = "0.1.0",
        description = "Lead registration with phone verification, and time-bucketed lead listing",
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
