use crate::error::AppError;
use actix_web::http::Method;
use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::rc::Rc;

// Only these prefixes require the admin token; the intake form is public
const PROTECTED_PREFIXES: &[&str] = &["/api/v1/admin/"];

fn is_protected_path(path: &str) -> bool {
    PROTECTED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix) || path == prefix.trim_end_matches('/'))
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Guards the admin routes with a static bearer token from config.
pub struct AdminAuthMiddleware {
    api_token: Rc<String>,
}

impl AdminAuthMiddleware {
    pub fn new(api_token: String) -> Self {
        Self {
            api_token: Rc::new(api_token),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminAuthMiddlewareService {
            service,
            api_token: self.api_token.clone(),
        }))
    }
}

pub struct AdminAuthMiddlewareService<S> {
    service: S,
    api_token: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for AdminAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS preflight
        if req.method() == Method::OPTIONS || !is_protected_path(req.path()) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        // Empty token: admin routes stay closed
        let authorized = !self.api_token.is_empty()
            && bearer_token(&req).is_some_and(|token| token == self.api_token.as_str());

        if authorized {
            let fut = self.service.call(req);
            Box::pin(fut)
        } else {
            log::warn!("Rejected admin request to {}", req.path());
            let error = AppError::AuthError("Missing or invalid admin token".to_string());
            Box::pin(async move { Err(error.into()) })
        }
    }
}
