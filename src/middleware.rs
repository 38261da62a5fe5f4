use std::rc::Rc;

use actix_service::{forward_ready, Service};
use actix_web::body::EitherBody;
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{self, HeaderMap, HeaderValue};
use actix_web::http::Method;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError};
use futures::future::{ok, ready, LocalBoxFuture, Ready};

use crate::auth::Tokens;
use crate::error::AppError;

/// Identity attached to a request by [`AuthMiddleware`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Login required".into())),
        )
    }
}

fn bearer_token(req: &ServiceRequest) -> Result<&str, AppError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Authorization header missing".into()))?;
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".into()))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))
}

// Middleware factory
pub struct AuthMiddleware {
    tokens: Tokens,
}

impl AuthMiddleware {
    pub fn new(tokens: Tokens) -> Self {
        AuthMiddleware { tokens }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    tokens: Tokens,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let tokens = self.tokens.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let claims = match bearer_token(&req).and_then(|token| tokens.verify(token)) {
                Ok(claims) => claims,
                Err(err) => {
                    return Ok(req.into_response(err.error_response()).map_into_right_body());
                }
            };
            req.extensions_mut().insert(AuthenticatedUser {
                user_id: claims.sub,
            });
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// Adds CORS headers to every response and answers preflight requests.
///
/// The request is handed on untouched; the router needs sole ownership of it.
pub struct Cors {
    allowed_origin: HeaderValue,
}

impl Cors {
    pub fn new(allowed_origin: HeaderValue) -> Self {
        Cors { allowed_origin }
    }
}

fn apply_cors_headers(headers: &mut HeaderMap, origin: &HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type"),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("3600"));
}

impl<S, B> Transform<S, ServiceRequest> for Cors
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = CorsService<S>;
    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(CorsService {
            service: Rc::new(service),
            allowed_origin: self.allowed_origin.clone(),
        })
    }
}

pub struct CorsService<S> {
    service: Rc<S>,
    allowed_origin: HeaderValue,
}

impl<S, B> Service<ServiceRequest> for CorsService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let origin = self.allowed_origin.clone();

        Box::pin(async move {
            let mut res = if *req.method() == Method::OPTIONS {
                req.into_response(HttpResponse::NoContent().finish())
                    .map_into_right_body()
            } else {
                service.call(req).await?.map_into_left_body()
            };

            apply_cors_headers(res.headers_mut(), &origin);
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use actix_web::http::StatusCode;
    use actix_web::web::Bytes;
    use actix_web::{test, web, App};

    async fn echo_user(user: AuthenticatedUser, name: web::Path<String>) -> HttpResponse {
        HttpResponse::Ok().body(format!("{}:{}", user.user_id, name.into_inner()))
    }

    fn tokens() -> Tokens {
        Tokens::new("middleware-secret", chrono::Duration::minutes(5))
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .wrap(Cors::new(HeaderValue::from_static("https://app.example")))
                    .route("/open/{name}", web::get().to(|name: web::Path<String>| async move {
                        HttpResponse::Ok().body(name.into_inner())
                    }))
                    .service(
                        web::scope("/secured")
                            .wrap(AuthMiddleware::new(tokens()))
                            .route("/echo/{name}", web::get().to(echo_user)),
                    ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn routed_requests_pass_through_cors() {
        let app = app!();
        let req = test::TestRequest::get().uri("/open/basil").to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://app.example"
        );
        assert_eq!(test::read_body(res).await, Bytes::from_static(b"basil"));
    }

    #[actix_web::test]
    async fn valid_token_reaches_the_handler() {
        let app = app!();
        let user = User {
            id: "u42".into(),
            email: "u42@example.com".into(),
            full_name: String::new(),
            password_hash: String::new(),
        };
        let token = tokens().issue(&user).unwrap();

        let req = test::TestRequest::get()
            .uri("/secured/echo/thyme")
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
        assert_eq!(test::read_body(res).await, Bytes::from_static(b"u42:thyme"));
    }

    #[actix_web::test]
    async fn rejected_token_still_gets_cors_headers() {
        let app = app!();
        for auth in [None, Some("Basic abc"), Some("Bearer nonsense")] {
            let mut req = test::TestRequest::get().uri("/secured/echo/thyme");
            if let Some(value) = auth {
                req = req.insert_header((header::AUTHORIZATION, value));
            }
            let res = test::call_service(&app, req.to_request()).await;

            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
                "https://app.example"
            );
        }
    }
}
