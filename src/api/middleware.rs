use actix_web::{
    Error, HttpMessage,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use uuid::Uuid;

use crate::errors::AppError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Идентификатор запроса в extensions
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

/// Middleware добавляющий trace/request id
pub struct RequestId;

impl<S, B> Transform<S, ServiceRequest> for RequestId
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestIdMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestIdMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestIdMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestIdMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // id от шлюза сохраняем, иначе генерируем
        let id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty() && v.len() <= 64)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        req.extensions_mut().insert(TraceId(id.clone()));
        log::debug!("request_id={} {} {}", id, req.method(), req.path());
        let fut = self.service.call(req);
        Box::pin(async move {
            let resp = fut.await?;
            // ошибки AppError пересобираем, чтобы trace_id попал и в тело
            let rebuilt = resp
                .response()
                .error()
                .and_then(|e| e.as_error::<AppError>())
                .map(|e| e.to_response(Some(id.clone())));
            let mut resp = match rebuilt {
                Some(body) => {
                    let (req, _) = resp.into_parts();
                    ServiceResponse::new(req, body).map_into_right_body()
                }
                None => resp.map_into_left_body(),
            };
            if let Ok(value) = HeaderValue::from_str(&id) {
                resp.headers_mut()
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }
            Ok(resp)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpRequest, HttpResponse, http::StatusCode, test, web};

    #[actix_web::test]
    async fn adds_request_id_header() {
        let app = test::init_service(
            App::new()
                .wrap(RequestId)
                .route(
                    "/",
                    web::get().to(|req: HttpRequest| async move {
                        let id = req.extensions().get::<TraceId>().map(|t| t.0.clone());
                        HttpResponse::Ok().body(id.unwrap_or_default())
                    }),
                ),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let header = resp
            .headers()
            .get(REQUEST_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let body = test::read_body(resp).await;
        assert_eq!(body, header.as_bytes());
        assert!(Uuid::parse_str(&header).is_ok());
    }

    #[actix_web::test]
    async fn keeps_upstream_request_id() {
        let app = test::init_service(
            App::new()
                .wrap(RequestId)
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header((REQUEST_ID_HEADER, "gw-1234"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get(REQUEST_ID_HEADER).unwrap(), "gw-1234");
    }

    #[actix_web::test]
    async fn error_body_carries_trace_id() {
        let app = test::init_service(App::new().wrap(RequestId).route(
            "/",
            web::get().to(|| async {
                Err::<HttpResponse, _>(AppError::NotFound("Invoice with id 5 not found".into()))
            }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header((REQUEST_ID_HEADER, "gw-5678"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers().get(REQUEST_ID_HEADER).unwrap(), "gw-5678");

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["trace_id"], "gw-5678");
    }
}
