use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use log::error;

/// Per-request fault boundary.
///
/// Each request runs in its own spawned task so a panic anywhere in the
/// handler stack is confined to that request: it is logged, answered with a
/// generic 500, and the process plus all sibling in-flight requests carry
/// on untouched.
pub async fn request_boundary(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();

    let result = tokio::spawn(async move { next.run(req).await }).await;

    match result {
        Ok(response) => response,
        Err(join_error) => {
            let panic_msg = if join_error.is_panic() {
                match join_error.into_panic().downcast::<String>() {
                    Ok(msg) => *msg,
                    Err(any) => match any.downcast::<&str>() {
                        Ok(msg) => msg.to_string(),
                        Err(_) => "Unknown panic".to_string(),
                    },
                }
            } else {
                "Task cancelled".to_string()
            };

            error!("Request to {path} panicked: {panic_msg}");

            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}
