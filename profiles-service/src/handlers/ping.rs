use axum::{http::header, response::IntoResponse};

/// GET /ping
pub async fn ping() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=UTF-8"),
            (
                header::CACHE_CONTROL,
                "must-revalidate, no-cache, no-store, private",
            ),
        ],
        "pong",
    )
}
