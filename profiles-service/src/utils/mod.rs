use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use service_core::error::AppError;

/// A `302 Found` redirect. `axum::response::Redirect` only offers 303, 307
/// and 308.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Append form-encoded `params` to `uri`, respecting any query it already
/// carries.
pub fn with_query<T: Serialize + ?Sized>(uri: &str, params: &T) -> Result<String, AppError> {
    let query = serde_urlencoded::to_string(params)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode query: {}", e)))?;

    if query.is_empty() {
        return Ok(uri.to_string());
    }

    let separator = if uri.contains('?') { '&' } else { '?' };
    Ok(format!("{}{}{}", uri, separator, query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_query() {
        assert_eq!(
            with_query("http://client/check", &[("code", "1234")]).unwrap(),
            "http://client/check?code=1234"
        );
        assert_eq!(
            with_query("http://client/check?foo=bar", &[("state", "{\"a\": 1}")]).unwrap(),
            "http://client/check?foo=bar&state=%7B%22a%22%3A+1%7D"
        );
        assert_eq!(
            with_query("http://client/check", &Vec::<(&str, &str)>::new()).unwrap(),
            "http://client/check"
        );
    }
}
