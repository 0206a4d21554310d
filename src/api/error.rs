use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid username or password")]
    BadCredentials,

    #[error("Unauthorized - access token rejected")]
    Unauthorized,

    #[error("Session expired - please sign in again")]
    SessionExpired,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data. The cut
    /// lands on a char boundary so multibyte bodies never panic the slice.
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..cut],
            body.len()
        )
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 => ApiError::BadRequest(truncated),
            401 => ApiError::Unauthorized,
            404 => ApiError::NotFound(truncated),
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, "gone"),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ApiError::ServerError(_)
        ));
    }

    #[test]
    fn truncation_lands_on_char_boundaries() {
        // 200 three-byte chars put byte 500 mid-character
        let body = "€".repeat(200);
        if let ApiError::ServerError(msg) =
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body)
        {
            assert!(msg.contains("truncated, 600 total bytes"));
            assert!(msg.starts_with('€'));
        } else {
            panic!("expected ServerError");
        }
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        if let ApiError::ServerError(msg) =
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body)
        {
            assert!(msg.len() < 600);
            assert!(msg.contains("truncated"));
        } else {
            panic!("expected ServerError");
        }
    }
}
