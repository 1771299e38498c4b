use actix_web::http::header::{ContentType, LOCATION};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Forbidden(String),
    /// Carries the login page location the client is sent to.
    LoginRequired(String),
    InternalServerError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::LoginRequired(location) => write!(f, "Login required, redirecting to {}", location),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

impl AppError {
    pub fn database(context: &str, err: sqlx::Error) -> Self {
        AppError::InternalServerError(format!("{}: {}", context, err))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::LoginRequired(_) => StatusCode::SEE_OTHER,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::LoginRequired(location) => HttpResponse::SeeOther()
                .insert_header((LOCATION, location.as_str()))
                .finish(),
            AppError::InternalServerError(detail) => {
                // Details stay in the server log.
                error!("{}", detail);
                error_page(self.status_code(), "Something went wrong. Please try again later.")
            }
            AppError::Forbidden(msg) => error_page(self.status_code(), msg),
        }
    }
}

fn error_page(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status)
        .content_type(ContentType::plaintext())
        .body(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn internal_errors_hide_details() {
        let err = AppError::InternalServerError("connection refused on 10.0.0.5".to_string());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(!body.contains("10.0.0.5"));
    }

    #[actix_web::test]
    async fn forbidden_shows_its_message() {
        let resp = AppError::Forbidden("CSRF validation failed".to_string()).error_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"CSRF validation failed");
    }

    #[test]
    fn login_required_redirects() {
        let resp = AppError::LoginRequired("/login".to_string()).error_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(LOCATION).unwrap(), "/login");
    }
}
