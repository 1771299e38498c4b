use actix_web::{web, HttpResponse};
use askama::Template;

use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::{render, see_other, Page};
use crate::utils::session::Session;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    page: Page,
}

// GET /
pub async fn index(session: Session, config: web::Data<Config>) -> Result<HttpResponse, AppError> {
    if session.is_logged_in() {
        return Ok(see_other(config.url("/dashboard")));
    }

    render(&mut HttpResponse::Ok(), &IndexTemplate { page: Page::new(&config) })
}
