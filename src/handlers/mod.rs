use actix_web::http::header::{ContentType, LOCATION};
use actix_web::{web, HttpResponse, HttpResponseBuilder};
use askama::Template;

use crate::config::Config;
use crate::errors::AppError;

#[cfg(test)]
macro_rules! test_app {
    ($config:expr, $pool:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(actix_web::middleware::from_fn(
                    crate::utils::session::session_middleware,
                ))
                .app_data(actix_web::web::Data::new($config.clone()))
                .app_data(actix_web::web::Data::new(
                    crate::utils::session::SessionStore::new($config.session_idle),
                ))
                .app_data(actix_web::web::Data::new($pool))
                .configure(crate::handlers::configure),
        )
        .await
    };
}

pub mod auth;
pub mod dashboard;
pub mod landing;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(landing::index)))
        .service(
            web::resource("/login")
                .route(web::get().to(auth::login_page))
                .route(web::post().to(auth::login)),
        )
        .service(
            web::resource("/register")
                .route(web::get().to(auth::register_page))
                .route(web::post().to(auth::register)),
        )
        .service(web::resource("/logout").route(web::post().to(auth::logout)))
        .service(web::resource("/dashboard").route(web::get().to(dashboard::dashboard)));
}

/// Values every page layout needs.
#[derive(Default)]
pub struct Page {
    pub site_name: String,
    pub lang: String,
    pub base: String,
}

impl Page {
    pub fn new(config: &Config) -> Self {
        Page {
            site_name: config.site_name.clone(),
            lang: config.default_lang.clone(),
            base: config.site_url.trim_end_matches('/').to_string(),
        }
    }
}

pub fn render<T: Template>(builder: &mut HttpResponseBuilder, template: &T) -> Result<HttpResponse, AppError> {
    let body = template
        .render()
        .map_err(|e| AppError::InternalServerError(format!("Template rendering failed: {}", e)))?;
    Ok(builder.content_type(ContentType::html()).body(body))
}

pub fn see_other(location: String) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((LOCATION, location))
        .finish()
}
