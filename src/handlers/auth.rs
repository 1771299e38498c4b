use actix_web::{web, HttpResponse};
use askama::Template;
use chrono::Utc;
use lazy_static::lazy_static;
use log::{info, warn};
use moka::sync::Cache;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::{render, see_other, Page};
use crate::models::user::{NewUser, UserCredentials};
use crate::utils::csrf::random_token;
use crate::utils::password::{hash_password, verify_against_dummy, verify_password};
use crate::utils::session::{Session, REMEMBER_DAYS};
use crate::utils::validation::{
    parse_birth_date, validate_email_address, validate_login_password, validate_name,
    validate_new_password, validate_sex, DUPLICATE_EMAIL, EMAIL_MAX_CHARS, INVALID_CREDENTIALS,
};

lazy_static! {
    // Emails known to be taken. Accounts are never deleted here, so entries don't go stale.
    static ref EMAIL_CACHE: Cache<String, bool> = Cache::new(10_000);
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginForm {
    csrf_token: String,
    email: String,
    password: String,
    remember: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RegisterForm {
    csrf_token: String,
    nome: String,
    cognome: String,
    email: String,
    password: String,
    conferma_password: String,
    data_nascita: String,
    sesso: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LogoutForm {
    csrf_token: String,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    page: Page,
    csrf_token: String,
    email: String,
    remember: bool,
    errors: Vec<String>,
}

#[derive(Template, Default)]
#[template(path = "register.html")]
struct RegisterTemplate {
    page: Page,
    csrf_token: String,
    nome: String,
    cognome: String,
    email: String,
    data_nascita: String,
    sesso: String,
    errors: Vec<String>,
    success: bool,
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// GET /login
pub async fn login_page(session: Session, config: web::Data<Config>) -> Result<HttpResponse, AppError> {
    if session.is_logged_in() {
        return Ok(see_other(config.url("/dashboard")));
    }

    render(
        &mut HttpResponse::Ok(),
        &LoginTemplate {
            page: Page::new(&config),
            csrf_token: session.csrf_token(),
            email: String::new(),
            remember: false,
            errors: Vec::new(),
        },
    )
}

// POST /login
pub async fn login(
    session: Session,
    config: web::Data<Config>,
    pool: web::Data<PgPool>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, AppError> {
    if session.is_logged_in() {
        return Ok(see_other(config.url("/dashboard")));
    }
    session.verify_csrf(&form.csrf_token)?;

    let form = form.into_inner();
    let email = normalize_email(&form.email);
    let remember = form.remember.is_some();

    let mut errors = Vec::new();
    validate_email_address(&email, None, &mut errors);
    validate_login_password(&form.password, &mut errors);

    if errors.is_empty() {
        match authenticate(&pool, &email, form.password).await? {
            Some(user_id) => {
                complete_login(&session, &pool, user_id, remember).await?;
                return Ok(see_other(config.url("/dashboard")));
            }
            None => errors.push(INVALID_CREDENTIALS.to_string()),
        }
    }

    render(
        &mut HttpResponse::Ok(),
        &LoginTemplate {
            page: Page::new(&config),
            csrf_token: session.csrf_token(),
            email,
            remember,
            errors,
        },
    )
}

/// Checks the credentials. Unknown emails and wrong passwords are indistinguishable to the caller.
async fn authenticate(pool: &PgPool, email: &str, password: String) -> Result<Option<Uuid>, AppError> {
    let credentials = sqlx::query_as::<_, UserCredentials>("SELECT id, password FROM utenti WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to look up user", e))?;

    let Some(credentials) = credentials else {
        verify_against_dummy(password).await;
        warn!("Login failed: unknown account");
        return Ok(None);
    };

    if verify_password(password, credentials.password).await? {
        Ok(Some(credentials.id))
    } else {
        warn!("Login failed: wrong password for user {}", credentials.id);
        Ok(None)
    }
}

async fn complete_login(session: &Session, pool: &PgPool, user_id: Uuid, remember: bool) -> Result<(), AppError> {
    sqlx::query("UPDATE utenti SET ultimo_accesso = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to update last access", e))?;

    if remember {
        let token = random_token();
        let expiry = Utc::now() + chrono::Duration::days(REMEMBER_DAYS);
        sqlx::query("UPDATE utenti SET remember_token = $1, token_expiry = $2 WHERE id = $3")
            .bind(&token)
            .bind(expiry)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(|e| AppError::database("Failed to store remember token", e))?;
        session.remember(token);
    }

    session.log_in(user_id);
    info!("User {} logged in", user_id);
    Ok(())
}

// GET /register
pub async fn register_page(session: Session, config: web::Data<Config>) -> Result<HttpResponse, AppError> {
    if session.is_logged_in() {
        return Ok(see_other(config.url("/dashboard")));
    }

    render(
        &mut HttpResponse::Ok(),
        &RegisterTemplate {
            page: Page::new(&config),
            csrf_token: session.csrf_token(),
            ..Default::default()
        },
    )
}

// POST /register
pub async fn register(
    session: Session,
    config: web::Data<Config>,
    pool: web::Data<PgPool>,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, AppError> {
    if session.is_logged_in() {
        return Ok(see_other(config.url("/dashboard")));
    }
    session.verify_csrf(&form.csrf_token)?;

    let form = form.into_inner();
    let nome = form.nome.trim().to_string();
    let cognome = form.cognome.trim().to_string();
    let email = normalize_email(&form.email);
    let data_nascita_raw = form.data_nascita.trim().to_string();
    let sesso_raw = form.sesso.trim().to_string();

    let mut errors = Vec::new();
    validate_name(&nome, "First name", &mut errors);
    validate_name(&cognome, "Last name", &mut errors);
    if validate_email_address(&email, Some(EMAIL_MAX_CHARS), &mut errors) && email_registered(&pool, &email).await? {
        errors.push(DUPLICATE_EMAIL.to_string());
    }
    validate_new_password(&form.password, &form.conferma_password, &mut errors);
    let data_nascita = parse_birth_date(&data_nascita_raw, &mut errors);
    let sesso = validate_sex(&sesso_raw, &mut errors);

    if errors.is_empty() {
        let user = NewUser {
            nome: nome.clone(),
            cognome: cognome.clone(),
            email: email.clone(),
            password_hash: hash_password(form.password).await?,
            data_nascita,
            sesso,
        };

        // The unique index settles races the lookup above could not see.
        if create_user(&pool, &user).await? {
            EMAIL_CACHE.insert(email, true);
            info!("Registered new user");
            return render(
                HttpResponse::Ok().insert_header(("Refresh", format!("3;url={}", config.url("/login")))),
                &RegisterTemplate {
                    page: Page::new(&config),
                    csrf_token: session.csrf_token(),
                    success: true,
                    ..Default::default()
                },
            );
        }

        EMAIL_CACHE.insert(email.clone(), true);
        errors.push(DUPLICATE_EMAIL.to_string());
    }

    render(
        &mut HttpResponse::Ok(),
        &RegisterTemplate {
            page: Page::new(&config),
            csrf_token: session.csrf_token(),
            nome,
            cognome,
            email,
            data_nascita: data_nascita_raw,
            sesso: sesso_raw,
            errors,
            success: false,
        },
    )
}

async fn email_registered(pool: &PgPool, email: &str) -> Result<bool, AppError> {
    if EMAIL_CACHE.get(email).is_some() {
        return Ok(true);
    }

    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM utenti WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to check email", e))?;

    if exists {
        EMAIL_CACHE.insert(email.to_string(), true);
    }
    Ok(exists)
}

/// Inserts the user; false when the email is already taken.
async fn create_user(pool: &PgPool, user: &NewUser) -> Result<bool, AppError> {
    let result = sqlx::query(
        "INSERT INTO utenti (id, nome, cognome, email, password, data_nascita, sesso, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        ON CONFLICT (email) DO NOTHING",
    )
    .bind(Uuid::now_v7())
    .bind(&user.nome)
    .bind(&user.cognome)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.data_nascita)
    .bind(&user.sesso)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to create user", e))?;

    Ok(result.rows_affected() == 1)
}

// POST /logout
pub async fn logout(
    session: Session,
    config: web::Data<Config>,
    pool: web::Data<PgPool>,
    form: web::Form<LogoutForm>,
) -> Result<HttpResponse, AppError> {
    session.verify_csrf(&form.csrf_token)?;

    if let Some(user_id) = session.user_id() {
        sqlx::query("UPDATE utenti SET remember_token = NULL, token_expiry = NULL WHERE id = $1")
            .bind(user_id)
            .execute(&**pool)
            .await
            .map_err(|e| AppError::database("Failed to clear remember token", e))?;
        info!("User {} logged out", user_id);
    }

    session.forget_remembered();
    session.purge();
    Ok(see_other(config.url("/login")))
}
