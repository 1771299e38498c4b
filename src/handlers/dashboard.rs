use actix_web::{web, HttpResponse};
use askama::Template;
use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime};
use log::warn;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::{render, see_other, Page};
use crate::models::activity::{ActivityTotals, RecentActivity};
use crate::models::calendar::CalendarEvent;
use crate::models::goal::Goal;
use crate::models::health::HealthMetric;
use crate::models::user::CurrentUser;
use crate::utils::format::{format_duration, format_hours_minutes, format_number, script_json};
use crate::utils::session::Session;
use crate::utils::stats::{goal_progress, weekly_series};

const RECENT_ACTIVITIES: i64 = 5;
const UPCOMING_EVENT_DAYS: u64 = 5;
const HEALTH_WINDOW_DAYS: u64 = 7;

/// Everything the dashboard reads for one user.
struct DashboardData {
    activities: Vec<RecentActivity>,
    totals: ActivityTotals,
    events: Vec<CalendarEvent>,
    goals: Vec<Goal>,
    metrics: Vec<HealthMetric>,
    unread_notifications: i64,
}

struct ActivityView {
    id: String,
    title: String,
    type_name: String,
    icon: String,
    color: String,
    date: String,
    time: String,
    distance: String,
    duration: String,
}

struct EventView {
    day: String,
    month: String,
    time: String,
    title: String,
    description: String,
}

struct GoalView {
    title: String,
    target: String,
    deadline: String,
    width: String,
    percent: String,
    complete: bool,
}

struct HealthView {
    weight: String,
    steps: String,
    resting_heart_rate: String,
    sleep: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    page: Page,
    csrf_token: String,
    first_name: String,
    today: String,
    unread_notifications: i64,
    total_activities: String,
    total_distance: String,
    total_duration: String,
    total_calories: String,
    activities: Vec<ActivityView>,
    events: Vec<EventView>,
    goals: Vec<GoalView>,
    health: Option<HealthView>,
    chart_labels: String,
    chart_steps: String,
    chart_weight: String,
}

const NOT_AVAILABLE: &str = "N/A";

impl DashboardTemplate {
    fn build(
        page: Page,
        csrf_token: String,
        user: &CurrentUser,
        data: DashboardData,
        now: DateTime<Local>,
    ) -> Result<Self, AppError> {
        let series = weekly_series(now.date_naive(), &data.metrics);
        Ok(DashboardTemplate {
            page,
            csrf_token,
            first_name: user.nome.clone(),
            today: now.format("%A, %-d %B %Y").to_string(),
            unread_notifications: data.unread_notifications,
            total_activities: format_number(data.totals.total_activities as f64, 0),
            total_distance: format_number(data.totals.total_distance, 1),
            total_duration: format_duration(data.totals.total_duration),
            total_calories: format_number(data.totals.total_calories as f64, 0),
            activities: data.activities.iter().map(activity_view).collect(),
            events: data.events.iter().map(event_view).collect(),
            goals: data.goals.iter().map(goal_view).collect(),
            health: data.metrics.last().map(health_view),
            chart_labels: chart_json(&series.labels)?,
            chart_steps: chart_json(&series.steps)?,
            chart_weight: chart_json(&series.weight)?,
        })
    }
}

fn chart_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    script_json(value).map_err(|e| AppError::InternalServerError(format!("Chart serialization failed: {}", e)))
}

fn activity_view(activity: &RecentActivity) -> ActivityView {
    ActivityView {
        id: activity.id.to_string(),
        title: activity.titolo.clone(),
        type_name: activity.tipo_nome.clone(),
        icon: activity.icona.clone(),
        color: activity.colore.clone(),
        date: activity.data_inizio.format("%d/%m/%Y").to_string(),
        time: activity.data_inizio.format("%H:%M").to_string(),
        distance: activity
            .distanza
            .filter(|km| *km > 0.0)
            .map(|km| format!("{} km", format_number(km, 1)))
            .unwrap_or_default(),
        duration: activity
            .durata
            .filter(|secs| *secs > 0)
            .map(|secs| format_hours_minutes(i64::from(secs)))
            .unwrap_or_default(),
    }
}

fn event_view(event: &CalendarEvent) -> EventView {
    EventView {
        day: event.data_inizio.format("%d").to_string(),
        month: event.data_inizio.format("%b").to_string(),
        time: event.data_inizio.format("%H:%M").to_string(),
        title: event.titolo.clone(),
        description: event.descrizione.clone().unwrap_or_default(),
    }
}

fn goal_view(goal: &Goal) -> GoalView {
    let progress = goal_progress(goal.progresso, goal.valore_target);
    GoalView {
        title: goal.titolo.clone(),
        target: format!("{} {}", goal.valore_target, goal.unita),
        deadline: goal.data_fine.format("%d/%m/%Y").to_string(),
        width: format!("{:.1}", progress),
        percent: format!("{:.0}", progress.round()),
        complete: progress >= 100.0,
    }
}

fn health_view(metric: &HealthMetric) -> HealthView {
    HealthView {
        weight: metric
            .peso
            .map(|kg| format!("{} kg", format_number(kg, 1)))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        steps: metric
            .passi
            .map(|steps| format_number(f64::from(steps), 0))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        resting_heart_rate: metric
            .frequenza_riposo
            .map(|bpm| format!("{} bpm", bpm))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        sleep: metric
            .ore_sonno
            .map(|hours| format!("{} h", format_number(hours, 1)))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    }
}

// GET /dashboard
pub async fn dashboard(
    session: Session,
    config: web::Data<Config>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = session.require_login(&config)?;

    let Some(user) = session.current_user(&pool).await? else {
        warn!("Session refers to missing user {}", user_id);
        session.purge();
        return Ok(see_other(config.url("/login")));
    };

    let now = Local::now();
    let data = load_dashboard(&pool, user_id, now.date_naive()).await?;
    let template = DashboardTemplate::build(Page::new(&config), session.csrf_token(), &user, data, now)?;
    render(&mut HttpResponse::Ok(), &template)
}

/// Runs the dashboard's independent read queries, all scoped to `user_id`.
async fn load_dashboard(pool: &PgPool, user_id: Uuid, today: NaiveDate) -> Result<DashboardData, AppError> {
    let (activities, totals, events, goals, metrics, unread_notifications) = tokio::try_join!(
        recent_activities(pool, user_id),
        activity_totals(pool, user_id),
        upcoming_events(pool, user_id, today),
        active_goals(pool, user_id, today),
        recent_metrics(pool, user_id, today),
        unread_notifications(pool, user_id),
    )?;

    Ok(DashboardData {
        activities,
        totals,
        events,
        goals,
        metrics,
        unread_notifications,
    })
}

async fn recent_activities(pool: &PgPool, user_id: Uuid) -> Result<Vec<RecentActivity>, AppError> {
    sqlx::query_as::<_, RecentActivity>(
        "SELECT a.id, a.titolo, a.data_inizio, a.durata, a.distanza,
            t.nome AS tipo_nome, t.icona, t.colore
        FROM attivita a
        JOIN tipi_attivita t ON a.tipo_attivita_id = t.id
        WHERE a.utente_id = $1
        ORDER BY a.data_inizio DESC
        LIMIT $2",
    )
    .bind(user_id)
    .bind(RECENT_ACTIVITIES)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch recent activities", e))
}

async fn activity_totals(pool: &PgPool, user_id: Uuid) -> Result<ActivityTotals, AppError> {
    sqlx::query_as::<_, ActivityTotals>(
        "SELECT COUNT(*) AS total_activities,
            COALESCE(SUM(distanza), 0)::DOUBLE PRECISION AS total_distance,
            COALESCE(SUM(durata), 0)::BIGINT AS total_duration,
            COALESCE(SUM(calorie), 0)::BIGINT AS total_calories
        FROM attivita
        WHERE utente_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch activity totals", e))
}

/// Events starting between the start of today and the end of day `today + 5`.
async fn upcoming_events(pool: &PgPool, user_id: Uuid, today: NaiveDate) -> Result<Vec<CalendarEvent>, AppError> {
    let from = today.and_time(NaiveTime::MIN);
    let until = (today + Days::new(UPCOMING_EVENT_DAYS + 1)).and_time(NaiveTime::MIN);

    sqlx::query_as::<_, CalendarEvent>(
        "SELECT titolo, descrizione, data_inizio
        FROM eventi_calendario
        WHERE utente_id = $1
            AND data_inizio >= $2 AND data_inizio < $3
            AND (attivita_id IS NULL OR completato = FALSE)
        ORDER BY data_inizio ASC",
    )
    .bind(user_id)
    .bind(from)
    .bind(until)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch upcoming events", e))
}

async fn active_goals(pool: &PgPool, user_id: Uuid, today: NaiveDate) -> Result<Vec<Goal>, AppError> {
    sqlx::query_as::<_, Goal>(
        "SELECT titolo, valore_target, unita, progresso, data_fine
        FROM obiettivi
        WHERE utente_id = $1 AND data_fine >= $2 AND completato = FALSE
        ORDER BY data_fine ASC",
    )
    .bind(user_id)
    .bind(today)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch active goals", e))
}

async fn recent_metrics(pool: &PgPool, user_id: Uuid, today: NaiveDate) -> Result<Vec<HealthMetric>, AppError> {
    sqlx::query_as::<_, HealthMetric>(
        "SELECT data, passi, peso, frequenza_riposo, ore_sonno
        FROM metriche_salute
        WHERE utente_id = $1 AND data BETWEEN $2 AND $3
        ORDER BY data ASC",
    )
    .bind(user_id)
    .bind(today - Days::new(HEALTH_WINDOW_DAYS))
    .bind(today)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch health metrics", e))
}

async fn unread_notifications(pool: &PgPool, user_id: Uuid) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifiche WHERE utente_id = $1 AND letta = FALSE")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count notifications", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::LOCATION;
    use actix_web::http::StatusCode;
    use chrono::{NaiveDateTime, TimeZone};

    use crate::config::test_config;
    use crate::db::lazy_pool;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn user() -> CurrentUser {
        CurrentUser {
            nome: "Giulia".to_string(),
        }
    }

    fn sample_data() -> DashboardData {
        DashboardData {
            activities: vec![RecentActivity {
                id: Uuid::now_v7(),
                titolo: "Morning <run>".to_string(),
                data_inizio: at(2026, 10, 17, 7, 30),
                durata: Some(3725),
                distanza: Some(10.26),
                tipo_nome: "Corsa".to_string(),
                icona: "fa-running".to_string(),
                colore: "#e74c3c".to_string(),
            }],
            totals: ActivityTotals {
                total_activities: 12,
                total_distance: 1234.56,
                total_duration: 7384,
                total_calories: 15300,
            },
            events: vec![CalendarEvent {
                titolo: "Track session".to_string(),
                descrizione: None,
                data_inizio: at(2026, 10, 20, 18, 0),
            }],
            goals: vec![
                Goal {
                    titolo: "Run 100 km".to_string(),
                    valore_target: 100.0,
                    unita: "km".to_string(),
                    progresso: 150.0,
                    data_fine: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
                },
                Goal {
                    titolo: "Open goal".to_string(),
                    valore_target: 0.0,
                    unita: "km".to_string(),
                    progresso: 10.0,
                    data_fine: NaiveDate::from_ymd_opt(2026, 11, 30).unwrap(),
                },
            ],
            metrics: vec![HealthMetric {
                data: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
                passi: Some(8450),
                peso: Some(61.2),
                frequenza_riposo: None,
                ore_sonno: Some(7.5),
            }],
            unread_notifications: 3,
        }
    }

    fn now() -> DateTime<Local> {
        Local.from_local_datetime(&at(2026, 10, 18, 9, 0)).unwrap()
    }

    #[test]
    fn builds_display_values() {
        let template =
            DashboardTemplate::build(Page::default(), "t".repeat(64), &user(), sample_data(), now()).unwrap();

        assert_eq!(template.today, "Sunday, 18 October 2026");
        assert_eq!(template.total_activities, "12");
        assert_eq!(template.total_distance, "1,234.6");
        assert_eq!(template.total_duration, "02:03:04");
        assert_eq!(template.total_calories, "15,300");

        let activity = &template.activities[0];
        assert_eq!(activity.date, "17/10/2026");
        assert_eq!(activity.time, "07:30");
        assert_eq!(activity.distance, "10.3 km");
        assert_eq!(activity.duration, "01:02");

        assert_eq!(template.events[0].day, "20");
        assert_eq!(template.events[0].month, "Oct");

        assert_eq!(template.goals[0].percent, "100");
        assert!(template.goals[0].complete);
        assert_eq!(template.goals[1].percent, "0");
        assert!(!template.goals[1].complete);

        let health = template.health.as_ref().unwrap();
        assert_eq!(health.weight, "61.2 kg");
        assert_eq!(health.steps, "8,450");
        assert_eq!(health.resting_heart_rate, "N/A");
        assert_eq!(health.sleep, "7.5 h");

        assert_eq!(
            template.chart_labels,
            r#"["12/10","13/10","14/10","15/10","16/10","17/10","18/10"]"#
        );
        assert_eq!(template.chart_steps, "[0,0,0,0,8450,0,0]");
        assert_eq!(template.chart_weight, "[null,null,null,null,61.2,null,null]");
    }

    #[test]
    fn renders_escaped_html_with_chart_data() {
        let template =
            DashboardTemplate::build(Page::default(), "t".repeat(64), &user(), sample_data(), now()).unwrap();
        let html = template.render().unwrap();

        assert!(html.contains("Giulia"));
        assert!(html.contains("Morning &lt;run&gt;"));
        assert!(!html.contains("Morning <run>"));
        assert!(html.contains("[0,0,0,0,8450,0,0]"));
        assert!(html.contains(r#"["12/10","13/10""#));
    }

    #[test]
    fn empty_dashboard_still_has_a_full_week() {
        let data = DashboardData {
            activities: Vec::new(),
            totals: ActivityTotals::default(),
            events: Vec::new(),
            goals: Vec::new(),
            metrics: Vec::new(),
            unread_notifications: 0,
        };
        let template = DashboardTemplate::build(Page::default(), String::new(), &user(), data, now()).unwrap();

        assert!(template.health.is_none());
        assert_eq!(template.total_duration, "00:00:00");
        assert_eq!(template.total_distance, "0.0");
        assert_eq!(template.chart_steps, "[0,0,0,0,0,0,0]");
        assert_eq!(template.chart_weight, "[null,null,null,null,null,null,null]");
        assert!(template.render().is_ok());
    }

    #[actix_web::test]
    async fn anonymous_users_are_sent_to_login() {
        let config = test_config();
        let app = test_app!(config, lazy_pool(&config));

        let req = actix_web::test::TestRequest::get().uri("/dashboard").to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(LOCATION).unwrap(), "/login");
    }
}
