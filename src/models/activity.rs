use chrono::NaiveDateTime;
use uuid::Uuid;

/// An activity joined with its type's display metadata.
#[derive(sqlx::FromRow, Debug)]
pub struct RecentActivity {
    pub id: Uuid,
    pub titolo: String,
    pub data_inizio: NaiveDateTime,
    pub durata: Option<i32>,
    pub distanza: Option<f64>,
    pub tipo_nome: String,
    pub icona: String,
    pub colore: String,
}

#[derive(sqlx::FromRow, Debug, Default, Clone, PartialEq)]
pub struct ActivityTotals {
    pub total_activities: i64,
    pub total_distance: f64,
    pub total_duration: i64,
    pub total_calories: i64,
}
