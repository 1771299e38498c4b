use chrono::NaiveDateTime;

#[derive(sqlx::FromRow, Debug)]
pub struct CalendarEvent {
    pub titolo: String,
    pub descrizione: Option<String>,
    pub data_inizio: NaiveDateTime,
}
