use chrono::NaiveDate;

/// An open goal; `progresso` is measured in `unita`.
#[derive(sqlx::FromRow, Debug)]
pub struct Goal {
    pub titolo: String,
    pub valore_target: f64,
    pub unita: String,
    pub progresso: f64,
    pub data_fine: NaiveDate,
}
