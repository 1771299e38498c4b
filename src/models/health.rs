use chrono::NaiveDate;

/// One day of health readings; every measurement is optional.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct HealthMetric {
    pub data: NaiveDate,
    pub passi: Option<i32>,
    pub peso: Option<f64>,
    pub frequenza_riposo: Option<i32>,
    pub ore_sonno: Option<f64>,
}
