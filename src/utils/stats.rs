use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::models::health::HealthMetric;

pub const CHART_DAYS: u64 = 7;

/// Percentage of `target` reached, capped at 100. A zero target counts as 0%.
pub fn goal_progress(current: f64, target: f64) -> f64 {
    if target == 0.0 {
        return 0.0;
    }
    (current / target * 100.0).min(100.0)
}

/// Chart data for the last [`CHART_DAYS`] days, oldest first.
#[derive(Debug, Serialize, PartialEq)]
pub struct WeeklySeries {
    pub labels: Vec<String>,
    pub steps: Vec<i32>,
    pub weight: Vec<Option<f64>>,
}

pub fn weekly_series(today: NaiveDate, metrics: &[HealthMetric]) -> WeeklySeries {
    let days: Vec<NaiveDate> = (0..CHART_DAYS)
        .rev()
        .map(|offset| today - Days::new(offset))
        .collect();

    let mut steps = vec![0; days.len()];
    let mut weight = vec![None; days.len()];

    for metric in metrics {
        let Some(slot) = days.iter().position(|day| *day == metric.data) else {
            continue;
        };
        steps[slot] = metric.passi.unwrap_or(0);
        if metric.peso.is_some() {
            weight[slot] = metric.peso;
        }
    }

    WeeklySeries {
        labels: days.iter().map(|day| day.format("%d/%m").to_string()).collect(),
        steps,
        weight,
    }
}
