pub mod activity;
pub mod calendar;
pub mod goal;
pub mod health;
pub mod user;
