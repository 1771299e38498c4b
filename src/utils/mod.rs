pub mod csrf;
pub mod format;
pub mod password;
pub mod session;
pub mod stats;
pub mod validation;
