pub mod measurements;
pub mod posture_settings;
pub mod sessions;
pub mod users;
