pub const USERS: &str = "users";
pub const SESSIONS: &str = "sessions";
pub const MEASUREMENTS: &str = "measurements";
pub const POSTURE_SETTINGS: &str = "posture_settings";
pub const CONFIG_VERSIONS: &str = "config_versions";

// Secondary index trees
pub const MEASUREMENTS_BY_USER: &str = "measurements_by_user";
