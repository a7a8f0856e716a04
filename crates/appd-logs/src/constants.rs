pub const APPD_LOGS_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_FORM_BYTES: usize = 2 * 1024 * 1024;
pub const LOG_FILE_NAME: &str = "appd-logs.log";

pub const MISSING_LOGS_HEADER: &str = "x-pods-missing-logs";
