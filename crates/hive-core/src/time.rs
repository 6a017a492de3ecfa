use chrono::Utc;

/// Current instant as an RFC3339 string, the timestamp format used across
/// every persisted entity.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
