/// Opaque per-connection session token (32 lowercase hex characters when
/// minted by the server; clients may supply their own).
pub type SessionId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Mint a fresh, globally unique session id.
pub fn new_session_id() -> SessionId {
    uuid::Uuid::new_v4().simple().to_string()
}
