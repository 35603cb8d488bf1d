//! Identifier types for identities and sessions.

pub use kernel::id::{SessionId, UserId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_new() {
        let user_id = UserId::new();
        assert_eq!(user_id.as_uuid().get_version_num(), 4); // UUIDv4
    }

    #[test]
    fn test_from_uuid() {
        let uuid = uuid::Uuid::new_v4();
        let session_id = SessionId::from_uuid(uuid);
        assert_eq!(session_id.as_uuid(), &uuid);
    }
}
