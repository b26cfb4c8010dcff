use super::*;

#[test]
fn error_codes_cover_taxonomy() {
    let id = Uuid::nil();
    assert_eq!(ChatError::validation("x").error_code(), "E_VALIDATION");
    assert_eq!(ChatError::NotFound { entity: "message", id }.error_code(), "E_NOT_FOUND");
    assert_eq!(ChatError::SessionNotFound(id).error_code(), "E_SESSION_NOT_FOUND");
    assert_eq!(ChatError::Persistence("boom".into()).error_code(), "E_PERSISTENCE");
    assert_eq!(ChatError::PersistenceTimeout(Duration::from_millis(5)).error_code(), "E_PERSISTENCE");
    assert_eq!(ChatError::UnconfirmedMessage(id).error_code(), "E_PERSISTENCE");
    assert_eq!(ChatError::auth("nope").error_code(), "E_AUTH");
}

#[test]
fn only_plain_timeouts_are_retryable() {
    assert!(ChatError::PersistenceTimeout(Duration::from_secs(1)).retryable());
    assert!(!ChatError::Persistence("boom".into()).retryable());
    assert!(!ChatError::UnconfirmedMessage(Uuid::nil()).retryable());
    assert!(!ChatError::validation("bad").retryable());
}

#[test]
fn from_store_maps_not_found_to_entity() {
    let id = Uuid::now_v7();
    let err = ChatError::from_store("message", id, StoreError::NotFound);
    assert!(matches!(err, ChatError::NotFound { entity: "message", id: got } if got == id));
}

#[test]
fn from_store_maps_constraint_violations_to_persistence() {
    let err = ChatError::from(StoreError::ForeignKey("messages_session_id_fkey".into()));
    assert!(matches!(err, ChatError::Persistence(_)));
    let err = ChatError::from(StoreError::Conflict("admins_email_key".into()));
    assert!(matches!(err, ChatError::Persistence(_)));
}

#[test]
fn from_store_maps_timeout() {
    let err = ChatError::from(StoreError::Timeout(Duration::from_millis(250)));
    assert_eq!(err.to_string(), "persistence timed out after 250ms");
}

#[test]
fn not_found_display_names_entity() {
    let err = ChatError::NotFound { entity: "chat session", id: Uuid::nil() };
    assert_eq!(err.to_string(), format!("chat session not found: {}", Uuid::nil()));
}
