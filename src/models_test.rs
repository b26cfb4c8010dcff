use super::*;

fn sample_message() -> Message {
    let now = OffsetDateTime::now_utc();
    Message {
        id: Uuid::now_v7(),
        session_id: Uuid::now_v7(),
        sender_type: SenderType::Admin,
        sender_id: Some("admin-1".into()),
        content: "hello".into(),
        is_read: false,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn sender_type_parse_accepts_known_values() {
    assert_eq!(SenderType::parse("user"), Some(SenderType::User));
    assert_eq!(SenderType::parse("admin"), Some(SenderType::Admin));
}

#[test]
fn sender_type_parse_rejects_unknown_and_case_variants() {
    assert_eq!(SenderType::parse("bot"), None);
    assert_eq!(SenderType::parse("Admin"), None);
    assert_eq!(SenderType::parse(""), None);
}

#[test]
fn sender_type_display_matches_wire_value() {
    assert_eq!(SenderType::User.to_string(), "user");
    assert_eq!(serde_json::to_value(SenderType::Admin).unwrap(), "admin");
}

#[test]
fn message_serializes_camel_case() {
    let msg = sample_message();
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["senderType"], "admin");
    assert_eq!(json["senderId"], "admin-1");
    assert_eq!(json["isRead"], false);
    assert!(json["createdAt"].is_string());
    assert_eq!(json["sessionId"], msg.session_id.to_string());
}

#[test]
fn admin_serialization_omits_password_hash() {
    let now = OffsetDateTime::now_utc();
    let admin = Admin {
        id: Uuid::now_v7(),
        email: "ops@example.com".into(),
        password_hash: "$argon2id$secret".into(),
        full_name: None,
        created_at: now,
        updated_at: now,
    };
    let json = serde_json::to_string(&admin).unwrap();
    assert!(!json.contains("argon2"));
    assert!(!json.contains("passwordHash"));
    assert!(json.contains("ops@example.com"));
}

#[test]
fn session_summary_flattens_session_fields() {
    let now = OffsetDateTime::now_utc();
    let session = ChatSession {
        id: Uuid::now_v7(),
        user_id: "u1".into(),
        user_name: Some("Uma".into()),
        user_email: None,
        status: SESSION_STATUS_ACTIVE.into(),
        created_at: now,
        updated_at: now,
    };
    let summary = SessionSummary { session, last_message: Some(sample_message()) };
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["userId"], "u1");
    assert_eq!(json["status"], "active");
    assert_eq!(json["lastMessage"]["content"], "hello");
}

#[test]
fn new_session_optional_fields_default_to_none() {
    let parsed: NewSession = serde_json::from_str(r#"{"userId":"u9"}"#).unwrap();
    assert_eq!(parsed.user_id, "u9");
    assert!(parsed.user_name.is_none());
    assert!(parsed.user_email.is_none());
}
