use serde_json::json;

use super::*;

// ==================== QueryDescription Tests ====================

#[test]
fn test_query_description_rejects_zero_page() {
    assert!(QueryDescription::new("devices", 0, 20).is_err());
    assert!(QueryDescription::new("devices", 1, 0).is_err());
    assert!(QueryDescription::new("", 1, 20).is_err());
    assert!(QueryDescription::new("devices", 1, 20).is_ok());
}

#[test]
fn test_sort_spec_requires_field() {
    assert!(SortSpec::new("", SortDirection::Asc).is_err());
    assert!(SortSpec::new("   ", SortDirection::Desc).is_err());
    let sort = SortSpec::new("inserted_at", SortDirection::Desc).unwrap();
    assert_eq!(sort.direction.as_str(), "desc");
}

#[test]
fn test_sort_direction_toggle() {
    assert_eq!(SortDirection::Desc.toggled(), SortDirection::Asc);
    assert_eq!(SortDirection::Asc.toggled(), SortDirection::Desc);
    assert_eq!(SortDirection::default(), SortDirection::Desc);
}

#[test]
fn test_pagination_start_offset() {
    assert_eq!(Pagination::new(1, 20).unwrap().start(), 0);
    assert_eq!(Pagination::new(3, 20).unwrap().start(), 40);
}

#[test]
fn test_column_spec_through_relation() {
    let plain = ColumnSpec::new("Name", "name");
    assert_eq!(plain.sort_field(), "name");
    assert_eq!(plain.wire_pair(), ("name", "Name"));

    let joined = ColumnSpec::new("Outlet", "name").through("outlet");
    assert_eq!(joined.sort_field(), "outlet.name");
    assert_eq!(joined.wire_pair(), ("id", "id"));
}

#[test]
fn test_preloads_deduplicated() {
    let query = QueryDescription::new("devices", 1, 20)
        .unwrap()
        .with_preload("outlet")
        .with_preload("outlet")
        .with_preload("owner");
    assert_eq!(query.preloads, vec!["outlet", "owner"]);
}

// ==================== GridResult Tests ====================

#[test]
fn test_total_pages_rounds_up() {
    let result = GridResult::new(Vec::new(), 101);
    assert_eq!(result.total_pages(20), 6);
    assert_eq!(GridResult::new(Vec::new(), 100).total_pages(20), 5);
    assert_eq!(GridResult::new(Vec::new(), 0).total_pages(20), 0);
    assert_eq!(GridResult::new(Vec::new(), 5).total_pages(0), 0);
}

#[test]
fn test_total_pages_saturates() {
    assert_eq!(GridResult::new(Vec::new(), u64::MAX).total_pages(1), u32::MAX);
    assert_eq!(GridResult::new(Vec::new(), u64::from(u32::MAX) * 4).total_pages(2), u32::MAX);
}

// ==================== ConnectionOptions Tests ====================

#[test]
fn test_connection_options_default() {
    let opts = ConnectionOptions::default();
    assert_eq!(opts.api_prefix, "api");
    assert_eq!(opts.socket_path, "/socket");
    assert_eq!(opts.protocol_version, "2.0.0");
    assert_eq!(opts.http_version, HttpVersion::Http1);
}

#[test]
fn test_connection_options_builder_normalizes_paths() {
    let opts = ConnectionOptions::new()
        .with_api_prefix("/svt_api/")
        .with_socket_path("live");
    assert_eq!(opts.api_prefix, "svt_api");
    assert_eq!(opts.socket_path, "/live");
}

#[test]
fn test_connection_options_deserialize_partial() {
    let opts: ConnectionOptions = serde_json::from_value(json!({"http_version": "http2"})).unwrap();
    assert_eq!(opts.http_version, HttpVersion::Http2);
    assert_eq!(opts.api_prefix, "api");
}

// ==================== PhxMessage Tests ====================

#[test]
fn test_phx_message_encode() {
    let msg = PhxMessage::new("user:sidebar", "phx_join", json!({}))
        .with_refs(Some("1".into()), Some("1".into()));
    assert_eq!(msg.encode().unwrap(), r#"["1","1","user:sidebar","phx_join",{}]"#);
}

#[test]
fn test_phx_message_decode_push_with_null_refs() {
    let msg =
        PhxMessage::decode(r#"[null,null,"user:sidebar","update_counts",{"devices":4}]"#).unwrap();
    assert!(msg.join_ref.is_none());
    assert!(msg.msg_ref.is_none());
    assert_eq!(msg.event, "update_counts");
    assert_eq!(msg.payload["devices"], 4);
    assert!(msg.reply().is_none());
}

#[test]
fn test_phx_message_decode_reply() {
    let msg = PhxMessage::decode(
        r#"["1","3","user:sidebar","phx_reply",{"status":"error","response":{"reason":"unauthorized"}}]"#,
    )
    .unwrap();
    let reply = msg.reply().unwrap();
    assert_eq!(reply.status, ReplyStatus::Error);
    assert_eq!(reply.reason(), "unauthorized");
}

#[test]
fn test_phx_message_decode_rejects_objects() {
    assert!(PhxMessage::decode(r#"{"topic":"user:sidebar"}"#).is_err());
}

// ==================== Channel State Tests ====================

#[test]
fn test_counts_from_payload() {
    let counts = counts_from_payload(&json!({
        "devices": 4,
        "orders": "12",
        "ratio": 2.0,
        "label": "n/a"
    }));
    assert_eq!(counts.get("devices"), Some(&4));
    assert_eq!(counts.get("orders"), Some(&12));
    assert_eq!(counts.get("ratio"), Some(&2));
    assert!(!counts.contains_key("label"));

    assert!(counts_from_payload(&json!([1, 2])).is_empty());
}

#[test]
fn test_counts_from_payload_skips_lossy_numbers() {
    let counts = counts_from_payload(&json!({
        "half": 2.5,
        "huge": 1.0e30,
        "unsigned": u64::MAX,
        "negative": -3.0,
        "alerts": 7
    }));
    assert_eq!(counts.len(), 2);
    assert_eq!(counts.get("negative"), Some(&-3));
    assert_eq!(counts.get("alerts"), Some(&7));
}

#[test]
fn test_topic_state_activity() {
    assert!(!TopicState::Idle.is_active());
    assert!(TopicState::Joining.is_active());
    assert!(TopicState::Joined.is_active());
    assert!(!TopicState::Failed.is_active());
}

// ==================== RecordForm Tests ====================

#[test]
fn test_record_form_replaces_existing_field() {
    let form = RecordForm::new().field("name", "a").field("name", "b");
    assert_eq!(form.fields().len(), 1);
    assert_eq!(form.get("name"), Some("b"));
}

#[test]
fn test_record_form_from_record_skips_nested() {
    let record = json!({"id": 3, "name": "kiosk", "active": true, "outlet": {"id": 1}})
        .as_object()
        .cloned()
        .unwrap();
    let form = RecordForm::from_record(&record);
    assert_eq!(form.get("id"), Some("3"));
    assert_eq!(form.get("active"), Some("true"));
    assert!(form.get("outlet").is_none());
    assert!(!form.is_new());
    assert!(RecordForm::new().field("id", "0").is_new());
}
