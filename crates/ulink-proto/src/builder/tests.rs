//! Unit tests for the message builder

use super::*;
use proptest::prelude::*;

fn method() -> UUri {
    UUri::new("vehicle", 0x0001_8000, 1, 1)
}

fn entity() -> UUri {
    UUri::new("vehicle", 0x0001_8001, 1, 0)
}

fn request_builder() -> UMessageBuilder {
    UMessageBuilder::request(method(), entity(), UPriority::Cs4, Duration::from_millis(500))
        .unwrap()
}

#[test]
fn test_request_attributes() {
    let message = request_builder().build().unwrap();
    let attributes = &message.attributes;

    assert_eq!(attributes.message_type, UMessageType::Request);
    assert_eq!(attributes.source, entity());
    assert_eq!(attributes.sink, Some(method()));
    assert_eq!(attributes.priority, UPriority::Cs4);
    assert_eq!(attributes.ttl, Some(500));
    assert!(!attributes.id.is_nil());
    assert_eq!(message.payload, None);
}

#[test]
fn test_each_build_gets_fresh_id() {
    let builder = request_builder();
    let first = builder.build().unwrap();
    let second = builder.build().unwrap();
    assert_ne!(first.id(), second.id());
}

#[test]
fn test_request_rejects_bad_uris() {
    let result = UMessageBuilder::request(
        method().with_resource(0),
        entity(),
        UPriority::Cs4,
        Duration::from_secs(1),
    );
    assert!(matches!(result, Err(ProtocolError::InvalidUri { role: "method", .. })));

    let result =
        UMessageBuilder::request(method(), method(), UPriority::Cs4, Duration::from_secs(1));
    assert!(matches!(result, Err(ProtocolError::InvalidUri { role: "source", .. })));
}

#[test]
fn test_request_rejects_bad_ttl() {
    let zero = UMessageBuilder::request(method(), entity(), UPriority::Cs4, Duration::ZERO);
    assert!(matches!(zero, Err(ProtocolError::OutOfRange(_))));

    let huge = Duration::from_millis(u64::from(u32::MAX) + 1);
    let overflow = UMessageBuilder::request(method(), entity(), UPriority::Cs4, huge);
    assert!(matches!(overflow, Err(ProtocolError::OutOfRange(_))));

    let max = Duration::from_millis(u64::from(u32::MAX));
    assert!(UMessageBuilder::request(method(), entity(), UPriority::Cs4, max).is_ok());
}

#[test]
fn test_request_rejects_low_priority() {
    let result =
        UMessageBuilder::request(method(), entity(), UPriority::Cs3, Duration::from_secs(1));
    assert!(matches!(result, Err(ProtocolError::OutOfRange(_))));
}

#[test]
fn test_token_and_permission_level() {
    let message = request_builder()
        .with_token("secret")
        .unwrap()
        .with_permission_level(3)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(message.attributes.token.as_deref(), Some("secret"));
    assert_eq!(message.attributes.permission_level, Some(3));
}

#[test]
fn test_request_only_setters_on_response() {
    let request = request_builder().build().unwrap();
    let response = UMessageBuilder::response_to(&request).unwrap();

    assert!(matches!(response.clone().with_token("t"), Err(ProtocolError::Domain(_))));
    assert!(matches!(response.with_permission_level(1), Err(ProtocolError::Domain(_))));
    assert!(matches!(
        request_builder().with_comm_status(UCode::Internal),
        Err(ProtocolError::Domain(_))
    ));
}

#[test]
fn test_response_to_request() {
    let request = request_builder().build().unwrap();
    let response = UMessageBuilder::response_to(&request)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(response.attributes.message_type, UMessageType::Response);
    assert_eq!(response.attributes.source, method());
    assert_eq!(response.attributes.sink, Some(entity()));
    assert_eq!(response.attributes.reqid, Some(request.id()));
    assert_eq!(response.attributes.priority, UPriority::Cs4);
    assert_eq!(response.attributes.commstatus, None);
}

#[test]
fn test_comm_status() {
    let request = request_builder().build().unwrap();

    let ok = UMessageBuilder::response_to(&request)
        .unwrap()
        .with_comm_status(UCode::Ok)
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(ok.attributes.commstatus, None);

    let denied = UMessageBuilder::response_to(&request)
        .unwrap()
        .with_comm_status(UCode::PermissionDenied)
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(denied.attributes.commstatus, Some(UCode::PermissionDenied));
}

#[test]
fn test_response_rejects_nil_request_id() {
    let result = UMessageBuilder::response(entity(), Uuid::nil(), UPriority::Cs4, method());
    assert!(matches!(result, Err(ProtocolError::OutOfRange(_))));
}

#[test]
fn test_publish_attributes() {
    let topic = entity().with_resource(0x8001);
    let message = UMessageBuilder::publish(topic.clone())
        .unwrap()
        .with_priority(UPriority::Cs1)
        .unwrap()
        .build_with_payload(Payload::text("12.5"))
        .unwrap();

    let attributes = &message.attributes;
    assert_eq!(attributes.message_type, UMessageType::Publish);
    assert_eq!(attributes.source, topic);
    assert_eq!(attributes.sink, None);
    assert_eq!(attributes.priority, UPriority::Cs1);
    assert_eq!(attributes.payload_format, UPayloadFormat::Text);
}

#[test]
fn test_publish_rejects_non_topic() {
    let result = UMessageBuilder::publish(method());
    assert!(matches!(result, Err(ProtocolError::InvalidUri { role: "topic", .. })));

    let result = UMessageBuilder::publish(UUri::any().with_resource(0x8001));
    assert!(matches!(result, Err(ProtocolError::InvalidUri { role: "topic", .. })));
}

#[test]
fn test_notification_attributes() {
    let source = method().with_resource(0x8002);
    let message = UMessageBuilder::notification(source.clone(), entity())
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(message.attributes.message_type, UMessageType::Notification);
    assert_eq!(message.attributes.source, source);
    assert_eq!(message.attributes.sink, Some(entity()));
    assert_eq!(message.attributes.reqid, None);
}

#[test]
fn test_notification_rejects_bad_uris() {
    let result = UMessageBuilder::notification(method(), entity());
    assert!(matches!(result, Err(ProtocolError::InvalidUri { role: "source", .. })));

    let result = UMessageBuilder::notification(method().with_resource(0x8002), method());
    assert!(matches!(result, Err(ProtocolError::InvalidUri { role: "sink", .. })));
}

#[test]
fn test_request_only_setters_on_publish() {
    let builder = UMessageBuilder::publish(entity().with_resource(0x8001)).unwrap();
    assert!(matches!(builder.clone().with_token("t"), Err(ProtocolError::Domain(_))));
    assert!(matches!(builder.with_comm_status(UCode::Internal), Err(ProtocolError::Domain(_))));
}

#[test]
fn test_payload_format_enforced() {
    let builder = request_builder()
        .with_payload_format(UPayloadFormat::Text)
        .unwrap();

    assert!(matches!(builder.build(), Err(ProtocolError::UnexpectedFormat(_))));

    let wrong = Payload::new(vec![1u8, 2, 3], UPayloadFormat::Raw);
    assert!(matches!(
        builder.build_with_payload(wrong),
        Err(ProtocolError::UnexpectedFormat(_))
    ));

    let message = builder.build_with_payload(Payload::text("ping")).unwrap();
    assert_eq!(message.attributes.payload_format, UPayloadFormat::Text);
    assert_eq!(message.payload.as_deref(), Some(&b"ping"[..]));
}

#[test]
fn test_payload_without_declared_format() {
    let message = request_builder()
        .build_with_payload(Payload::new(vec![0u8; 4], UPayloadFormat::Raw))
        .unwrap();
    assert_eq!(message.attributes.payload_format, UPayloadFormat::Raw);
}

proptest! {
    #[test]
    fn test_ttl_range_properties(millis in 0u64..=(u64::from(u32::MAX) + 10)) {
        let result = UMessageBuilder::request(
            method(),
            entity(),
            UPriority::Cs5,
            Duration::from_millis(millis),
        );

        if millis == 0 || millis > u64::from(u32::MAX) {
            prop_assert!(result.is_err());
        } else {
            let message = result.unwrap().build().unwrap();
            prop_assert_eq!(message.attributes.ttl, Some(millis as u32));
        }
    }
}
