//! Contract Test: SMS Gateway over HTTP
//!
//! Constraints verified:
//! - Each recipient gets its own JSON POST with bearer auth
//! - A 2xx response records the `sms` slot as processed
//! - A 5xx response leaves the slot untouched and reports `false`
//! - Rejected credentials surface as a configuration error
//! - A number the gateway refuses with a 4xx is recorded and never re-sent
//!
//! If this test fails, SMS notifications are lost or sent repeatedly.

use notifier_adaptor_sms::{SmsAdaptor, SmsGateway};
use notifier_core::config::{MessageConfig, SmsConfig};
use notifier_core::traits::Adaptor;
use notifier_core::{
    Action, Error, Notification, NotificationPayload, QName, SimpleTemplateRenderer, Subscription,
};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> SmsConfig {
    SmsConfig {
        gateway_url: format!("{}/v1/messages", server.uri()),
        api_key: Some("sms-token".to_string()),
        sender: Some("Calendar".to_string()),
        max_length: 40,
        timeout_secs: 5,
        message: MessageConfig {
            default_subject: "Shared".to_string(),
            ..Default::default()
        },
    }
}

fn adaptor(server: &MockServer) -> SmsAdaptor {
    let config = config(server);
    let gateway = SmsGateway::new(&config).unwrap();
    SmsAdaptor::new(&config, Arc::new(SimpleTemplateRenderer::new()), Arc::new(gateway))
}

fn invite() -> Notification {
    Notification::new(
        "/notes/1.xml",
        NotificationPayload::new(QName::new(
            "http://calendarserver.org/ns/",
            "invite-notification",
        )),
    )
}

#[tokio::test]
async fn each_recipient_gets_a_post() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("Authorization", "Bearer sms-token"))
        .and(body_json(serde_json::json!({
            "from": "Calendar",
            "to": "+15550100",
            "body": "Shared: invite-notification",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_json(serde_json::json!({
            "from": "Calendar",
            "to": "+15550101",
            "body": "Shared: invite-notification",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let sub = Subscription::new("mtwain", "https://cal/")
        .with_destination("sms", "tel:+15550100")
        .with_destination("sms", "sms:+15550101");
    let mut note = invite();

    let result = adaptor(&server)
        .process(&mut Action::new(&mut note, &sub))
        .await;

    assert!(matches!(result, Ok(true)));
    assert!(note.ledger.status_for("sms").is_processed());
}

#[tokio::test]
async fn gateway_error_leaves_slot_pending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sub = Subscription::new("mtwain", "https://cal/").with_destination("sms", "+15550100");
    let mut note = invite();

    let result = adaptor(&server)
        .process(&mut Action::new(&mut note, &sub))
        .await;

    assert!(matches!(result, Ok(false)));
    assert!(note.ledger.is_empty());
}

#[tokio::test]
async fn rejected_credentials_are_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let sub = Subscription::new("mtwain", "https://cal/").with_destination("sms", "+15550100");
    let mut note = invite();

    let result = adaptor(&server)
        .process(&mut Action::new(&mut note, &sub))
        .await;

    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn refused_number_is_not_resent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(serde_json::json!({
            "from": "Calendar",
            "to": "+15550100",
            "body": "Shared: invite-notification",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_json(serde_json::json!({
            "from": "Calendar",
            "to": "+1555",
            "body": "Shared: invite-notification",
        })))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid number"))
        .expect(1)
        .mount(&server)
        .await;

    let sub = Subscription::new("mtwain", "https://cal/")
        .with_destination("sms", "+15550100")
        .with_destination("sms", "+1555");
    let mut note = invite();
    let adaptor = adaptor(&server);

    let first = adaptor.process(&mut Action::new(&mut note, &sub)).await;
    assert!(matches!(first, Err(Error::Rejected { status: 422, .. })));
    assert!(note.ledger.status_for("sms").is_processed());

    let second = adaptor.process(&mut Action::new(&mut note, &sub)).await;
    assert!(matches!(second, Ok(true)));
}
