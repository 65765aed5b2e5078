use anyhow::Result;
use relay_service::{
    clients::connector::{ConnectorClient, DispatchError},
    config::Config,
    models::{
        destination::{Destination, DestinationRegistry},
        envelope::Envelope,
        notification::Notification,
        status::Disposition,
    },
    utils::process_message,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn test_config(token_url: String) -> Config {
    Config {
        amqp_url: "amqp://localhost:5672".to_string(),
        topic_name: "egresstopic".to_string(),
        subscription_name: "relay_subscription".to_string(),
        connector_app_id: "test-app-id".to_string(),
        connector_app_password: "test-app-password".to_string(),
        connector_token_url: token_url,
        max_retry_attempts: 3,
        initial_retry_delay_ms: 10,
        max_retry_delay_ms: 100,
        retry_backoff_multiplier: 2,
        server_port: 0,
    }
}

fn contract_payload() -> Vec<u8> {
    json!({
        "MessageName": "ContractMessage",
        "IsNewContract": true,
        "ContractId": 7,
        "ContractLedgerIdentifier": "abc",
        "BlockId": 3,
        "BlockHash": "0xdead"
    })
    .to_string()
    .into_bytes()
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "test-token"
        })))
        .mount(server)
        .await;
}

fn registered_registry(server: &MockServer) -> DestinationRegistry {
    let registry = DestinationRegistry::new();
    registry.set(Destination {
        conversation_id: "conv-1".to_string(),
        channel_id: "msteams".to_string(),
        service_url: server.uri(),
    });
    registry
}

/// Test: A rendered card is posted to the registered conversation
#[tokio::test]
async fn test_card_dispatch_posts_to_registered_conversation() -> Result<()> {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("POST"))
        .and(path("/v3/conversations/conv-1/activities"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "activity-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = ConnectorClient::new(&test_config(format!("{}/token", server.uri())))?;
    let registry = registered_registry(&server);

    let envelope = Envelope::decode(&contract_payload())?;
    let card = Notification::classify(&envelope)?
        .render()
        .expect("contract message should render a card");

    connector.dispatch(&registry, &card).await?;

    let requests = server
        .received_requests()
        .await
        .expect("request recording enabled");
    let send = requests
        .iter()
        .find(|request| request.url.path().ends_with("/activities"))
        .expect("an activity should have been posted");

    let activity: serde_json::Value = serde_json::from_slice(&send.body)?;
    assert_eq!(activity["type"], "message");
    assert_eq!(activity["channelId"], "msteams");
    assert_eq!(activity["conversation"]["id"], "conv-1");
    assert_eq!(activity["locale"], "en-Us");
    assert_eq!(
        activity["attachments"][0]["contentType"],
        "application/vnd.microsoft.card.thumbnail"
    );
    assert_eq!(
        activity["attachments"][0]["content"]["title"],
        "New Contract Created"
    );
    assert!(
        activity["attachments"][0]["content"]["text"]
            .as_str()
            .expect("card text is a string")
            .contains("Contract Id : 7")
    );

    Ok(())
}

/// Test: Dispatch with no registered destination fails without a send
#[tokio::test]
async fn test_dispatch_without_destination_is_dropped() -> Result<()> {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let connector = ConnectorClient::new(&test_config(format!("{}/token", server.uri())))?;
    let registry = DestinationRegistry::new();

    let envelope = Envelope::decode(&contract_payload())?;
    let card = Notification::classify(&envelope)?
        .render()
        .expect("contract message should render a card");

    let error = connector
        .dispatch(&registry, &card)
        .await
        .expect_err("dispatch should fail without a destination");
    assert!(matches!(error, DispatchError::NoDestination));

    // The whole pipeline drops the message rather than retrying it.
    let disposition = process_message(&contract_payload(), &registry, &connector).await;
    assert_eq!(disposition, Disposition::Complete);

    let requests = server
        .received_requests()
        .await
        .expect("request recording enabled");
    assert!(
        requests.is_empty(),
        "no outbound call should be made without a destination"
    );

    Ok(())
}

/// Test: A transport failure asks for broker redelivery
#[tokio::test]
async fn test_transport_failure_requests_redelivery() -> Result<()> {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("POST"))
        .and(path("/v3/conversations/conv-1/activities"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let connector = ConnectorClient::new(&test_config(format!("{}/token", server.uri())))?;
    let registry = registered_registry(&server);

    let disposition = process_message(&contract_payload(), &registry, &connector).await;

    assert_eq!(disposition, Disposition::Redeliver);

    Ok(())
}

/// Test: A credential failure is a transport failure, not a drop
#[tokio::test]
async fn test_credential_failure_requests_redelivery() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let connector = ConnectorClient::new(&test_config(format!("{}/token", server.uri())))?;
    let registry = registered_registry(&server);

    let disposition = process_message(&contract_payload(), &registry, &connector).await;

    assert_eq!(disposition, Disposition::Redeliver);

    Ok(())
}

/// Test: Malformed bytes complete without any dispatch attempt
#[tokio::test]
async fn test_malformed_payload_never_dispatches() -> Result<()> {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let connector = ConnectorClient::new(&test_config(format!("{}/token", server.uri())))?;
    let registry = registered_registry(&server);

    for payload in [&b"\xff\xfe"[..], b"not json", b"[1,2,3]", b"{}"] {
        let disposition = process_message(payload, &registry, &connector).await;
        assert_eq!(disposition, Disposition::Complete);
    }

    let requests = server
        .received_requests()
        .await
        .expect("request recording enabled");
    assert!(
        requests.is_empty(),
        "malformed payloads must never reach the connector"
    );

    Ok(())
}

/// Test: A malformed payload shape completes without a dispatch attempt
#[tokio::test]
async fn test_classify_error_never_dispatches() -> Result<()> {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let connector = ConnectorClient::new(&test_config(format!("{}/token", server.uri())))?;
    let registry = registered_registry(&server);

    let payload = json!({
        "MessageName": "ContractMessage",
        "IsNewContract": "not-a-boolean"
    })
    .to_string()
    .into_bytes();

    let disposition = process_message(&payload, &registry, &connector).await;

    assert_eq!(disposition, Disposition::Complete);

    let requests = server
        .received_requests()
        .await
        .expect("request recording enabled");
    assert!(requests.is_empty());

    Ok(())
}

/// Test: Unrecognized messages are acknowledged without a send
#[tokio::test]
async fn test_unrecognized_message_completes_without_send() -> Result<()> {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let connector = ConnectorClient::new(&test_config(format!("{}/token", server.uri())))?;
    let registry = registered_registry(&server);

    let payload = json!({ "MessageName": "HeartbeatMessage" })
        .to_string()
        .into_bytes();

    let disposition = process_message(&payload, &registry, &connector).await;

    assert_eq!(disposition, Disposition::Complete);

    let requests = server
        .received_requests()
        .await
        .expect("request recording enabled");
    assert!(requests.is_empty());

    Ok(())
}

/// Test: A redelivered message replays the same pipeline and can succeed
#[tokio::test]
async fn test_redelivery_replays_the_same_pipeline() -> Result<()> {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    // First attempt fails at the transport, the replay succeeds.
    Mock::given(method("POST"))
        .and(path("/v3/conversations/conv-1/activities"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v3/conversations/conv-1/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "activity-1" })))
        .mount(&server)
        .await;

    let connector = ConnectorClient::new(&test_config(format!("{}/token", server.uri())))?;
    let registry = registered_registry(&server);

    let first = process_message(&contract_payload(), &registry, &connector).await;
    assert_eq!(first, Disposition::Redeliver);

    let second = process_message(&contract_payload(), &registry, &connector).await;
    assert_eq!(second, Disposition::Complete);

    Ok(())
}
