#![allow(non_snake_case)]
use reqwest::Url;
use std::time::Duration;
use waste_kiosk::{
    redemption::{
        FinalStatus,
        Prize,
        RecordId,
        RedemptionRequest,
        SensorReading,
        WasteCategory,
    },
    service::{
        RedemptionService,
        ServiceError,
    },
    service_client::ServiceClient,
    test_helpers::{
        ServiceCall,
        StubServer,
    },
};

fn client_for(server: &StubServer) -> ServiceClient {
    let url = Url::parse(server.base_url()).unwrap();
    ServiceClient::new(&url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn create_record__posts_selection_and_returns_id() {
    // given
    let server = StubServer::start().await.unwrap();
    server.respond_to_create(200, r#"{"id": 42}"#);
    let client = client_for(&server);
    let request = RedemptionRequest::new(WasteCategory::PlasticBottles, Prize::EmergencyKit);

    // when
    let id = client.create_record(request).await.unwrap();

    // then
    assert_eq!(id, RecordId(42));
    assert_eq!(server.calls(), vec![ServiceCall::Create(request)]);
}

#[tokio::test]
async fn create_record__surfaces_service_error_message() {
    // given
    let server = StubServer::start().await.unwrap();
    server.respond_to_create(400, r#"{"error": "Out of stock"}"#);
    let client = client_for(&server);

    // when
    let err = client
        .create_record(RedemptionRequest::new(WasteCategory::Paper, Prize::PaperPad))
        .await
        .unwrap_err();

    // then
    assert_eq!(err, ServiceError::Rejected("Out of stock".to_string()));
}

#[tokio::test]
async fn create_record__unreadable_failure_is_malformed() {
    let server = StubServer::start().await.unwrap();
    server.respond_to_create(500, "<html>oops</html>");
    let client = client_for(&server);

    let err = client
        .create_record(RedemptionRequest::new(WasteCategory::Paper, Prize::PaperPad))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn create_record__success_without_id_is_malformed() {
    let server = StubServer::start().await.unwrap();
    server.respond_to_create(200, r#"{"ok": true}"#);
    let client = client_for(&server);

    let err = client
        .create_record(RedemptionRequest::new(WasteCategory::Paper, Prize::PaperPad))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn check_status__maps_sensor_signals() {
    // given
    let server = StubServer::start().await.unwrap();
    server.push_sensor_response(200, r#"{"SensorResponse": "verified"}"#);
    server.push_sensor_response(200, r#"{"SensorResponse": "cancelled"}"#);
    server.push_sensor_response(200, r#"{"SensorResponse": "Weighing"}"#);
    server.push_sensor_response(200, r#"{"SensorResponse": null}"#);
    server.push_sensor_response(200, "{}");
    let client = client_for(&server);

    // when
    let mut readings = Vec::new();
    for _ in 0..5 {
        readings.push(client.check_status(RecordId(9)).await.unwrap());
    }

    // then
    assert_eq!(
        readings,
        vec![
            SensorReading::Verified,
            SensorReading::Cancelled,
            SensorReading::Pending("Weighing".to_string()),
            SensorReading::Unavailable,
            SensorReading::Unavailable,
        ]
    );
    assert!(
        server
            .calls()
            .iter()
            .all(|c| *c == ServiceCall::Check(RecordId(9)))
    );
}

#[tokio::test]
async fn check_status__error_status_means_not_available_yet() {
    let server = StubServer::start().await.unwrap();
    server.push_sensor_response(404, r#"{"error": "no such record"}"#);
    let client = client_for(&server);

    let reading = client.check_status(RecordId(3)).await.unwrap();

    assert_eq!(reading, SensorReading::Unavailable);
}

#[tokio::test]
async fn check_status__garbage_success_body_is_an_error() {
    let server = StubServer::start().await.unwrap();
    server.push_sensor_response(200, "not json");
    let client = client_for(&server);

    let err = client.check_status(RecordId(3)).await.unwrap_err();

    assert!(matches!(err, ServiceError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn update_status__puts_final_status() {
    // given
    let server = StubServer::start().await.unwrap();
    let client = client_for(&server);

    // when
    client
        .update_status(RecordId(7), FinalStatus::Complete)
        .await
        .unwrap();
    client
        .update_status(RecordId(8), FinalStatus::Failed)
        .await
        .unwrap();

    // then
    assert_eq!(
        server.calls(),
        vec![
            ServiceCall::Update(RecordId(7), FinalStatus::Complete),
            ServiceCall::Update(RecordId(8), FinalStatus::Failed),
        ]
    );
}

#[tokio::test]
async fn update_status__rejected_write_back_reports_status_code() {
    let server = StubServer::start().await.unwrap();
    server.respond_to_update(500, "{}");
    let client = client_for(&server);

    let err = client
        .update_status(RecordId(7), FinalStatus::Complete)
        .await
        .unwrap_err();

    assert_eq!(err, ServiceError::UnexpectedStatus(500));
}

#[tokio::test]
async fn check_status__unreachable_service_is_transport_error() {
    // given
    let url = {
        let server = StubServer::start().await.unwrap();
        Url::parse(server.base_url()).unwrap()
    };
    let client = ServiceClient::new(&url, Duration::from_secs(2)).unwrap();

    // when
    let err = client.check_status(RecordId(1)).await.unwrap_err();

    // then
    assert!(matches!(err, ServiceError::Transport(_)), "{err:?}");
}
