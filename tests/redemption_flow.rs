#![allow(non_snake_case)]
use reqwest::Url;
use std::time::Duration;
use waste_kiosk::{
    config::PollConfig,
    redemption::{
        FinalStatus,
        Prize,
        RecordId,
        RedemptionRequest,
        WasteCategory,
    },
    service_client::ServiceClient,
    session::{
        KioskSession,
        Screen,
        SessionUpdate,
    },
    test_helpers::{
        ServiceCall,
        StubServer,
    },
    workflow::{
        Resolution,
        SUCCESS_MESSAGE,
        TIMEOUT_MESSAGE,
    },
};

const WAIT_LIMIT: Duration = Duration::from_secs(10);

fn session_for(server: &StubServer, poll: PollConfig) -> KioskSession<ServiceClient> {
    let url = Url::parse(server.base_url()).unwrap();
    let client = ServiceClient::new(&url, Duration::from_secs(2)).unwrap();
    KioskSession::new(client, poll)
}

fn fast_poll() -> PollConfig {
    PollConfig::new(Duration::from_secs(2), Duration::from_millis(100))
}

async fn wait_for_resolution(session: &mut KioskSession<ServiceClient>) -> Resolution {
    tokio::time::timeout(WAIT_LIMIT, async {
        loop {
            if let SessionUpdate::Resolved(resolution) = session.next_update().await {
                return resolution;
            }
        }
    })
    .await
    .expect("run did not resolve in time")
}

async fn wait_for_record(session: &mut KioskSession<ServiceClient>) -> RecordId {
    tokio::time::timeout(WAIT_LIMIT, async {
        loop {
            if let SessionUpdate::Created(id) = session.next_update().await {
                return id;
            }
        }
    })
    .await
    .expect("record was not created in time")
}

#[tokio::test]
async fn redemption__verified_sensor_completes_record() {
    // given
    let server = StubServer::start().await.unwrap();
    server.respond_to_create(200, r#"{"id": 42}"#);
    server.push_sensor_response(200, r#"{"SensorResponse": null}"#);
    server.push_sensor_response(200, r#"{"SensorResponse": "verified"}"#);
    let mut session = session_for(&server, fast_poll());

    // when
    session.choose_category(WasteCategory::PlasticBottles);
    session.submit_selection(Prize::EmergencyKit).unwrap();
    let resolution = wait_for_resolution(&mut session).await;

    // then
    assert_eq!(resolution, Resolution::Redeemed);
    let view = session.view();
    assert!(!view.loading);
    assert!(view.modal_visible);
    assert!(view.celebrate);
    assert_eq!(view.modal_message, SUCCESS_MESSAGE);
    assert_eq!(
        server.calls(),
        vec![
            ServiceCall::Create(RedemptionRequest::new(
                WasteCategory::PlasticBottles,
                Prize::EmergencyKit
            )),
            ServiceCall::Check(RecordId(42)),
            ServiceCall::Check(RecordId(42)),
            ServiceCall::Update(RecordId(42), FinalStatus::Complete),
        ]
    );
}

#[tokio::test]
async fn redemption__silent_sensor_times_out_and_fails_record() {
    // given
    let server = StubServer::start().await.unwrap();
    server.respond_to_create(200, r#"{"id": 9}"#);
    let poll = PollConfig::new(Duration::from_millis(600), Duration::from_millis(200));
    let mut session = session_for(&server, poll);

    // when
    session.choose_category(WasteCategory::Paper);
    session.submit_selection(Prize::PaperPad).unwrap();
    let resolution = wait_for_resolution(&mut session).await;

    // then
    assert_eq!(resolution, Resolution::TimedOut);
    assert_eq!(session.view().modal_message, TIMEOUT_MESSAGE);
    assert!(!session.view().celebrate);
    let calls = server.calls();
    let checks = calls
        .iter()
        .filter(|c| matches!(c, ServiceCall::Check(_)))
        .count();
    assert!(checks >= 1 && checks as u64 <= poll.max_queries(), "{checks} checks");
    assert_eq!(
        calls.last(),
        Some(&ServiceCall::Update(RecordId(9), FinalStatus::Failed))
    );
}

#[tokio::test]
async fn redemption__rejected_submission_shows_service_message() {
    // given
    let server = StubServer::start().await.unwrap();
    server.respond_to_create(400, r#"{"error": "Out of stock"}"#);
    let mut session = session_for(&server, fast_poll());

    // when
    session.choose_category(WasteCategory::Paper);
    session.submit_selection(Prize::EmergencyKit).unwrap();
    let resolution = wait_for_resolution(&mut session).await;

    // then
    assert_eq!(
        resolution,
        Resolution::SubmissionRejected("Out of stock".to_string())
    );
    assert_eq!(session.view().modal_message, "Error: Out of stock");
    assert_eq!(server.calls().len(), 1);
}

#[tokio::test]
async fn redemption__user_cancel_fails_record_and_returns_home() {
    // given
    let server = StubServer::start().await.unwrap();
    server.respond_to_create(200, r#"{"id": 15}"#);
    let mut session = session_for(&server, fast_poll());
    session.choose_category(WasteCategory::PlasticBottles);
    session.submit_selection(Prize::PaperPad).unwrap();
    let id = wait_for_record(&mut session).await;

    // when
    assert!(session.cancel().await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let checks_after_cancel = server
        .calls()
        .iter()
        .filter(|c| matches!(c, ServiceCall::Check(_)))
        .count();
    tokio::time::sleep(Duration::from_millis(400)).await;

    // then
    assert_eq!(id, RecordId(15));
    assert_eq!(session.screen(), Screen::CategorySelection);
    assert!(!session.view().loading);
    assert!(!session.view().modal_visible);
    let calls = server.calls();
    assert!(calls.contains(&ServiceCall::Update(RecordId(15), FinalStatus::Failed)));
    assert!(!calls.contains(&ServiceCall::Update(RecordId(15), FinalStatus::Complete)));
    let checks_now = calls
        .iter()
        .filter(|c| matches!(c, ServiceCall::Check(_)))
        .count();
    assert_eq!(checks_now, checks_after_cancel);
}
