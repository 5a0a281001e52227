//! The bundled reqwest transport against the live mock server.

use starter_core::{ApiError, ClientConfig, HistoryCreateRequest, StarterClient};
use std::time::Duration;
use uuid::Uuid;

async fn client() -> StarterClient {
    let addr = mock_server::spawn().await.unwrap();
    let config = ClientConfig::new(format!("http://{addr}/")).with_timeout(Duration::from_secs(5));
    StarterClient::from_config(&config).unwrap()
}

#[tokio::test]
async fn create_then_total() {
    let client = client().await;

    let created = client
        .create_history("u1", &HistoryCreateRequest { value: 1.5, recorded_at: None }, "t")
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(created.value, 1.5);

    let total = client.get_histories_total().await.unwrap().into_data().unwrap();
    assert_eq!(total.total, 1);
}

#[tokio::test]
async fn missing_history_reports_server_message() {
    let client = client().await;

    let err = client
        .update_history("u1", Uuid::from_u128(0x1234), &Default::default(), "t")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::Api {
            status: Some(404),
            message: "history not found".to_string()
        }
    );
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    // Port 9 (discard) on localhost is not served by anything in the test environment.
    let config = ClientConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2));
    let client = StarterClient::from_config(&config).unwrap();

    let err = client.get_histories_total().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "unexpected error: {err:?}");
}
