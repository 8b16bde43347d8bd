//! HTTP-level tests for the subtitle server client.
//!
//! A mock server stands in for the real one, so request shapes and error
//! mapping are checked without a network.

use serde_json::json;
use sublink_core::api::{ApiClient, ApiError, ContentId, ProgressUpdate};
use sublink_core::config::ApiConfig;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&ApiConfig {
        base_url: server.uri(),
        ..ApiConfig::default()
    })
    .unwrap()
}

fn progress_json(index: u64) -> serde_json::Value {
    json!({
        "progress": {
            "id": 1,
            "user_id": 7,
            "sub_link_id": 42,
            "current_alignment_index": index,
            "total_alignments_completed": index,
            "total_alignments": 100,
            "completion_percentage": index as f64,
            "session_duration_minutes": 12,
            "last_accessed": "2024-01-01T10:00:00"
        }
    })
}

// =============================================================================
// Health
// =============================================================================

mod health {
    use super::*;

    #[tokio::test]
    async fn test_healthy_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server).health().await.is_ok());
    }

    #[tokio::test]
    async fn test_unhealthy_server_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down for maintenance"))
            .mount(&server)
            .await;

        match client(&server).health().await {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "down for maintenance");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        let client = ApiClient::new(&ApiConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..ApiConfig::default()
        })
        .unwrap();

        let err = client.health().await.unwrap_err();
        assert!(err.is_unreachable(), "got {:?}", err);
    }
}

// =============================================================================
// Alignments
// =============================================================================

mod alignments {
    use super::*;

    #[tokio::test]
    async fn test_fetch_sends_window_and_parses_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/subtitles/42"))
            .and(query_param("start_index", "48"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alignments": [
                    {
                        "index": 48,
                        "source_lines": [{"id": 1, "content": "Hello"}],
                        "target_lines": [{"id": "t-1", "content": "Hola"}],
                        "confidence": 0.9
                    },
                    {"index": 49, "source_lines": [], "target_lines": []}
                ],
                "pagination": {"start_index": 48, "limit": 50, "total_alignments": 100}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server)
            .fetch_alignments(&ContentId::from(42), 48, 50)
            .await
            .unwrap();

        assert_eq!(page.pagination.total_alignments, 100);
        assert_eq!(page.alignments.len(), 2);
        assert_eq!(page.alignments[0].source_text(), "Hello");
        assert_eq!(page.alignments[0].target_text(), "Hola");
        assert!(page.alignments[1].source_lines.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_page_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/subtitles/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_alignments(&ContentId::from(42), 0, 50)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_not_found_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/subtitles/9"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Sub link not found"})))
            .mount(&server)
            .await;

        match client(&server).fetch_alignments(&ContentId::from(9), 0, 50).await {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("Sub link not found"));
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }
}

// =============================================================================
// Progress
// =============================================================================

mod progress {
    use super::*;

    #[tokio::test]
    async fn test_missing_record_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/progress/42"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "No progress"})))
            .mount(&server)
            .await;

        assert_eq!(client(&server).get_progress(&ContentId::from(42)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/progress/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(progress_json(25)))
            .mount(&server)
            .await;

        let record = client(&server)
            .get_progress(&ContentId::from(42))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.content_id, Some(ContentId::from(42)));
        assert_eq!(record.current_index, 25);
        assert_eq!(record.total_count, 100);
        assert_eq!(record.session_duration, 12);
        assert_eq!(record.completion_percentage(), 25.0);
    }

    #[tokio::test]
    async fn test_put_sends_wire_body_only() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/progress/42"))
            .and(body_json(json!({
                "current_alignment_index": 12,
                "session_duration_minutes": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(progress_json(12)))
            .expect(1)
            .mount(&server)
            .await;

        let update = ProgressUpdate {
            current_alignment_index: 12,
            session_duration_minutes: 3,
            sequence: 99,
        };
        let record = client(&server)
            .put_progress(&ContentId::from(42), &update)
            .await
            .unwrap();
        assert_eq!(record.current_index, 12);
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/progress/42"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(progress_json(1)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).with_token("secret");
        assert!(client.get_progress(&ContentId::from(42)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejected_token_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/progress/42"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let update = ProgressUpdate {
            current_alignment_index: 1,
            session_duration_minutes: 0,
            sequence: 0,
        };
        let err = client(&server)
            .put_progress(&ContentId::from(42), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_recent_limit_is_clamped() {
        let server = MockServer::start().await;
        for (limit, calls) in [("1", 1), ("10", 2), ("50", 1)] {
            Mock::given(method("GET"))
                .and(path("/api/progress/recent"))
                .and(query_param("limit", limit))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "recent_progress": [progress_json(5)["progress"].clone()],
                    "count": 1
                })))
                .expect(calls)
                .mount(&server)
                .await;
        }

        let client = client(&server);
        assert_eq!(client.recent_progress(Some(1)).await.unwrap().len(), 1);
        // Zero falls back to the default, like the server does
        assert_eq!(client.recent_progress(Some(0)).await.unwrap().len(), 1);
        assert_eq!(client.recent_progress(None).await.unwrap().len(), 1);
        assert_eq!(client.recent_progress(Some(500)).await.unwrap().len(), 1);
    }
}
