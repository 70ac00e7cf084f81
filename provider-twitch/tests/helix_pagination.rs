//! Helix collection endpoints driven through the HTTP seam.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use mockall::{mock, Sequence};
use provider_twitch::{ClipsQuery, FollowsQuery, HelixClient, TwitchError};
use serde_json::json;
use std::sync::Arc;

mock! {
    Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

fn clip(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "url": format!("https://clips.twitch.tv/{}", id),
        "embed_url": format!("https://clips.twitch.tv/embed?clip={}", id),
        "broadcaster_id": "67955580",
        "broadcaster_name": "ChewieMelodies",
        "creator_id": "53834192",
        "creator_name": "BlackNova03",
        "video_id": "205586603",
        "game_id": "488191",
        "language": "en",
        "title": "babymetal",
        "view_count": 10,
        "created_at": "2017-11-30T22:34:18Z",
        "thumbnail_url": "https://clips-media-assets.twitch.tv/preview.jpg",
        "duration": 12.9
    })
}

fn page(data: Vec<serde_json::Value>, cursor: Option<&str>) -> HttpResponse {
    let pagination = match cursor {
        Some(cursor) => json!({ "cursor": cursor }),
        None => json!({}),
    };
    HttpResponse::new(200, json!({ "data": data, "pagination": pagination }).to_string())
}

#[tokio::test]
async fn test_clips_follow_cursor_with_same_token() {
    let mut http = MockHttp::new();
    let mut seq = Sequence::new();

    http.expect_execute()
        .withf(|request| {
            request.url == "https://api.twitch.tv/helix/clips?broadcaster_id=67955580&first=100"
                && request.headers.get("Authorization").map(String::as_str) == Some("Bearer tok")
                && request.headers.get("Client-Id").map(String::as_str) == Some("cid")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(page(vec![clip("AwkwardHelplessSalamander"), clip("BraveKindOtter")], Some("c1"))));
    http.expect_execute()
        .withf(|request| {
            request.url
                == "https://api.twitch.tv/helix/clips?broadcaster_id=67955580&first=100&after=c1"
                && request.headers.get("Authorization").map(String::as_str) == Some("Bearer tok")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(page(vec![clip("CalmQuietPanda")], None)));

    let helix = HelixClient::new(Arc::new(http), "cid");
    let clips = helix
        .clips(Some("tok"), ClipsQuery::broadcaster("67955580"))
        .await
        .unwrap();

    let ids: Vec<&str> = clips.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["AwkwardHelplessSalamander", "BraveKindOtter", "CalmQuietPanda"]);
}

#[tokio::test]
async fn test_failed_page_discards_earlier_pages() {
    let mut http = MockHttp::new();
    let mut seq = Sequence::new();

    http.expect_execute()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(page(vec![clip("AwkwardHelplessSalamander")], Some("c1"))));
    http.expect_execute()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            Ok(HttpResponse::new(
                503,
                json!({"error": "Service Unavailable", "status": 503, "message": ""}).to_string(),
            ))
        });

    let helix = HelixClient::new(Arc::new(http), "cid");
    let result = helix
        .clips(Some("tok"), ClipsQuery::broadcaster("67955580"))
        .await;

    match result {
        Err(TwitchError::Api { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "Service Unavailable");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_page_ceiling_stops_endless_cursor() {
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(2)
        .returning(|_| Ok(page(vec![], Some("again"))));

    let helix = HelixClient::new(Arc::new(http), "cid").with_max_pages(2);
    let result = helix
        .follows(Some("tok"), FollowsQuery::followers_of("141981764"))
        .await;

    assert!(matches!(
        result,
        Err(TwitchError::PageLimitExceeded { max_pages: 2 })
    ));
}

#[tokio::test]
async fn test_signed_out_fetch_sends_nothing() {
    let mut http = MockHttp::new();
    http.expect_execute().never();

    let helix = HelixClient::new(Arc::new(http), "cid");
    let result = helix.follows(None, FollowsQuery::followed_by("141981764")).await;

    assert!(matches!(result, Err(TwitchError::Unauthorized(_))));
}
