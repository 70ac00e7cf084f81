//! Current-user lookup for the Twitch projector.

use async_trait::async_trait;
use core_auth::{ProfileFetcher, ProviderKind};
use std::sync::Arc;

use crate::client::HelixClient;
use crate::types::TwitchUser;

/// Resolves a token to its owner with `GET users` (first element).
pub struct TwitchUserFetcher {
    helix: Arc<HelixClient>,
}

impl TwitchUserFetcher {
    pub fn new(helix: Arc<HelixClient>) -> Self {
        Self { helix }
    }
}

#[async_trait]
impl ProfileFetcher for TwitchUserFetcher {
    type Profile = TwitchUser;

    fn provider(&self) -> ProviderKind {
        ProviderKind::Twitch
    }

    async fn fetch_profile(&self, access_token: &str) -> core_auth::Result<TwitchUser> {
        Ok(self.helix.current_user(access_token).await?)
    }

    fn describe(profile: &TwitchUser) -> (String, String) {
        (profile.id.clone(), profile.display_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use core_auth::AuthError;
    use mockall::mock;

    mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    #[tokio::test]
    async fn test_unauthorized_token_is_flagged() {
        let mut http = MockHttp::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(
                401,
                r#"{"error":"Unauthorized","status":401,"message":"Invalid OAuth token"}"#,
            ))
        });
        let fetcher = TwitchUserFetcher::new(Arc::new(HelixClient::new(Arc::new(http), "cid")));

        let result = fetcher.fetch_profile("revoked").await;

        assert!(matches!(
            result,
            Err(AuthError::ProfileFetch {
                unauthorized: true,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_fetch_profile_returns_first_user() {
        let mut http = MockHttp::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(
                200,
                r#"{"data":[{"id":"141981764","login":"twitchdev","display_name":"TwitchDev","created_at":"2016-12-14T20:32:28Z"}]}"#,
            ))
        });
        let fetcher = TwitchUserFetcher::new(Arc::new(HelixClient::new(Arc::new(http), "cid")));

        let user = fetcher.fetch_profile("tok").await.unwrap();

        assert_eq!(
            TwitchUserFetcher::describe(&user),
            ("141981764".to_string(), "TwitchDev".to_string())
        );
    }
}
