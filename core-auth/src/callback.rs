//! Parsing of authorization redirects.

/// Parameters a provider appends to the redirect URI.
///
/// Twitch returns them in the fragment, Spotify in the query string; both
/// also report refusals as `error` / `error_description`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub access_token: Option<String>,
    pub code: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse a full redirect URL, a bare fragment/query (`#a=b`, `?a=b`) or a
    /// raw `a=b&c=d` string.
    ///
    /// With hash routing a URL can hold both a query and a fragment; the last
    /// segment that carries parameters wins.
    ///
    /// ```
    /// use core_auth::CallbackParams;
    ///
    /// let params = CallbackParams::parse("#access_token=tok&state=s1&token_type=bearer");
    /// assert_eq!(params.access_token.as_deref(), Some("tok"));
    /// assert_eq!(params.state.as_deref(), Some("s1"));
    /// ```
    pub fn parse(input: &str) -> Self {
        let segment = input
            .split(['#', '?'])
            .filter(|segment| segment.contains('='))
            .last()
            .unwrap_or_default();

        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(segment.as_bytes()) {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "state" => params.state = value,
                "access_token" => params.access_token = value,
                "code" => params.code = value,
                "expires_in" => params.expires_in = value.and_then(|v| v.parse().ok()),
                "scope" => params.scope = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        params
    }

    /// Human-readable refusal reason, if the provider sent one.
    pub fn error_message(&self) -> Option<String> {
        match (&self.error, &self.error_description) {
            (Some(error), Some(description)) => Some(format!("{}: {}", error, description)),
            (Some(error), None) => Some(error.clone()),
            (None, Some(description)) => Some(description.clone()),
            (None, None) => None,
        }
    }
}

/// Query parameters of an authorization-code redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeCallback {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
}

impl CodeCallback {
    pub fn new(state: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            code: Some(code.into()),
            error: None,
        }
    }
}

impl From<CallbackParams> for CodeCallback {
    fn from(params: CallbackParams) -> Self {
        let error = params.error_message();
        Self {
            state: params.state,
            code: params.code,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_twitch_fragment() {
        let params = CallbackParams::parse(
            "http://localhost:8080/#access_token=73d0f8mkabpbmjp921asv2jaidwxn&scope=chat%3Aread+chat%3Aedit&state=c3ab8aa609ea11e793ae92361f002671&token_type=bearer",
        );

        assert_eq!(params.access_token.as_deref(), Some("73d0f8mkabpbmjp921asv2jaidwxn"));
        assert_eq!(params.state.as_deref(), Some("c3ab8aa609ea11e793ae92361f002671"));
        assert_eq!(params.scope.as_deref(), Some("chat:read chat:edit"));
        assert!(params.code.is_none());
    }

    #[test]
    fn test_parse_spotify_query_with_hash_route() {
        let params = CallbackParams::parse(
            "http://localhost:8080/?code=NApCCgBkWtQ&state=34fFs29kd09#/oauth/spotify",
        );

        assert_eq!(params.code.as_deref(), Some("NApCCgBkWtQ"));
        assert_eq!(params.state.as_deref(), Some("34fFs29kd09"));
    }

    #[test]
    fn test_parse_raw_pairs_and_expiry() {
        let params = CallbackParams::parse("access_token=tok&expires_in=3600&state=s");
        assert_eq!(params.expires_in, Some(3600));

        let params = CallbackParams::parse("access_token=tok&expires_in=soon");
        assert_eq!(params.expires_in, None);
    }

    #[test]
    fn test_parse_error_redirect() {
        let params = CallbackParams::parse(
            "?error=access_denied&error_description=The+user+denied+you+access&state=s1",
        );

        assert!(params.access_token.is_none());
        assert_eq!(
            params.error_message().as_deref(),
            Some("access_denied: The user denied you access")
        );

        let callback = CodeCallback::from(params);
        assert_eq!(callback.state.as_deref(), Some("s1"));
        assert!(callback.code.is_none());
        assert!(callback.error.is_some());
    }

    #[test]
    fn test_empty_values_are_absent() {
        let params = CallbackParams::parse("#access_token=&state=");
        assert!(params.access_token.is_none());
        assert!(params.state.is_none());
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(CallbackParams::parse(""), CallbackParams::default());
        assert_eq!(CallbackParams::parse("#/oauth/twitch"), CallbackParams::default());
    }
}
