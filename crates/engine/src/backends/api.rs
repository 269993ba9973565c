// ABOUTME: JSON-over-HTTP plumbing shared by the remote crawl, reader and graph backends.
// ABOUTME: Maps every transport, status and decoding problem to BackendUnavailable; never retries.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::credentials::BackendCredential;
use crate::error::ExtractError;
use crate::request::BackendKind;

/// Longest slice of an error response body kept in the error message.
const ERROR_BODY_SNIPPET: usize = 200;

/// Fail with `MissingCredential` unless `credential` can be used for `backend`.
pub(crate) fn ensure_credential<'a>(
    credential: Option<&'a BackendCredential>,
    backend: BackendKind,
    op: &str,
) -> Result<&'a BackendCredential, ExtractError> {
    match credential {
        Some(cred) if cred.is_usable_for(backend) => Ok(cred),
        Some(cred) if cred.backend() != backend => Err(ExtractError::missing_credential(
            backend.as_str(),
            op,
            Some(anyhow::anyhow!(
                "credential was issued for the {} backend",
                cred.backend()
            )),
        )),
        _ => Err(ExtractError::missing_credential(
            backend.as_str(),
            op,
            Some(anyhow::anyhow!("{} API key is required", backend)),
        )),
    }
}

/// One remote provider reachable under `base_url`.
#[derive(Debug, Clone)]
pub(crate) struct RemoteService {
    http: reqwest::Client,
    base_url: String,
    backend: BackendKind,
}

impl RemoteService {
    pub(crate) fn new(http: reqwest::Client, base_url: &str, backend: BackendKind) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            backend,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) async fn get_json<R: DeserializeOwned>(
        &self,
        credential: &BackendCredential,
        path: &str,
        query: &[(&str, &str)],
        op: &str,
    ) -> Result<R, ExtractError> {
        let credential = ensure_credential(Some(credential), self.backend, op)?;
        let endpoint = self.endpoint(path);
        tracing::debug!(backend = %self.backend, endpoint = %endpoint, op, "remote GET");

        let request = self
            .http
            .get(&endpoint)
            .query(query)
            .header(reqwest::header::AUTHORIZATION, credential.bearer())
            .header(reqwest::header::ACCEPT, "application/json");

        self.send(request, &endpoint, op).await
    }

    pub(crate) async fn post_json<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        credential: &BackendCredential,
        path: &str,
        body: &T,
        op: &str,
    ) -> Result<R, ExtractError> {
        let credential = ensure_credential(Some(credential), self.backend, op)?;
        let endpoint = self.endpoint(path);
        tracing::debug!(backend = %self.backend, endpoint = %endpoint, op, "remote POST");

        let request = self
            .http
            .post(&endpoint)
            .header(reqwest::header::AUTHORIZATION, credential.bearer())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body);

        self.send(request, &endpoint, op).await
    }

    async fn send<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
        op: &str,
    ) -> Result<R, ExtractError> {
        let response = request.send().await.map_err(|e| {
            ExtractError::backend_unavailable(
                endpoint,
                op,
                Some(anyhow::anyhow!("{} request failed: {}", self.backend, e)),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(ERROR_BODY_SNIPPET).collect();
            return Err(ExtractError::backend_unavailable(
                endpoint,
                op,
                Some(anyhow::anyhow!(
                    "{} API error: {} - {}",
                    self.backend,
                    status.as_u16(),
                    snippet
                )),
            ));
        }

        response.json::<R>().await.map_err(|e| {
            ExtractError::backend_unavailable(
                endpoint,
                op,
                Some(anyhow::anyhow!("unexpected {} response: {}", self.backend, e)),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::{json, Value};

    #[test]
    fn missing_or_foreign_credentials_are_rejected() {
        let err = ensure_credential(None, BackendKind::Reader, "ReadUrl").unwrap_err();
        assert!(err.is_missing_credential());

        let foreign = BackendCredential::new(BackendKind::Crawl, "fc-key");
        let err = ensure_credential(Some(&foreign), BackendKind::Reader, "ReadUrl").unwrap_err();
        assert!(err.is_missing_credential());
        assert!(err.message().contains("crawl"));

        let blank = BackendCredential::new(BackendKind::Reader, "");
        assert!(ensure_credential(Some(&blank), BackendKind::Reader, "ReadUrl").is_err());
    }

    #[tokio::test]
    async fn error_status_becomes_backend_unavailable() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/read")
                    .header("authorization", "Bearer key");
                then.status(503).body("upstream overloaded");
            })
            .await;

        let service = RemoteService::new(
            reqwest::Client::new(),
            &server.base_url(),
            BackendKind::Reader,
        );
        let cred = BackendCredential::new(BackendKind::Reader, "key");
        let err = service
            .get_json::<Value>(&cred, "/read", &[("url", "https://example.com")], "ReadUrl")
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(err.is_backend_unavailable());
        assert!(err.message().contains("503"));
        assert!(err.message().contains("upstream overloaded"));
    }

    #[tokio::test]
    async fn non_json_body_becomes_backend_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/summarize");
                then.status(200).body("<html>oops</html>");
            })
            .await;

        let service = RemoteService::new(
            reqwest::Client::new(),
            &format!("{}/", server.base_url()),
            BackendKind::Reader,
        );
        let cred = BackendCredential::new(BackendKind::Reader, "key");
        let err = service
            .post_json::<_, Value>(&cred, "summarize", &json!({"text": "t"}), "Summarize")
            .await
            .unwrap_err();
        assert!(err.is_backend_unavailable());
    }
}
