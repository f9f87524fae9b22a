use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use thiserror::Error;

use super::listing::parse_listing;
use super::models::{ApiConfig, Claim, GameHashes};
use crate::domain::ListingEntry;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// HTTP access to the achievement feeds and the ROM mirrors.
#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), name)
    }

    /// Every recent claim; a single response is the complete candidate set.
    pub async fn get_recent_claims(&self) -> Result<Vec<Claim>> {
        let response = self
            .http
            .get(self.endpoint("API_GetClaims.php"))
            .query(&[("k", "1"), ("y", self.config.api_key.as_str())])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("Claims request failed: {}", e)))?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    pub async fn get_game_hashes(&self, game_id: u64) -> Result<GameHashes> {
        let response = self
            .http
            .get(self.endpoint("API_GetGameHashes.php"))
            .query(&[
                ("i", game_id.to_string()),
                ("y", self.config.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| {
                ApiError::ApiError(format!("Hash request for game {} failed: {}", game_id, e))
            })?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    /// Fetch one mirror's directory listing, bounded by the listing timeout.
    pub async fn fetch_listing_html(&self, mirror_url: &str) -> Result<String> {
        let response = self
            .http
            .get(mirror_url)
            .timeout(self.config.listing_timeout)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("Listing request failed: {}", e)))?;

        Ok(response.text().await?)
    }

    pub async fn fetch_listing(&self, mirror_url: &str) -> Result<Vec<ListingEntry>> {
        let html = self.fetch_listing_html(mirror_url).await?;
        Ok(parse_listing(&html, mirror_url))
    }

    /// Start a download and hand back its declared length and body stream.
    pub async fn download_file_stream(
        &self,
        download_url: &str,
    ) -> Result<(Option<u64>, BoxStream<'static, Result<bytes::Bytes>>)> {
        let url = url::Url::parse(download_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{download_url}: {e}")))?;
        let response = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("Download request failed: {}", e)))?;

        let total_size = response.content_length();
        let stream = response.bytes_stream().map_err(ApiError::RequestError).boxed();

        Ok((total_size, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> ApiClient {
        ApiClient::new(ApiConfig {
            api_key: "secret".to_string(),
            base_url: server.url(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_recent_claims() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/API_GetClaims.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("k".into(), "1".into()),
                Matcher::UrlEncoded("y".into(), "secret".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"[{"GameID": 1, "ConsoleName": "Game Boy", "DoneTime": "2024-01-01"}]"#)
            .create_async()
            .await;

        let claims = client_for(&server).get_recent_claims().await.unwrap();
        mock.assert_async().await;
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].console_name, "Game Boy");
    }

    #[tokio::test]
    async fn test_claims_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/API_GetClaims.php")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let err = client_for(&server).get_recent_claims().await.unwrap_err();
        assert!(matches!(err, ApiError::ApiError(_)));
    }

    #[tokio::test]
    async fn test_get_game_hashes_bad_json() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/API_GetGameHashes.php")
            .match_query(Matcher::UrlEncoded("i".into(), "99".into()))
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let err = client_for(&server).get_game_hashes(99).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_download_rejects_relative_url() {
        let server = mockito::Server::new_async().await;
        let err = client_for(&server)
            .download_file_stream("files/Game.zip")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_download_file_stream_reports_length() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files/Game.zip")
            .with_body(vec![7u8; 1000])
            .create_async()
            .await;

        let url = format!("{}/files/Game.zip", server.url());
        let (total, stream) = client_for(&server).download_file_stream(&url).await.unwrap();
        let chunks: Vec<_> = stream.collect().await;
        let received: usize = chunks.into_iter().map(|c| c.unwrap().len()).sum();

        assert_eq!(total, Some(1000));
        assert_eq!(received, 1000);
    }
}
