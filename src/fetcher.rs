use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::article::Article;
use crate::error::{FeedError, FeedResult};

/// Retrieves the article feed over HTTP.
pub struct FeedClient {
    client: Client,
    url: String,
}

impl FeedClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("LatestNews/1.0")
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// GET the feed. Non-2xx responses and bodies that are not an article
    /// array are errors.
    pub async fn fetch(&self) -> FeedResult<Vec<Article>> {
        debug!("Fetching news feed: {}", self.url);

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }

        let bytes = response.bytes().await?;
        Self::decode(&bytes)
    }

    pub fn decode(bytes: &[u8]) -> FeedResult<Vec<Article>> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"[
        {
            "title": "Första",
            "excerpt": "Ett utdrag",
            "image": "assets/img/1.jpg",
            "category": "nyheter",
            "timestamp": "2024-02-01T12:00:00Z"
        },
        {
            "title": "Andra",
            "excerpt": "Ett annat utdrag",
            "image": "assets/img/2.jpg",
            "category": "sport",
            "timestamp": "2024-01-01T12:00:00Z"
        }
    ]"#;

    async fn client_for(server: &MockServer) -> FeedClient {
        FeedClient::new(
            format!("{}/nyheter.json", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn test_decode_valid_feed() {
            let articles = FeedClient::decode(FEED.as_bytes()).unwrap();
            assert_eq!(articles.len(), 2);
            assert_eq!(articles[0].title, "Första");
            assert_eq!(articles[1].category, "sport");
        }

        #[test]
        fn test_decode_empty_array() {
            let articles = FeedClient::decode(b"[]").unwrap();
            assert!(articles.is_empty());
        }

        #[test]
        fn test_decode_garbage() {
            let result = FeedClient::decode(b"<html>not json</html>");
            assert!(matches!(result, Err(FeedError::Decode(_))));
        }
    }

    mod fetch_tests {
        use super::*;

        #[tokio::test]
        async fn test_fetch_success() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/nyheter.json"))
                .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
                .mount(&server)
                .await;

            let client = client_for(&server).await;
            let articles = client.fetch().await.unwrap();

            assert_eq!(articles.len(), 2);
            assert_eq!(articles[0].timestamp, "2024-02-01T12:00:00Z");
        }

        #[tokio::test]
        async fn test_fetch_server_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/nyheter.json"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let client = client_for(&server).await;
            let result = client.fetch().await;

            match result {
                Err(FeedError::Status(status)) => assert_eq!(status.as_u16(), 500),
                other => panic!("expected status error, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_fetch_not_found() {
            let server = MockServer::start().await;

            let client = client_for(&server).await;
            let result = client.fetch().await;

            assert!(matches!(result, Err(FeedError::Status(_))));
        }

        #[tokio::test]
        async fn test_fetch_invalid_body() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/nyheter.json"))
                .respond_with(ResponseTemplate::new(200).set_body_string("{ broken"))
                .mount(&server)
                .await;

            let client = client_for(&server).await;
            let result = client.fetch().await;

            assert!(matches!(result, Err(FeedError::Decode(_))));
        }

        #[tokio::test]
        async fn test_fetch_connection_refused() {
            // Nothing listens on port 9 locally
            let client =
                FeedClient::new("http://127.0.0.1:9/nyheter.json", Duration::from_secs(2)).unwrap();
            let result = client.fetch().await;

            assert!(matches!(result, Err(FeedError::Network(_))));
        }
    }
}
