use serde::Deserialize;

use crate::config::{endpoint, Config};
use crate::meme::{body_snippet, describe_request_error, MemeError};
use crate::models::ImageCandidate;

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<Gif>,
}

#[derive(Debug, Deserialize)]
struct Gif {
    id: String,
    #[serde(default)]
    title: String,
    images: GifImages,
}

#[derive(Debug, Deserialize)]
struct GifImages {
    downsized_still: Rendition,
}

#[derive(Debug, Deserialize)]
struct Rendition {
    url: String,
}

impl From<Gif> for ImageCandidate {
    fn from(gif: Gif) -> Self {
        ImageCandidate {
            id: gif.id,
            title: gif.title,
            image_url: gif.images.downsized_still.url,
        }
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Runs one GIF search and keeps id, title and the downsized still URL of
/// every result, in upstream order.
pub async fn search_images(
    http: &reqwest::Client,
    config: &Config,
    query: &str,
) -> Result<Vec<ImageCandidate>, MemeError> {
    let limit = config.giphy_limit.to_string();

    tracing::debug!(query, limit = config.giphy_limit, rating = %config.giphy_rating, "searching giphy");

    let response = http
        .get(endpoint(&config.giphy_api_base, "gifs/search"))
        .query(&[
            ("api_key", config.giphy_api_key.as_str()),
            ("q", query),
            ("limit", limit.as_str()),
            ("rating", config.giphy_rating.as_str()),
        ])
        .send()
        .await
        .map_err(|e| MemeError::ImageSearchRequest(describe_request_error(e)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| MemeError::ImageSearchRequest(describe_request_error(e)))?;

    if !status.is_success() {
        return Err(MemeError::ImageSearchUpstream {
            status: status.as_u16(),
            body: body_snippet(&text),
        });
    }

    parse_search(&text)
}

fn parse_search(payload: &str) -> Result<Vec<ImageCandidate>, MemeError> {
    let parsed: SearchResponse =
        serde_json::from_str(payload).map_err(|e| MemeError::ImageSearchDecode(e.to_string()))?;
    Ok(parsed.data.into_iter().map(ImageCandidate::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptionMode;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gif(id: &str) -> serde_json::Value {
        json!({
            "type": "gif",
            "id": id,
            "title": format!("{} GIF", id),
            "url": format!("https://giphy.com/gifs/{}", id),
            "images": {
                "original": {"url": format!("https://media.giphy.com/media/{}/giphy.gif", id)},
                "downsized_still": {"url": format!("https://media.giphy.com/media/{}/giphy-downsized_s.gif", id), "width": "250"}
            }
        })
    }

    #[test]
    fn projection_keeps_only_three_fields_in_order() {
        let payload = json!({"data": [gif("a1"), gif("b2"), gif("c3")], "pagination": {"count": 3}});
        let images = parse_search(&payload.to_string()).unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(
            images[1],
            ImageCandidate {
                id: "b2".into(),
                title: "b2 GIF".into(),
                image_url: "https://media.giphy.com/media/b2/giphy-downsized_s.gif".into(),
            }
        );
        assert_eq!(
            serde_json::to_value(&images[0]).unwrap().as_object().unwrap().len(),
            3
        );
    }

    #[test]
    fn empty_result_set_is_not_an_error() {
        let images = parse_search(r#"{"data": []}"#).unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn missing_still_rendition_is_a_decode_error() {
        let payload = json!({"data": [{"id": "x", "title": "x", "images": {}}]});
        let err = parse_search(&payload.to_string()).unwrap_err();
        assert!(matches!(err, MemeError::ImageSearchDecode(_)));
    }

    #[tokio::test]
    async fn search_sends_fixed_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/gifs/search"))
            .and(query_param("api_key", "gk-test"))
            .and(query_param("q", "sleepy cat"))
            .and(query_param("limit", "10"))
            .and(query_param("rating", "pg-13"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [gif("z9")]})))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config::for_tests("http://127.0.0.1:9", &server.uri(), CaptionMode::Structured);
        let images = search_images(&reqwest::Client::new(), &config, "sleepy cat").await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, "z9");
    }

    #[tokio::test]
    async fn non_success_status_is_an_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Invalid authentication credentials"})))
            .mount(&server)
            .await;

        let config = Config::for_tests("http://127.0.0.1:9", &server.uri(), CaptionMode::Structured);
        match search_images(&reqwest::Client::new(), &config, "cat").await {
            Err(MemeError::ImageSearchUpstream { status, .. }) => assert_eq!(status, 403),
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_request_does_not_expose_api_key() {
        let config = Config::for_tests("http://127.0.0.1:9", "http://127.0.0.1:9", CaptionMode::Structured);
        let err = search_images(&reqwest::Client::new(), &config, "cat").await.unwrap_err();
        assert!(matches!(err, MemeError::ImageSearchRequest(_)));
        let message = err.to_string();
        assert!(!message.contains("gk-test"), "{}", message);
        assert!(!message.contains("api_key"), "{}", message);
    }
}
