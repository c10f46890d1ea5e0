use crate::caption;
use crate::config::Config;
use crate::giphy;
use crate::models::MemeResponse;

const MAX_LOGGED_BODY: usize = 512;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum MemeError {
    #[error("caption service request failed: {0}")]
    CaptionRequest(String),
    #[error("caption service returned {status}: {body}")]
    CaptionUpstream { status: u16, body: String },
    #[error("caption payload malformed: {0}")]
    MalformedCaption(String),
    #[error("image search request failed: {0}")]
    ImageSearchRequest(String),
    #[error("image search returned {status}: {body}")]
    ImageSearchUpstream { status: u16, body: String },
    #[error("image search payload malformed: {0}")]
    ImageSearchDecode(String),
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Caption first, then image search with the derived query. Either step
/// failing fails the whole meme.
pub async fn generate_meme(
    http: &reqwest::Client,
    config: &Config,
    topic: &str,
) -> Result<MemeResponse, MemeError> {
    let captioned = caption::generate_caption(http, config, topic).await?;
    tracing::info!(
        topic,
        search_query = %captioned.search_query,
        mode = ?config.caption_mode,
        "caption generated"
    );

    let images = giphy::search_images(http, config, &captioned.search_query).await?;
    tracing::info!(topic, image_count = images.len(), "images found");

    Ok(MemeResponse {
        caption: captioned.caption,
        search_query: captioned.search_query,
        images,
        user_input: topic.to_string(),
    })
}

// ── Upstream helpers ─────────────────────────────────────────────────────────

/// The Giphy key travels in the query string, so the URL is dropped before
/// the error text reaches a log line.
pub(crate) fn describe_request_error(e: reqwest::Error) -> String {
    let kind = if e.is_timeout() {
        "TimeoutError"
    } else if e.is_connect() {
        "ConnectError"
    } else {
        "RequestError"
    };
    format!("{}: {}", kind, e.without_url())
}

/// Upstream error bodies end up in logs; keep them short.
pub(crate) fn body_snippet(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_LOGGED_BODY) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
