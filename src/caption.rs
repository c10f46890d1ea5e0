use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{endpoint, CaptionMode, Config};
use crate::meme::{body_snippet, describe_request_error, MemeError};
use crate::models::{Caption, CaptionResult};

// ── Sampling parameters ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Sampling {
    max_tokens: u32,
    temperature: f32,
}

const STRUCTURED_SAMPLING: Sampling = Sampling {
    max_tokens: 60,
    temperature: 0.8,
};

const CAPTION_SAMPLING: Sampling = Sampling {
    max_tokens: 60,
    temperature: 0.8,
};

const QUERY_SAMPLING: Sampling = Sampling {
    max_tokens: 10,
    temperature: 0.5,
};

static CODE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*(.*?)\s*```$").unwrap());

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    n: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredCaption {
    top_text: String,
    bottom_text: String,
    search_query: String,
}

// ── Public API ───────────────────────────────────────────────────────────────

pub async fn generate_caption(
    http: &reqwest::Client,
    config: &Config,
    topic: &str,
) -> Result<CaptionResult, MemeError> {
    match config.caption_mode {
        CaptionMode::Structured => {
            let reply = complete(http, config, &structured_prompt(topic), STRUCTURED_SAMPLING).await?;
            parse_structured(&reply)
        }
        CaptionMode::TwoStep => {
            let reply = complete(http, config, &caption_prompt(topic), CAPTION_SAMPLING).await?;
            let caption = clean_reply(&reply)
                .ok_or_else(|| MemeError::MalformedCaption("empty caption reply".to_string()))?;

            let reply = complete(http, config, &query_prompt(&caption), QUERY_SAMPLING).await?;
            let search_query = clean_reply(&reply)
                .ok_or_else(|| MemeError::MalformedCaption("empty search query reply".to_string()))?;

            Ok(CaptionResult {
                caption: Caption::Single { caption },
                search_query,
            })
        }
    }
}

// ── Prompts ──────────────────────────────────────────────────────────────────

fn structured_prompt(topic: &str) -> String {
    format!(
        "Create a meme caption based on the following topic: \"{topic}\".\n\
         Provide the caption split into a top and bottom text.\n\
         Generate a concise and specific search query (2-3 words) to find an appropriate image on Giphy.\n\
         Format your response exactly as JSON: {{\"topText\": \"Top caption\", \"bottomText\": \"Bottom caption\", \"searchQuery\": \"Search Query\"}}.\n\
         Do not include any extra text outside of the JSON format."
    )
}

fn caption_prompt(topic: &str) -> String {
    format!(
        "Create a short, funny meme caption about the following topic: \"{topic}\".\n\
         Reply with the caption only."
    )
}

fn query_prompt(caption: &str) -> String {
    format!(
        "Given this meme caption: \"{caption}\"\n\
         Generate a concise and specific search query (2-3 words) to find a matching GIF on Giphy.\n\
         Reply with the search query only."
    )
}

// ── Chat completion call ─────────────────────────────────────────────────────

async fn complete(
    http: &reqwest::Client,
    config: &Config,
    prompt: &str,
    sampling: Sampling,
) -> Result<String, MemeError> {
    let body = ChatCompletionRequest {
        model: &config.openai_model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        max_tokens: sampling.max_tokens,
        temperature: sampling.temperature,
        n: 1,
    };

    tracing::debug!(
        model = %config.openai_model,
        max_tokens = sampling.max_tokens,
        prompt_len = prompt.len(),
        "requesting chat completion"
    );

    let response = http
        .post(endpoint(&config.openai_api_base, "chat/completions"))
        .bearer_auth(&config.openai_api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| MemeError::CaptionRequest(describe_request_error(e)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| MemeError::CaptionRequest(describe_request_error(e)))?;

    if !status.is_success() {
        return Err(MemeError::CaptionUpstream {
            status: status.as_u16(),
            body: body_snippet(&text),
        });
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(&text)
        .map_err(|e| MemeError::MalformedCaption(format!("completion envelope: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| MemeError::MalformedCaption("completion has no message content".to_string()))
}

// ── Reply parsing ────────────────────────────────────────────────────────────

/// Parses the structured reply. Field values are kept exactly as the model
/// wrote them; only the search query has to be non-blank.
fn parse_structured(reply: &str) -> Result<CaptionResult, MemeError> {
    let trimmed = reply.trim();
    let json = CODE_FENCE_RE
        .captures(trimmed)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    let parsed: StructuredCaption = serde_json::from_str(json)
        .map_err(|e| MemeError::MalformedCaption(format!("{} in reply {:?}", e, body_snippet(reply))))?;

    if parsed.search_query.trim().is_empty() {
        return Err(MemeError::MalformedCaption("searchQuery is empty".to_string()));
    }

    Ok(CaptionResult {
        caption: Caption::Split {
            top_text: parsed.top_text,
            bottom_text: parsed.bottom_text,
        },
        search_query: parsed.search_query,
    })
}

/// Free-text replies often come wrapped in quotes. Only one pair that
/// encloses the whole reply is removed; quotes inside the text are kept.
fn clean_reply(reply: &str) -> Option<String> {
    let trimmed = reply.trim();
    let cleaned = [('"', '"'), ('\'', '\''), ('“', '”')]
        .iter()
        .find_map(|&(open, close)| trimmed.strip_prefix(open)?.strip_suffix(close))
        .unwrap_or(trimmed)
        .trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
