use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemeRequest {
    #[serde(default)]
    pub user_input: Option<String>,
}

impl MemeRequest {
    /// The topic exactly as sent, or `None` when missing or blank.
    pub fn topic(&self) -> Option<&str> {
        self.user_input
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}

/// Caption text in the shape produced by the configured caption mode.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Caption {
    #[serde(rename_all = "camelCase")]
    Split { top_text: String, bottom_text: String },
    Single { caption: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionResult {
    pub caption: Caption,
    pub search_query: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageCandidate {
    pub id: String,
    pub title: String,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemeResponse {
    #[serde(flatten)]
    pub caption: Caption,
    pub search_query: String,
    pub images: Vec<ImageCandidate>,
    pub user_input: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorBody {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn topic_is_kept_verbatim_and_blank_is_none() {
        let req: MemeRequest = serde_json::from_value(json!({"userInput": "  monday mornings "})).unwrap();
        assert_eq!(req.topic(), Some("  monday mornings "));

        for body in [json!({}), json!({"userInput": ""}), json!({"userInput": " \n\t"}), json!({"userInput": null})] {
            let req: MemeRequest = serde_json::from_value(body).unwrap();
            assert_eq!(req.topic(), None);
        }
    }

    #[test]
    fn split_caption_response_uses_flat_camel_case_fields() {
        let response = MemeResponse {
            caption: Caption::Split {
                top_text: "Me on Sunday night".into(),
                bottom_text: "Me on Monday morning".into(),
            },
            search_query: "tired cat".into(),
            images: vec![ImageCandidate {
                id: "abc".into(),
                title: "Tired Cat GIF".into(),
                image_url: "https://media.giphy.com/abc/giphy_s.gif".into(),
            }],
            user_input: "monday mornings".into(),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "topText": "Me on Sunday night",
                "bottomText": "Me on Monday morning",
                "searchQuery": "tired cat",
                "images": [{"id": "abc", "title": "Tired Cat GIF", "imageUrl": "https://media.giphy.com/abc/giphy_s.gif"}],
                "userInput": "monday mornings"
            })
        );
    }

    #[test]
    fn single_caption_response_has_caption_field() {
        let response = MemeResponse {
            caption: Caption::Single {
                caption: "Mondays, am I right".into(),
            },
            search_query: "office sigh".into(),
            images: vec![],
            user_input: "monday mornings".into(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["caption"], "Mondays, am I right");
        assert!(value.get("topText").is_none());
        assert_eq!(value["images"], json!([]));
    }
}
