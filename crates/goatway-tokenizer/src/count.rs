use crate::error::Result;
use crate::registry::EncodingRegistry;
use crate::types::{ContentPart, Message, MessageContent, ToolDefinition};

/// Per-message role/content/tool-call-name/arguments overhead, as specified
/// for `gpt-3.5*`; every other model family uses 3.
fn per_message_overhead(model: &str) -> usize {
    if model.starts_with("gpt-3.5") {
        4
    } else {
        3
    }
}

const REPLY_PRIMING_OVERHEAD: usize = 3;
const TOOL_CALL_OVERHEAD: usize = 5;
const TOOL_DEFINITION_OVERHEAD: usize = 7;
const NAME_OVERHEAD: usize = 1;

const IMAGE_BASE_COST: usize = 85;
const IMAGE_TILE_COST: usize = 170;

/// `nil`/absent image costs 0; `detail=low` costs one tile; everything else
/// (`high`, `auto`, unset, or an unrecognized value) is treated as high
/// detail and costs four tiles.
fn image_tokens(image: &Option<crate::types::ImageUrl>) -> usize {
    let Some(image) = image else {
        return 0;
    };
    match image.detail.as_deref() {
        Some("low") => IMAGE_BASE_COST + IMAGE_TILE_COST,
        _ => IMAGE_BASE_COST + 4 * IMAGE_TILE_COST,
    }
}

pub async fn count_tokens(registry: &EncodingRegistry, text: &str, model: &str) -> Result<usize> {
    Ok(registry.encode(text, model).await?.len())
}

pub async fn count_message(registry: &EncodingRegistry, msg: &Message, model: &str) -> Result<usize> {
    let mut total = count_tokens(registry, &msg.role, model).await?;

    if let Some(content) = &msg.content {
        total += match content {
            MessageContent::Text(text) => count_tokens(registry, text, model).await?,
            MessageContent::Parts(parts) => {
                let mut sum = 0;
                for part in parts {
                    sum += match part {
                        ContentPart::Text { text } => count_tokens(registry, text, model).await?,
                        ContentPart::ImageUrl { image_url } => image_tokens(image_url),
                    };
                }
                sum
            }
        };
    }

    if let Some(name) = &msg.name {
        total += count_tokens(registry, name, model).await? + NAME_OVERHEAD;
    }

    if let Some(tool_call_id) = &msg.tool_call_id {
        total += count_tokens(registry, tool_call_id, model).await?;
    }

    for call in &msg.tool_calls {
        total += count_tokens(registry, &call.name, model).await?;
        total += count_tokens(registry, &call.arguments, model).await?;
        total += TOOL_CALL_OVERHEAD;
    }

    Ok(total)
}

pub async fn count_messages(registry: &EncodingRegistry, messages: &[Message], model: &str) -> Result<usize> {
    let overhead = per_message_overhead(model);
    let mut total = REPLY_PRIMING_OVERHEAD;
    for msg in messages {
        total += count_message(registry, msg, model).await? + overhead;
    }
    Ok(total)
}

pub async fn count_request(
    registry: &EncodingRegistry,
    messages: &[Message],
    tools: &[ToolDefinition],
    model: &str,
) -> Result<usize> {
    let mut total = count_messages(registry, messages, model).await?;
    for tool in tools {
        total += count_tokens(registry, &tool.name, model).await?;
        if let Some(description) = &tool.description {
            total += count_tokens(registry, description, model).await?;
        }
        let params = serde_json::to_string(&tool.parameters).unwrap_or_default();
        total += count_tokens(registry, &params, model).await?;
        total += TOOL_DEFINITION_OVERHEAD;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageUrl;

    fn registry() -> EncodingRegistry {
        EncodingRegistry::new()
    }

    #[tokio::test]
    async fn plain_text_count_matches_encoder() {
        let reg = registry();
        let n = count_tokens(&reg, "hello world", "gpt-4").await.unwrap();
        assert!(n > 0);
    }

    #[tokio::test]
    async fn per_message_overhead_differs_by_family() {
        let reg = registry();
        let messages = vec![Message {
            role: "user".into(),
            content: Some(MessageContent::Text("hi".into())),
            name: None,
            tool_call_id: None,
            tool_calls: vec![],
        }];
        let gpt35 = count_messages(&reg, &messages, "gpt-3.5-turbo").await.unwrap();
        let gpt4 = count_messages(&reg, &messages, "gpt-4").await.unwrap();
        // gpt-3.5 carries a per-message overhead of 4 vs 3 for everything else.
        assert_eq!(gpt35, gpt4 + 1);
    }

    #[test]
    fn image_cost_low_vs_high() {
        let low = image_tokens(&Some(ImageUrl {
            url: "x".into(),
            detail: Some("low".into()),
        }));
        let high = image_tokens(&Some(ImageUrl {
            url: "x".into(),
            detail: Some("high".into()),
        }));
        let unset = image_tokens(&Some(ImageUrl {
            url: "x".into(),
            detail: None,
        }));
        let unknown = image_tokens(&Some(ImageUrl {
            url: "x".into(),
            detail: Some("bogus".into()),
        }));
        assert_eq!(low, 85 + 170);
        assert_eq!(high, 85 + 4 * 170);
        assert_eq!(unset, high);
        assert_eq!(unknown, high);
        assert_eq!(image_tokens(&None), 0);
    }
}
