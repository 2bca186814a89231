use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use tera::{Context as TeraContext, Tera};
use tracing::debug;

use crate::providers::{Provider, ToolSpec};

pub const TOOL_NAME: &str = "deliver_english_text";

const PROMPT_TEMPLATE: &str = include_str!("prompts/pure_english.tera");
const OCR_FIXES: &[(&str, &str)] = &[("cnough", "enough"), ("bady", "body"), ("rn", "m")];

pub type CleanupFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Turns raw OCR text into English prose. An empty string means nothing usable.
pub trait TextCleanup: Send + Sync {
    fn clean<'a>(&'a self, raw: &'a str) -> CleanupFuture<'a>;
}

impl<T: TextCleanup + ?Sized> TextCleanup for &T {
    fn clean<'a>(&'a self, raw: &'a str) -> CleanupFuture<'a> {
        (**self).clean(raw)
    }
}

/// Hands the raw text straight to the local post-filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl TextCleanup for Passthrough {
    fn clean<'a>(&'a self, raw: &'a str) -> CleanupFuture<'a> {
        Box::pin(async move { Ok(raw.to_string()) })
    }
}

/// Cleanup backed by a chat model answering through [`TOOL_NAME`].
#[derive(Debug, Clone)]
pub struct LlmCleanup<P: Provider> {
    provider: P,
    system_prompt: String,
}

impl<P: Provider> LlmCleanup<P> {
    pub fn new(provider: P) -> Result<Self> {
        Ok(Self {
            provider,
            system_prompt: render_system_prompt()?,
        })
    }
}

impl<P: Provider> TextCleanup for LlmCleanup<P> {
    fn clean<'a>(&'a self, raw: &'a str) -> CleanupFuture<'a> {
        Box::pin(async move {
            let response = self
                .provider
                .clone()
                .append_system_input(self.system_prompt.clone())
                .append_user_input(raw.to_string())
                .register_tool(tool_spec())
                .call_tool(TOOL_NAME)
                .await?;
            debug!(model = ?response.model, usage = ?response.usage, "cleanup call finished");
            parse_tool_args(response.args)
        })
    }
}

pub fn render_system_prompt() -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("tool_name", TOOL_NAME);
    context.insert("fixes", OCR_FIXES);
    Tera::one_off(PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render cleanup prompt")
}

fn tool_spec() -> ToolSpec {
    ToolSpec {
        name: TOOL_NAME.to_string(),
        description: "Return the pure English prose extracted from the OCR text.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "english_text": {
                    "type": "string",
                    "description": "English passages only, paragraphs separated by a blank line. Empty when there is no English prose."
                }
            },
            "required": ["english_text"]
        }),
    }
}

#[derive(Debug, Deserialize)]
struct ToolArgs {
    #[serde(default)]
    english_text: Option<String>,
}

fn parse_tool_args(value: serde_json::Value) -> Result<String> {
    let args: ToolArgs =
        serde_json::from_value(value).with_context(|| "invalid cleanup tool arguments")?;
    Ok(args.english_text.unwrap_or_default().trim().to_string())
}
