use std::future::Future;
use std::time::Duration;

use itertools::Itertools;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::data::{ASSIGNMENT_FIELDS, GenerationRequest, IDENTIFYING_FIELDS, TIME_SLOTS, Weekday};
use crate::error::ProviderError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Raw text a provider produced for one generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
    pub model: String,
}

/// Anything that can turn a generation request into candidate timetables.
/// Its output is untrusted and must go through schema validation.
pub trait ScheduleProvider {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn total_len(&self) -> usize {
        self.system.len() + self.user.len()
    }
}

/// Builds the chat messages for a request: a fixed system message describing
/// the output shape, and the request sections serialized as JSON.
pub fn build_prompt(request: &GenerationRequest) -> Result<Prompt, serde_json::Error> {
    let system = format!(
        "You are an experienced university timetable coordinator. \
         Generate conflict-free weekly timetables: no teacher or room may be booked twice \
         in the same day and time slot, and weekly hours should follow course credits.\n\
         Reply with JSON only: {{\"timetables\": [...]}}. Each timetable has the string fields {}, \
         and one object per day ({}) keyed by every time slot ({}). \
         Each slot is an object with {}; use empty strings for free slots.",
        IDENTIFYING_FIELDS.iter().join(", "),
        Weekday::ALL.iter().join(", "),
        TIME_SLOTS.iter().join(", "),
        ASSIGNMENT_FIELDS.iter().join(", "),
    );

    let sections = [
        ("CLASS_REQUESTS_JSON", serde_json::to_string(&request.class_requests)?),
        ("TEACHERS_JSON", serde_json::to_string(&request.teachers)?),
        ("ROOMS_JSON", serde_json::to_string(&request.rooms)?),
        ("COURSES_JSON", serde_json::to_string(&request.courses)?),
        (
            "EXISTING_TIMETABLES_JSON",
            serde_json::to_string(&request.existing_timetables)?,
        ),
    ];
    let user = sections
        .iter()
        .map(|(name, body)| format!("{}={}", name, body))
        .join("\n");

    Ok(Prompt { system, user })
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Calls an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(config: &Config, api_key: String) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config, api_key))
    }

    pub fn with_client(client: Client, config: &Config, api_key: String) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.openai_base_url.trim_end_matches('/')
            ),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl ScheduleProvider for OpenAiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Completion, ProviderError> {
        let prompt = build_prompt(request)?;
        info!(
            "Calling {} at {} with a {} char prompt",
            self.model,
            self.endpoint,
            prompt.total_len()
        );

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ProviderError::EmptyResponse)?;
        let usage = chat.usage.unwrap_or_default();
        info!(
            "Provider answered with {} chars using {} tokens",
            text.len(),
            usage.total_tokens
        );

        Ok(Completion {
            text,
            usage,
            model: chat.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

/// Stand-in used when AI generation is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProvider;

impl ScheduleProvider for DisabledProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Completion, ProviderError> {
        info!(
            "AI generation disabled; returning no timetables for {} requested classes",
            request.class_requests.len()
        );
        Ok(Completion {
            text: "[]".to_string(),
            usage: TokenUsage::default(),
            model: "disabled".to_string(),
        })
    }
}

/// Recovers the candidate timetable list from model output.
///
/// Accepts a bare array or `{"timetables": [...]}`, optionally wrapped in a
/// markdown code fence or surrounded by prose, and retries once with
/// trailing commas removed.
pub fn parse_candidates(text: &str) -> Result<Vec<Value>, ProviderError> {
    let body = strip_code_fence(text.trim());
    let parsed = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(_) => {
            let sliced = slice_array(body).unwrap_or(body);
            match serde_json::from_str::<Value>(sliced) {
                Ok(value) => value,
                Err(_) => {
                    debug!("Retrying provider output without trailing commas");
                    serde_json::from_str(&strip_trailing_commas(sliced))?
                }
            }
        }
    };

    match parsed {
        Value::Array(candidates) => Ok(candidates),
        Value::Object(mut object) => match object.remove("timetables") {
            Some(Value::Array(candidates)) => Ok(candidates),
            _ => Err(ProviderError::NotAList),
        },
        _ => Err(ProviderError::NotAList),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the info string (```json)
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn slice_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            ',' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if matches!(next, Some('}') | Some(']')) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
    }
    out
}
