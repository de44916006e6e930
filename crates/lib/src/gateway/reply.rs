//! Backend reply normalization.
//!
//! The backend has answered with several JSON shapes over time. Content is taken from the
//! first rule that yields non-blank text, in this order:
//!
//! 1. `response`: structured reply (`{"response": "...", "usage": {...}}`)
//! 2. `choices[0].message.content`, or `choices[0].text`: completion-style reply
//! 3. `message`: a string, or an object with `content`
//! 4. `output`: flat output field
//! 5. the JSON document itself, serialized
//!
//! A 2xx body that is not JSON at all is shown as raw text and flagged as degraded.

use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionRule {
    Response,
    Choices,
    Message,
    Output,
    RawJson,
    RawText,
}

/// Normalized content of a successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub rule: ExtractionRule,
}

impl Completion {
    /// The body was not JSON; content is the raw text.
    pub fn is_degraded(&self) -> bool {
        self.rule == ExtractionRule::RawText
    }
}

/// Known reply shapes, tagged by the rule that recognized them.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyShape<'a> {
    Structured(&'a str),
    Choice(&'a str),
    Message(&'a str),
    Output(&'a str),
    Unknown(&'a Value),
}

type Rule = for<'a> fn(&'a Value) -> Option<ReplyShape<'a>>;

const RULES: [Rule; 4] = [structured, choice, message, output];

fn text(v: Option<&Value>) -> Option<&str> {
    v?.as_str().filter(|s| !s.trim().is_empty())
}

fn structured(v: &Value) -> Option<ReplyShape<'_>> {
    text(v.get("response")).map(ReplyShape::Structured)
}

fn choice(v: &Value) -> Option<ReplyShape<'_>> {
    let first = v.get("choices")?.as_array()?.first()?;
    text(first.get("message").and_then(|m| m.get("content")))
        .or_else(|| text(first.get("text")))
        .map(ReplyShape::Choice)
}

fn message(v: &Value) -> Option<ReplyShape<'_>> {
    let m = v.get("message")?;
    text(Some(m))
        .or_else(|| text(m.get("content")))
        .map(ReplyShape::Message)
}

fn output(v: &Value) -> Option<ReplyShape<'_>> {
    text(v.get("output")).map(ReplyShape::Output)
}

/// Apply the rules in order; [`ReplyShape::Unknown`] when none match.
pub fn classify(v: &Value) -> ReplyShape<'_> {
    RULES
        .iter()
        .find_map(|rule| rule(v))
        .unwrap_or(ReplyShape::Unknown(v))
}

impl ReplyShape<'_> {
    pub fn rule(&self) -> ExtractionRule {
        match self {
            ReplyShape::Structured(_) => ExtractionRule::Response,
            ReplyShape::Choice(_) => ExtractionRule::Choices,
            ReplyShape::Message(_) => ExtractionRule::Message,
            ReplyShape::Output(_) => ExtractionRule::Output,
            ReplyShape::Unknown(_) => ExtractionRule::RawJson,
        }
    }

    pub fn content(&self) -> String {
        match self {
            ReplyShape::Structured(s)
            | ReplyShape::Choice(s)
            | ReplyShape::Message(s)
            | ReplyShape::Output(s) => s.to_string(),
            ReplyShape::Unknown(Value::String(s)) => s.clone(),
            ReplyShape::Unknown(v) => v.to_string(),
        }
    }
}

/// Normalize a 2xx body. Always returns displayable content.
pub fn normalize_body(body: &str) -> Completion {
    if body.trim().is_empty() {
        return normalize_value(&json!({}));
    }
    match serde_json::from_str::<Value>(body) {
        Ok(v) => normalize_value(&v),
        Err(e) => {
            log::warn!("gateway: reply is not JSON ({}), showing raw text", e);
            Completion {
                content: body.trim().to_string(),
                rule: ExtractionRule::RawText,
            }
        }
    }
}

pub fn normalize_value(v: &Value) -> Completion {
    let shape = classify(v);
    Completion {
        content: shape.content(),
        rule: shape.rule(),
    }
}

/// Parse an error body; non-JSON text becomes `{"error": <text>}`.
pub fn parse_error_body(body: &str) -> Value {
    serde_json::from_str::<Value>(body).unwrap_or_else(|_| json!({ "error": body.trim() }))
}

/// Human-readable message the backend supplied with an error response, if any.
pub fn error_detail(body: &str) -> Option<String> {
    let v = parse_error_body(body);
    text(v.get("message"))
        .or_else(|| text(v.get("error")))
        .or_else(|| text(v.get("error").and_then(|e| e.get("message"))))
        .map(|s| s.trim().to_string())
}
