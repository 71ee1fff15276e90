//! Step definitions: request templates, expectations and value extraction.
//!
//! A step runs in four phases against one [`Context`]:
//! build the request from the template, send it, validate the response
//! status, then extract values from the body into the context. A failure in
//! any phase ends that step and is reported in its [`StepOutcome`].

use crate::context::Context;
use crate::error::{ContextError, StepError};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, Transport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use tracing::debug;

/// One piece of a parsed template string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(String),
    Key(&'a str),
}

/// Split a template into literals and `{key}` placeholders.
/// `{{` and `}}` are literal braces.
fn parse_template(template: &str) -> Result<Vec<Segment<'_>>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                literal.push('{');
                i += 2;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                literal.push('}');
                i += 2;
            }
            b'{' => {
                let rest = &template[i + 1..];
                let end = rest
                    .find('}')
                    .ok_or_else(|| format!("unclosed '{{' in \"{}\"", template))?;
                let key = &rest[..end];
                if key.is_empty() || key.contains('{') {
                    return Err(format!("invalid placeholder in \"{}\"", template));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Key(key));
                i += end + 2;
            }
            b'}' => return Err(format!("unmatched '}}' in \"{}\"", template)),
            _ => {
                // Copy a whole UTF-8 char
                let ch = template[i..].chars().next().unwrap_or_default();
                literal.push(ch);
                i += ch.len_utf8().max(1);
            }
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn render_str(template: &str, ctx: &Context) -> Result<String, ContextError> {
    let segments = parse_template(template).map_err(ContextError::MalformedTemplate)?;
    let mut out = String::with_capacity(template.len());
    for segment in segments {
        match segment {
            Segment::Literal(s) => out.push_str(&s),
            Segment::Key(key) => out.push_str(&ctx.get_str(key)?),
        }
    }
    Ok(out)
}

/// A string that is exactly one placeholder is replaced by the raw context
/// value, so booleans and numbers keep their JSON type.
fn render_json(value: &Value, ctx: &Context) -> Result<Value, ContextError> {
    match value {
        Value::String(s) => {
            if let Ok(segments) = parse_template(s) {
                if let [Segment::Key(key)] = segments.as_slice() {
                    return ctx.get(key).cloned();
                }
            }
            Ok(Value::String(render_str(s, ctx)?))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| render_json(item, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), render_json(v, ctx)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn collect_json_keys(value: &Value, keys: &mut BTreeSet<String>) -> Result<(), String> {
    match value {
        Value::String(s) => collect_keys(s, keys),
        Value::Array(items) => items.iter().try_for_each(|v| collect_json_keys(v, keys)),
        Value::Object(map) => map.values().try_for_each(|v| collect_json_keys(v, keys)),
        _ => Ok(()),
    }
}

fn collect_keys(template: &str, keys: &mut BTreeSet<String>) -> Result<(), String> {
    for segment in parse_template(template)? {
        if let Segment::Key(key) = segment {
            keys.insert(key.to_string());
        }
    }
    Ok(())
}

/// Request shape with `{key}` placeholders resolved from the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTemplate {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub query: Vec<(String, String)>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl RequestTemplate {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// JSON body. `Content-Type` is set by the transport.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Context keys this template reads.
    pub fn required_keys(&self) -> Result<BTreeSet<String>, String> {
        let mut keys = BTreeSet::new();
        collect_keys(&self.path, &mut keys)?;
        for (name, value) in self.query.iter().chain(self.headers.iter()) {
            collect_keys(name, &mut keys)?;
            collect_keys(value, &mut keys)?;
        }
        if let Some(body) = &self.body {
            collect_json_keys(body, &mut keys)?;
        }
        Ok(keys)
    }

    /// Render against `ctx`. Fails on the first unset key.
    pub fn render(&self, ctx: &Context) -> Result<HttpRequest, ContextError> {
        let render_pairs = |pairs: &[(String, String)]| {
            pairs
                .iter()
                .map(|(k, v)| Ok((render_str(k, ctx)?, render_str(v, ctx)?)))
                .collect::<Result<Vec<_>, ContextError>>()
        };

        Ok(HttpRequest {
            method: self.method,
            path: render_str(&self.path, ctx)?,
            query: render_pairs(&self.query)?,
            headers: render_pairs(&self.headers)?,
            body: self
                .body
                .as_ref()
                .map(|b| render_json(b, ctx))
                .transpose()?,
        })
    }
}

/// Expected outcome of a step, checked against the response status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Exactly this status.
    Status(u16),
    /// Any of these statuses.
    StatusIn(Vec<u16>),
    /// Any 2xx status.
    #[default]
    Success,
}

impl Expectation {
    pub fn matches(&self, response: &HttpResponse) -> bool {
        match self {
            Expectation::Status(s) => response.status == *s,
            Expectation::StatusIn(list) => list.contains(&response.status),
            Expectation::Success => (200..300).contains(&response.status),
        }
    }
}

/// Outcome of one executed step. Forwarded to the result sink, never kept.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub step: String,
    pub success: bool,
    /// `None` when no response was received.
    pub status: Option<u16>,
    pub latency: Duration,
    pub error: Option<StepError>,
}

impl StepOutcome {
    fn failed(step: &str, status: Option<u16>, latency: Duration, error: StepError) -> Self {
        Self {
            step: step.to_string(),
            success: false,
            status,
            latency,
            error: Some(error),
        }
    }
}

/// A single request/validate/extract unit within a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub request: RequestTemplate,
    /// Written as `success`, `{ status: 201 }` or `{ status_in: [200, 409] }`.
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub expect: Expectation,
    /// Context key -> JSON pointer (RFC 6901) into the response body.
    #[serde(default)]
    pub extract: BTreeMap<String, String>,
}

impl Step {
    pub fn new(name: impl Into<String>, request: RequestTemplate) -> Self {
        Self {
            name: name.into(),
            request,
            expect: Expectation::default(),
            extract: BTreeMap::new(),
        }
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.expect = Expectation::Status(status);
        self
    }

    pub fn expect(mut self, expect: Expectation) -> Self {
        self.expect = expect;
        self
    }

    pub fn extract(mut self, key: impl Into<String>, pointer: impl Into<String>) -> Self {
        self.extract.insert(key.into(), pointer.into());
        self
    }

    pub fn required_keys(&self) -> Result<BTreeSet<String>, String> {
        self.request.required_keys()
    }

    pub fn provided_keys(&self) -> impl Iterator<Item = &str> {
        self.extract.keys().map(String::as_str)
    }

    pub fn build(&self, ctx: &Context) -> Result<HttpRequest, ContextError> {
        self.request.render(ctx)
    }

    /// Run all four phases. Never fails; errors land in the outcome.
    pub async fn execute(&self, ctx: &mut Context, transport: &dyn Transport) -> StepOutcome {
        let request = match self.build(ctx) {
            Ok(r) => r,
            Err(e) => {
                debug!(step = %self.name, error = %e, "Build failed");
                return StepOutcome::failed(&self.name, None, Duration::ZERO, e.into());
            }
        };

        let start = Instant::now();
        let response = match transport.send(&request).await {
            Ok(r) => r,
            Err(e) => {
                debug!(step = %self.name, error = %e, "Transport error");
                return StepOutcome::failed(&self.name, None, start.elapsed(), e.into());
            }
        };

        let status = response.status;
        if !self.expect.matches(&response) {
            return StepOutcome::failed(
                &self.name,
                Some(status),
                response.latency,
                StepError::Validation { status },
            );
        }

        if let Err(e) = self.apply_extraction(&response, ctx) {
            return StepOutcome::failed(&self.name, Some(status), response.latency, e);
        }

        debug!(step = %self.name, status, latency_us = response.latency.as_micros() as u64, "Step passed");
        StepOutcome {
            step: self.name.clone(),
            success: true,
            status: Some(status),
            latency: response.latency,
            error: None,
        }
    }

    /// All pointers are resolved before anything is written.
    fn apply_extraction(&self, response: &HttpResponse, ctx: &mut Context) -> Result<(), StepError> {
        if self.extract.is_empty() {
            return Ok(());
        }
        let body = response
            .json()
            .ok_or_else(|| StepError::Extract("response body is not JSON".to_string()))?;

        let values = self
            .extract
            .iter()
            .map(|(key, pointer)| {
                body.pointer(pointer)
                    .cloned()
                    .map(|v| (key, v))
                    .ok_or_else(|| {
                        StepError::Extract(format!("pointer '{}' not found in response", pointer))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (key, value) in values {
            ctx.set(key.clone(), value)
                .map_err(|e| StepError::Extract(e.to_string()))?;
        }
        Ok(())
    }
}
