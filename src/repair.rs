//! Model-assisted repair of FSP specifications that fail a safety check.
//!
//! The loop alternates between the verifier and the model: each failed check
//! sends the current specification and the analyser trace, the reply is
//! extracted and re-verified, and the conversation is kept so later attempts
//! see earlier ones.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::anthropic::{AnthropicError, Message, MessageSender, MessagesRequest};
use crate::config::RepairConfig;
use crate::error::RepairError;
use crate::verifier::{DEFAULT_PROCESS, Operation, Verify, VerifyRequest, VerifyResponse};

const SYSTEM_PROMPT: &str = "You repair FSP (Finite State Processes) specifications for the LTSA \
model checker. Reply with the complete corrected specification in a single fenced code block \
and nothing else.";

#[derive(Debug, Clone, Serialize)]
pub struct RepairAttempt {
    pub attempt: u32,
    pub candidate: Option<String>,
    pub names_preserved: bool,
    pub verified: bool,
    /// Analyser trace, or the reason the candidate was rejected before checking.
    pub diagnostic: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub process: String,
    /// The input passed the safety check and no model call was made.
    pub initially_valid: bool,
    pub repaired: bool,
    /// The verified specification, if any.
    pub final_spec: Option<String>,
    pub attempts: Vec<RepairAttempt>,
}

pub async fn repair_file(
    path: &Path,
    process: Option<&str>,
    verifier: &impl Verify,
    client: &impl MessageSender,
    config: &RepairConfig,
) -> Result<RepairReport, RepairError> {
    let spec = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RepairError::Read {
            path: path.display().to_string(),
            source,
        })?;
    repair_spec(&spec, process, verifier, client, config).await
}

pub async fn repair_spec(
    spec: &str,
    process: Option<&str>,
    verifier: &impl Verify,
    client: &impl MessageSender,
    config: &RepairConfig,
) -> Result<RepairReport, RepairError> {
    let process = process.unwrap_or(DEFAULT_PROCESS).to_string();
    let mut report = RepairReport {
        process: process.clone(),
        initially_valid: false,
        repaired: false,
        final_spec: None,
        attempts: Vec::new(),
    };

    let initial = check_safety(verifier, spec, &process).await?;
    if initial.success {
        info!(process = %process, "specification already passes the safety check");
        report.initially_valid = true;
        report.final_spec = Some(spec.to_string());
        return Ok(report);
    }

    let expected = top_level_process_names(spec);
    let mut messages = vec![Message::user(initial_prompt(
        spec,
        &failure_trace(&initial),
        &expected,
    ))];

    for attempt in 1..=config.max_attempts {
        let started_at = Utc::now();
        let req = MessagesRequest {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system: Some(SYSTEM_PROMPT.to_string()),
            messages: messages.clone(),
        };
        let reply = send_with_backoff(client, &req, config).await?.text();
        messages.push(Message::assistant(reply.clone()));

        let mut record = RepairAttempt {
            attempt,
            candidate: None,
            names_preserved: false,
            verified: false,
            diagnostic: String::new(),
            started_at,
            finished_at: started_at,
        };

        match extract_fsp(&reply) {
            None => record.diagnostic = RepairError::EmptyReply.to_string(),
            Some(candidate) => {
                let found = top_level_process_names(&candidate);
                let missing: Vec<&str> = expected.difference(&found).map(String::as_str).collect();
                if missing.is_empty() {
                    record.names_preserved = true;
                    let resp = check_safety(verifier, &candidate, &process).await?;
                    record.verified = resp.success;
                    record.diagnostic = failure_trace(&resp);
                } else {
                    record.diagnostic = format!(
                        "top-level process names were removed or renamed: {}",
                        missing.join(", ")
                    );
                }
                record.candidate = Some(candidate);
            }
        }
        record.finished_at = Utc::now();

        info!(
            attempt,
            max_attempts = config.max_attempts,
            verified = record.verified,
            names_preserved = record.names_preserved,
            "repair attempt finished"
        );

        if record.verified {
            report.repaired = true;
            report.final_spec = record.candidate.clone();
            report.attempts.push(record);
            return Ok(report);
        }
        messages.push(Message::user(followup_prompt(&record.diagnostic, &expected)));
        report.attempts.push(record);
    }

    warn!(process = %process, attempts = config.max_attempts, "repair gave up");
    Ok(report)
}

async fn check_safety(
    verifier: &impl Verify,
    spec: &str,
    process: &str,
) -> Result<VerifyResponse, RepairError> {
    let req = VerifyRequest::new(spec, Operation::CheckSafety).with_process(process);
    Ok(verifier.verify(&req).await?)
}

/// Exponential backoff: `base_delay_ms * 2^(attempt - 1)`.
fn delay_for_attempt(base_delay_ms: u64, attempt: u32) -> u64 {
    base_delay_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Retry rate-limited calls up to `max_attempts` times; other errors propagate.
async fn send_with_backoff(
    client: &impl MessageSender,
    req: &MessagesRequest,
    config: &RepairConfig,
) -> Result<crate::anthropic::MessagesResponse, RepairError> {
    let mut retries = 0;
    loop {
        match client.send_message(req).await {
            Err(AnthropicError::RateLimited { retry_after_ms }) if retries < config.max_attempts => {
                retries += 1;
                let delay_ms = retry_after_ms.max(delay_for_attempt(config.base_delay_ms, retries));
                warn!(retry = retries, delay_ms, "model call rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            result => return Ok(result?),
        }
    }
}

fn failure_trace(resp: &VerifyResponse) -> String {
    match &resp.error {
        Some(err) if !resp.output.is_empty() => format!("{}\n{}", resp.output.trim_end(), err),
        Some(err) => err.clone(),
        None => resp.output.clone(),
    }
}

fn name_list(names: &BTreeSet<String>) -> String {
    names.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn initial_prompt(spec: &str, trace: &str, names: &BTreeSet<String>) -> String {
    format!(
        "The following FSP specification fails the LTSA safety check.\n\n\
         ```fsp\n{spec}\n```\n\n\
         Analyser output:\n\n```\n{trace}\n```\n\n\
         Rewrite the specification so the safety check passes. Keep these top-level \
         process names unchanged: {}.",
        name_list(names)
    )
}

fn followup_prompt(diagnostic: &str, names: &BTreeSet<String>) -> String {
    format!(
        "That rewrite was rejected:\n\n```\n{diagnostic}\n```\n\n\
         Try again. Keep these top-level process names unchanged: {}.",
        name_list(names)
    )
}

/// Pull FSP text out of a model reply: the first fenced block, or the whole
/// reply when it has no fence. `None` when nothing is left.
pub fn extract_fsp(reply: &str) -> Option<String> {
    let text = match reply.split_once("```") {
        Some((_, after)) => {
            // Drop the info string (`fsp`, `lts`, ...) on the opening fence line.
            let body = after.split_once('\n').map_or("", |(_, body)| body);
            body.split_once("```").map_or(body, |(inner, _)| inner)
        }
        None => reply,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Names of top-level process definitions in FSP source.
///
/// Local definitions that follow a comma inside a definition are not
/// top-level. `const`, `range`, `set`, `assert`, `progress` and `menu`
/// declarations are skipped.
pub fn top_level_process_names(fsp: &str) -> BTreeSet<String> {
    let text = strip_comments(fsp);
    let mut names = BTreeSet::new();
    let mut in_definition = false;
    for line in text.lines() {
        let mut rest = line;
        loop {
            if !in_definition {
                match definition_name(rest) {
                    Some(name) => {
                        names.insert(name);
                        in_definition = true;
                    }
                    None => break,
                }
            }
            match terminator(rest) {
                Some(end) => {
                    in_definition = false;
                    rest = &rest[end..];
                }
                None => break,
            }
        }
    }
    names
}

fn strip_comments(fsp: &str) -> String {
    let mut out = String::with_capacity(fsp.len());
    let mut chars = fsp.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Byte offset just past the first `.` that ends a definition, i.e. one
/// followed by whitespace or end of line. `a.b` and `0..3` do not match.
fn terminator(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    bytes.iter().enumerate().find_map(|(i, &b)| {
        let next = bytes.get(i + 1);
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        (b == b'.' && prev != Some(b'.') && next.is_none_or(|n| n.is_ascii_whitespace()))
            .then_some(i + 1)
    })
}

fn definition_name(s: &str) -> Option<String> {
    let mut rest = s.trim_start();
    loop {
        if let Some(r) = rest.strip_prefix("||") {
            rest = r.trim_start();
            continue;
        }
        let modifier = ["property", "deterministic", "minimal"]
            .iter()
            .find_map(|kw| rest.strip_prefix(kw).filter(|r| r.starts_with(char::is_whitespace)));
        match modifier {
            Some(r) => rest = r.trim_start(),
            None => break,
        }
    }

    if !rest.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let (name, mut after) = rest.split_at(end);
    after = after.trim_start();

    if after.starts_with('(') {
        let mut depth = 0usize;
        let close = after.char_indices().find_map(|(i, c)| {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
            None
        })?;
        after = after[close + 1..].trim_start();
    }

    (after.starts_with('=') && !after.starts_with("==")).then(|| name.to_string())
}
