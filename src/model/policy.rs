//! Reasoning policy: turns goal, step and screen into a decision.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use super::client::{GenerateRequest, ModelClient, ModelError};
use crate::actions::{ActionCommand, ActionName};
use crate::config::{step_prompt, system_prompt_with_resolution};
use crate::vision::NormalizedImage;

/// Failure to obtain a usable decision. Always fatal to the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("policy transport error: {0}")]
    Transport(String),
    #[error("malformed policy reply: {0}")]
    MalformedReply(String),
    #[error("policy requested unknown action: {0}")]
    UnknownAction(String),
}

impl From<ModelError> for PolicyError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::ParseError(msg) => PolicyError::MalformedReply(msg),
            other => PolicyError::Transport(other.to_string()),
        }
    }
}

/// The policy's answer for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub thought: String,
    pub action: ActionCommand,
}

/// Anything that can decide the next action from a screenshot.
#[async_trait]
pub trait Policy: Send + Sync {
    /// `step` is zero-based.
    async fn ask(
        &self,
        goal: &str,
        step: u32,
        image: &NormalizedImage,
    ) -> Result<Decision, PolicyError>;
}

/// Parse a reply of the form
/// `{"thought": "...", "action": {"name": "...", "params": {...}}}`.
///
/// The reply must be exactly one JSON object. Nothing is repaired.
pub fn parse_decision(reply: &str) -> Result<Decision, PolicyError> {
    let value: Value = serde_json::from_str(reply.trim())
        .map_err(|e| PolicyError::MalformedReply(format!("not JSON: {}", e)))?;
    let Value::Object(mut root) = value else {
        return Err(PolicyError::MalformedReply("reply is not an object".into()));
    };

    let thought = match root.remove("thought") {
        Some(Value::String(s)) => s,
        Some(_) => return Err(PolicyError::MalformedReply("thought is not a string".into())),
        None => return Err(PolicyError::MalformedReply("missing thought".into())),
    };

    let mut action = match root.remove("action") {
        Some(Value::Object(obj)) => obj,
        Some(_) => return Err(PolicyError::MalformedReply("action is not an object".into())),
        None => return Err(PolicyError::MalformedReply("missing action".into())),
    };

    let name = match action.remove("name") {
        Some(Value::String(s)) => s,
        Some(_) => return Err(PolicyError::MalformedReply("action name is not a string".into())),
        None => return Err(PolicyError::MalformedReply("missing action name".into())),
    };
    let name: ActionName = name
        .parse()
        .map_err(|e: crate::actions::UnknownActionName| PolicyError::UnknownAction(e.0))?;

    let params = match action.remove("params") {
        Some(Value::Object(obj)) => obj,
        None => Map::new(),
        Some(_) => return Err(PolicyError::MalformedReply("params is not an object".into())),
    };

    Ok(Decision {
        thought,
        action: ActionCommand::new(name, params),
    })
}

#[async_trait]
impl Policy for ModelClient {
    async fn ask(
        &self,
        goal: &str,
        step: u32,
        image: &NormalizedImage,
    ) -> Result<Decision, PolicyError> {
        let system = system_prompt_with_resolution(image.source);
        let prompt = step_prompt(goal, step);
        let reply = self
            .generate(&GenerateRequest {
                system: Some(&system),
                prompt: &prompt,
                image: Some(image),
                json: true,
            })
            .await?;
        tracing::debug!(reply = %reply, "policy reply");
        parse_decision(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_decision() {
        let d = parse_decision(
            r#"{"thought": "open it", "action": {"name": "open_app", "params": {"package_name": "com.android.settings"}}}"#,
        )
        .unwrap();
        assert_eq!(d.thought, "open it");
        assert_eq!(d.action.name, ActionName::OpenApp);
        assert_eq!(d.action.params["package_name"], json!("com.android.settings"));
    }

    #[test]
    fn test_params_optional() {
        let d = parse_decision(r#"{"thought": "done", "action": {"name": "finish"}}"#).unwrap();
        assert_eq!(d.action.name, ActionName::Finish);
        assert!(d.action.params.is_empty());
    }

    #[test]
    fn test_unknown_action() {
        assert_eq!(
            parse_decision(r#"{"thought": "t", "action": {"name": "fly"}}"#),
            Err(PolicyError::UnknownAction("fly".into()))
        );
    }

    #[test]
    fn test_malformed_replies() {
        let bad = [
            "I think I should click the button",
            "```json\n{\"thought\": \"t\", \"action\": {\"name\": \"finish\"}}\n```",
            "[1, 2]",
            r#"{"action": {"name": "finish"}}"#,
            r#"{"thought": 3, "action": {"name": "finish"}}"#,
            r#"{"thought": "t"}"#,
            r#"{"thought": "t", "action": "finish"}"#,
            r#"{"thought": "t", "action": {"params": {}}}"#,
            r#"{"thought": "t", "action": {"name": 7}}"#,
            r#"{"thought": "t", "action": {"name": "click", "params": [1, 2]}}"#,
        ];
        for reply in bad {
            assert!(
                matches!(parse_decision(reply), Err(PolicyError::MalformedReply(_))),
                "accepted: {reply}"
            );
        }
    }

    #[test]
    fn test_model_error_mapping() {
        assert!(matches!(
            PolicyError::from(ModelError::ParseError("x".into())),
            PolicyError::MalformedReply(_)
        ));
        assert!(matches!(
            PolicyError::from(ModelError::ApiError {
                status: 500,
                body: "boom".into()
            }),
            PolicyError::Transport(_)
        ));
        assert!(matches!(
            PolicyError::from(ModelError::MaxRetriesExceeded(3, "x".into())),
            PolicyError::Transport(_)
        ));
    }
}
