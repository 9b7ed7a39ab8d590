//! Prompt sources: the dataset's task text and a configured default

use tracing::debug;

use super::error::TransformError;
use super::traits::DataTransform;
use crate::record::{Record, Value};

/// Sets `prompt` when the record has none
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectDefaultPrompt {
    prompt: String,
}

impl InjectDefaultPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into() }
    }
}

impl DataTransform for InjectDefaultPrompt {
    fn name(&self) -> &'static str {
        "inject_default_prompt"
    }

    fn apply(&self, mut record: Record) -> Result<Record, TransformError> {
        record
            .entry("prompt".to_string())
            .or_insert_with(|| Value::Text(self.prompt.clone()));
        Ok(record)
    }
}

/// Copies the dataset's `task` text into `prompt`
///
/// Runs ahead of repacking so the prompt survives key selection. Records
/// without a `task` field pass through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptFromTask;

impl DataTransform for PromptFromTask {
    fn name(&self) -> &'static str {
        "prompt_from_task"
    }

    fn apply(&self, mut record: Record) -> Result<Record, TransformError> {
        match record.get("task") {
            Some(Value::Text(task)) => {
                let task = task.clone();
                debug!(%task, "PromptFromTask::apply: using task as prompt");
                record.insert("prompt".to_string(), Value::Text(task));
                Ok(record)
            }
            Some(other) => Err(TransformError::TypeMismatch {
                transform: self.name(),
                field: "task".to_string(),
                expected: "text",
                actual: other.kind(),
            }),
            None => Ok(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_becomes_prompt() {
        let mut r = Record::new();
        r.insert("task".into(), Value::from("store the groceries"));
        r.insert("prompt".into(), Value::from("stale"));
        let out = PromptFromTask.apply(r).unwrap();
        assert_eq!(out["prompt"], Value::from("store the groceries"));
        assert_eq!(out["task"], Value::from("store the groceries"));
    }

    #[test]
    fn test_without_task_unchanged() {
        let mut r = Record::new();
        r.insert("prompt".into(), Value::from("fold the towel"));
        assert_eq!(PromptFromTask.apply(r.clone()).unwrap(), r);
    }

    #[test]
    fn test_non_text_task_rejected() {
        let mut r = Record::new();
        r.insert("task".into(), Value::Scalar(3.0));
        let err = PromptFromTask.apply(r).unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { actual: "scalar", .. }));
    }

    #[test]
    fn test_injects_when_absent() {
        let out = InjectDefaultPrompt::new("do the task").apply(Record::new()).unwrap();
        assert_eq!(out["prompt"], Value::from("do the task"));
    }

    #[test]
    fn test_keeps_existing_prompt() {
        let mut r = Record::new();
        r.insert("prompt".into(), Value::from("fold the towel"));
        let out = InjectDefaultPrompt::new("do the task").apply(r).unwrap();
        assert_eq!(out["prompt"], Value::from("fold the towel"));
    }
}
