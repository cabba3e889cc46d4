//! Ordered chain of on-prompt pre-processing hooks.
//!
//! Each hook receives the prompt produced by the previous one. A hook that
//! fails or panics is logged and skipped; it never aborts the chain.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
#[error("prompt hook failed: {0}")]
pub struct HookError(pub String);

pub trait PromptHook: Send + Sync {
    fn apply(&self, prompt: Value) -> Result<Value, HookError>;
}

impl<F> PromptHook for F
where
    F: Fn(Value) -> Result<Value, HookError> + Send + Sync,
{
    fn apply(&self, prompt: Value) -> Result<Value, HookError> {
        self(prompt)
    }
}

#[derive(Default)]
pub struct PromptHooks {
    hooks: Vec<Box<dyn PromptHook>>,
}

impl PromptHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, hook: impl PromptHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in registration order.
    pub fn trigger(&self, prompt: Value) -> Value {
        let mut current = prompt;
        for (index, hook) in self.hooks.iter().enumerate() {
            // The hook only sees a clone, so `current` is intact after a panic.
            match panic::catch_unwind(AssertUnwindSafe(|| hook.apply(current.clone()))) {
                Ok(Ok(next)) => current = next,
                Ok(Err(e)) => {
                    tracing::error!(hook = index, error = %e, "On-prompt hook failed, skipping");
                }
                Err(payload) => {
                    tracing::error!(
                        hook = index,
                        panic = panic_message(payload.as_ref()),
                        "On-prompt hook panicked, skipping",
                    );
                }
            }
        }
        current
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

impl std::fmt::Debug for PromptHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptHooks")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tag(key: &'static str) -> impl Fn(Value) -> Result<Value, HookError> {
        move |mut prompt: Value| {
            prompt[key] = json!(true);
            Ok(prompt)
        }
    }

    #[test]
    fn empty_chain_returns_input() {
        let hooks = PromptHooks::new();
        assert_eq!(hooks.trigger(json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn hooks_run_in_order_on_previous_output() {
        let mut hooks = PromptHooks::new();
        hooks.add(tag("first"));
        hooks.add(|prompt: Value| {
            if prompt["first"] == json!(true) {
                Ok(json!({"saw_first": true}))
            } else {
                Err(HookError("first hook did not run".into()))
            }
        });

        assert_eq!(hooks.trigger(json!({})), json!({"saw_first": true}));
    }

    #[test]
    fn failing_hook_is_skipped() {
        let mut hooks = PromptHooks::new();
        hooks.add(tag("before"));
        hooks.add(|_: Value| -> Result<Value, HookError> { Err(HookError("boom".into())) });
        hooks.add(tag("after"));

        assert_eq!(hooks.len(), 3);
        assert_eq!(
            hooks.trigger(json!({})),
            json!({"before": true, "after": true})
        );
    }

    #[test]
    fn panicking_hook_is_skipped() {
        let mut hooks = PromptHooks::new();
        hooks.add(tag("before"));
        hooks.add(|_: Value| -> Result<Value, HookError> { panic!("hook bug") });
        hooks.add(tag("after"));

        assert_eq!(
            hooks.trigger(json!({})),
            json!({"before": true, "after": true})
        );
    }

    #[test]
    fn panic_message_reads_string_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "non-string panic payload");
    }
}
