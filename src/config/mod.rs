//! Configuration module: model prompts.

mod prompts;

pub use prompts::{locate_prompt, step_prompt, system_prompt_with_resolution, SYSTEM_PROMPT};
