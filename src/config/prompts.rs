//! Prompts sent to the reasoning and vision models.

use chrono::{DateTime, Local};

use crate::device::Resolution;

/// Behavioural contract for the reasoning policy (without the date header).
pub static SYSTEM_PROMPT: &str = r#"You are OpenMobile, an autonomous agent controlling an Android device.
Your goal is to fulfill the user's request by taking one step at a time.
Each turn you receive the goal, the step number and a screenshot of the current screen.

Available Actions:
- click(x, y): Clicks on absolute pixel coordinates.
  Alternatively give "point": "[x%, y%]" as percentages of the screen size.
- type(text): Types text into the focused field.
- scroll(direction): Scrolls "up" or "down".
- open_app(package_name): Opens an app by its Android package name.
- press_key(keycode): Home=3, Back=4, Power=26, Enter=66.
- wait(seconds): Pause execution.
- finish(message): Goal reached; message summarises the result.

Respond ONLY with a JSON object:
{
  "thought": "I need to open Telegram to see the message.",
  "action": {"name": "open_app", "params": {"package_name": "org.telegram.messenger"}}
}

Rules:
1. Exactly one action per reply.
2. If the screen did not change after your last action, try a different approach.
3. Use finish as soon as the goal is reached."#;

/// System prompt with today's date and the screen resolution.
pub fn system_prompt_with_resolution(resolution: Resolution) -> String {
    system_prompt_at(Local::now(), resolution)
}

fn system_prompt_at(today: DateTime<Local>, resolution: Resolution) -> String {
    format!(
        "Today's date is: {}\nCurrent screen resolution: {} (width x height)\n{}",
        today.format("%B %d, %Y"),
        resolution,
        SYSTEM_PROMPT
    )
}

/// Per-step user prompt. `step` is zero-based; the model sees it one-based.
pub fn step_prompt(goal: &str, step: u32) -> String {
    format!(
        "Goal: {}\nStep {}. Analyse the screen and decide the next action.",
        goal,
        step + 1
    )
}

/// Prompt asking a vision model for an element's centre as percentages.
pub fn locate_prompt(query: &str) -> String {
    format!(
        "Analyze this screenshot. Find the \"{}\".\n\
         Provide the center coordinates as percentages [x%, y%].\n\
         Example: If it's in the middle, respond \"[50, 50]\".\n\
         Respond ONLY with the [x, y] coordinates.",
        query
    )
}
