//! Text entry over ADB.
//!
//! Two strategies are supported: the stock `input text` command, which needs
//! its argument escaped for the device shell, and the ADB Keyboard IME, which
//! takes base64 and therefore handles any Unicode text.

use base64::{engine::general_purpose::STANDARD, Engine};

use super::connection::AdbConnection;
use crate::device::TransportError;

const ADB_KEYBOARD_IME: &str = "com.android.adbkeyboard/.AdbIME";
const KEYCODE_ENTER: &str = "66";

/// How `Primitive::Text` reaches the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextInputMode {
    /// `adb shell input text`, ASCII only.
    #[default]
    InputText,
    /// Broadcast to the ADB Keyboard IME.
    /// See: https://github.com/senzhk/ADBKeyBoard
    AdbKeyboard,
}

/// Escape text for `adb shell input text`.
///
/// `input text` treats `%s` as a space, and the argument passes through the
/// device shell, so metacharacters need a backslash. Tabs become spaces and
/// other control characters are dropped; line breaks are handled by
/// [`type_text`].
pub fn escape_input_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' | '\t' => escaped.push_str("%s"),
            c if c.is_control() => {}
            '\\' | '"' | '\'' | '`' | '$' | '&' | '|' | ';' | '<' | '>' | '(' | ')' | '*'
            | '?' | '~' | '#' | '!' | '[' | ']' | '{' | '}' | '%' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Shell commands that type `text`, one `input text` per line with ENTER
/// between lines.
fn input_text_commands(text: &str) -> Vec<Vec<String>> {
    let mut commands = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            commands.push(vec!["input".into(), "keyevent".into(), KEYCODE_ENTER.into()]);
        }
        let escaped = escape_input_text(line);
        if !escaped.is_empty() {
            commands.push(vec!["input".into(), "text".into(), escaped]);
        }
    }
    commands
}

/// Type text with `input text`.
pub fn type_text(conn: &AdbConnection, text: &str) -> Result<String, TransportError> {
    let mut output = String::new();
    for command in input_text_commands(text) {
        let args: Vec<&str> = command.iter().map(String::as_str).collect();
        output.push_str(&conn.shell(&args)?);
    }
    Ok(output)
}

/// Type text through the ADB Keyboard, switching IME for the duration.
pub fn type_text_with_keyboard(conn: &AdbConnection, text: &str) -> Result<String, TransportError> {
    let original_ime = current_ime(conn);
    if original_ime != ADB_KEYBOARD_IME {
        conn.shell(&["ime", "set", ADB_KEYBOARD_IME])?;
    }

    let encoded = STANDARD.encode(text.as_bytes());
    let result = conn.shell(&["am", "broadcast", "-a", "ADB_INPUT_B64", "--es", "msg", &encoded]);

    restore_keyboard(conn, &original_ime);
    result
}

fn current_ime(conn: &AdbConnection) -> String {
    conn.shell(&["settings", "get", "secure", "default_input_method"])
        .unwrap_or_default()
}

fn restore_keyboard(conn: &AdbConnection, ime: &str) {
    if ime.is_empty() || ime == ADB_KEYBOARD_IME {
        return;
    }
    if let Err(e) = conn.shell(&["ime", "set", ime]) {
        tracing::warn!(ime, "failed to restore keyboard: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_spaces() {
        assert_eq!(escape_input_text("hello world"), "hello%sworld");
        assert_eq!(escape_input_text("a  b"), "a%s%sb");
    }

    #[test]
    fn test_escape_shell_metacharacters() {
        assert_eq!(escape_input_text("it's"), "it\\'s");
        assert_eq!(escape_input_text("a&b;c"), "a\\&b\\;c");
        assert_eq!(escape_input_text("$HOME"), "\\$HOME");
        assert_eq!(escape_input_text("50%"), "50\\%");
        assert_eq!(escape_input_text("a\tb"), "a%sb");

        let escaped = escape_input_text("line1\nreboot\r\tx\u{7}");
        assert_eq!(escaped, "line1reboot%sx");
        assert!(!escaped.chars().any(char::is_control));
    }

    #[test]
    fn test_newlines_sent_as_enter() {
        let commands = input_text_commands("first line\n\nrm -rf\r");
        let expected: Vec<Vec<String>> = vec![
            vec!["input".into(), "text".into(), "first%sline".into()],
            vec!["input".into(), "keyevent".into(), "66".into()],
            vec!["input".into(), "keyevent".into(), "66".into()],
            vec!["input".into(), "text".into(), "rm%s-rf".into()],
        ];
        assert_eq!(commands, expected);
        assert!(input_text_commands("").is_empty());
    }

    #[test]
    fn test_escape_plain_text_unchanged() {
        assert_eq!(escape_input_text("user@example.com"), "user@example.com");
        assert_eq!(escape_input_text(""), "");
    }
}
