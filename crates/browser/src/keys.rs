//! Key definitions for `Input.dispatchKeyEvent`.

/// What the protocol needs to synthesize one key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDefinition {
    pub key: String,
    pub code: String,
    /// Text inserted by the key, if any.
    pub text: Option<String>,
    pub key_code: i64,
}

/// Resolve a key name ("Enter", "Tab", "ArrowDown", "a") to its definition.
/// Unknown multi-character names are passed through as bare keys.
pub fn definition(name: &str) -> KeyDefinition {
    let named = |key: &str, code: &str, text: Option<&str>, key_code: i64| KeyDefinition {
        key: key.to_string(),
        code: code.to_string(),
        text: text.map(String::from),
        key_code,
    };

    match name {
        "Enter" | "Return" => named("Enter", "Enter", Some("\r"), 13),
        "Tab" => named("Tab", "Tab", None, 9),
        "Escape" | "Esc" => named("Escape", "Escape", None, 27),
        "Backspace" => named("Backspace", "Backspace", None, 8),
        "Delete" => named("Delete", "Delete", None, 46),
        "Space" | " " => named(" ", "Space", Some(" "), 32),
        "ArrowUp" => named("ArrowUp", "ArrowUp", None, 38),
        "ArrowDown" => named("ArrowDown", "ArrowDown", None, 40),
        "ArrowLeft" => named("ArrowLeft", "ArrowLeft", None, 37),
        "ArrowRight" => named("ArrowRight", "ArrowRight", None, 39),
        "PageDown" => named("PageDown", "PageDown", None, 34),
        "PageUp" => named("PageUp", "PageUp", None, 33),
        "Home" => named("Home", "Home", None, 36),
        "End" => named("End", "End", None, 35),
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    let upper = c.to_ascii_uppercase();
                    let code = if c.is_ascii_alphabetic() {
                        format!("Key{upper}")
                    } else if c.is_ascii_digit() {
                        format!("Digit{c}")
                    } else {
                        String::new()
                    };
                    let key_code = if c.is_ascii_alphanumeric() {
                        i64::from(u32::from(upper))
                    } else {
                        0
                    };
                    KeyDefinition {
                        key: c.to_string(),
                        code,
                        text: Some(c.to_string()),
                        key_code,
                    }
                }
                _ => named(other, other, None, 0),
            }
        }
    }
}
