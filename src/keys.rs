//! Raw key identifier -> logical key token.
//!
//! Both capture backends record tokens produced here, so exported tables are
//! comparable no matter which backend ran.

/// Keys with a dedicated token. Every other key passes through unchanged.
const KEY_TOKENS: &[(&str, &str)] = &[
    ("Shift", "Key.shift"),
    ("Control", "Key.ctrl"),
    ("Alt", "Key.alt"),
    ("Meta", "Key.cmd"),
    ("Enter", "Key.enter"),
    ("Backspace", "Key.backspace"),
    ("Escape", "Key.esc"),
    ("Tab", "Key.tab"),
    ("ArrowLeft", "Key.left"),
    ("ArrowRight", "Key.right"),
    ("ArrowUp", "Key.up"),
    ("ArrowDown", "Key.down"),
    ("CapsLock", "Key.caps_lock"),
    (" ", "Key.space"),
    (",", "Key.comma"),
];

/// Map a raw key (the browser's `KeyboardEvent.key`) to its logical token.
pub fn map_key(raw: &str) -> &str {
    KEY_TOKENS
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, token)| *token)
        .unwrap_or(raw)
}

/// True for keys whose token differs from the raw key.
pub fn has_dedicated_token(raw: &str) -> bool {
    KEY_TOKENS.iter().any(|(name, _)| *name == raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_and_navigation_map_to_dedicated_tokens() {
        assert_eq!(map_key("Shift"), "Key.shift");
        assert_eq!(map_key("Control"), "Key.ctrl");
        assert_eq!(map_key("Meta"), "Key.cmd");
        assert_eq!(map_key("ArrowLeft"), "Key.left");
        assert_eq!(map_key("CapsLock"), "Key.caps_lock");
    }

    #[test]
    fn space_and_comma_never_leak_into_csv_columns() {
        assert_eq!(map_key(" "), "Key.space");
        assert_eq!(map_key(","), "Key.comma");
    }

    #[test]
    fn other_keys_pass_through() {
        for raw in ["a", "A", "7", "é", "F5", "Dead", "."] {
            assert_eq!(map_key(raw), raw);
            assert!(!has_dedicated_token(raw));
        }
    }

    #[test]
    fn shifted_symbols_keep_their_own_value() {
        // Shift+Comma arrives as "<"; only the produced value is looked up.
        assert_eq!(map_key("<"), "<");
        assert_eq!(map_key("\u{a0}"), "\u{a0}");
    }

    #[test]
    fn mapping_is_stable() {
        assert_eq!(map_key("Enter"), map_key("Enter"));
        assert!(has_dedicated_token("Enter"));
    }
}
