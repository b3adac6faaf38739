//! # Key Chords and Bindings
//!
//! Chords are written by callers in many shapes (`Mod-b`, `ctrl+B`,
//! `Shift-Ctrl-1`). Every chord is normalized to one canonical form before it
//! is stored or looked up:
//!
//! ```text
//! Ctrl+Alt+Shift+Meta+Key
//! ```
//!
//! Modifiers appear in that fixed order, single-character keys are
//! upper-cased and named keys use their canonical spelling (`Enter`,
//! `Backspace`, `ArrowUp`, ...). `Mod` means `Ctrl`, or `Meta` when the
//! editor runs with Mac key conventions.

use crate::errors::EditorError;
use std::collections::BTreeMap;
use tracing::debug;

const NAMED_KEYS: &[(&str, &str)] = &[
    ("enter", "Enter"),
    ("return", "Enter"),
    ("backspace", "Backspace"),
    ("tab", "Tab"),
    ("escape", "Escape"),
    ("esc", "Escape"),
    ("space", "Space"),
    ("delete", "Delete"),
    ("del", "Delete"),
    ("arrowup", "ArrowUp"),
    ("up", "ArrowUp"),
    ("arrowdown", "ArrowDown"),
    ("down", "ArrowDown"),
    ("arrowleft", "ArrowLeft"),
    ("left", "ArrowLeft"),
    ("arrowright", "ArrowRight"),
    ("right", "ArrowRight"),
    ("home", "Home"),
    ("end", "End"),
    ("pageup", "PageUp"),
    ("pagedown", "PageDown"),
];

#[derive(Debug, Default, Clone, Copy)]
struct Modifiers {
    ctrl: bool,
    alt: bool,
    shift: bool,
    meta: bool,
}

/// Normalize a chord to `Ctrl+Alt+Shift+Meta+Key` form
pub fn normalize_chord(chord: &str, mac: bool) -> Result<String, EditorError> {
    let invalid = || EditorError::invalid_argument(format!("invalid key chord '{chord}'"));
    let chord = chord.trim();
    if chord.is_empty() {
        return Err(invalid());
    }

    // A trailing separator is the key itself ("Ctrl+-", "Mod-+")
    let (prefix, key) = match chord.char_indices().rev().nth(1) {
        Some((i, c)) if c == '-' || c == '+' => {
            let key_start = i + c.len_utf8();
            (&chord[..i], &chord[key_start..])
        }
        _ => match chord.rfind(['-', '+']) {
            Some(i) if i + 1 < chord.len() => (&chord[..i], &chord[i + 1..]),
            _ => ("", chord),
        },
    };

    let mut modifiers = Modifiers::default();
    if !prefix.is_empty() {
        for part in prefix.split(['-', '+']) {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" | "c" => modifiers.ctrl = true,
                "alt" | "option" | "opt" | "a" => modifiers.alt = true,
                "shift" | "s" => modifiers.shift = true,
                "meta" | "cmd" | "command" | "super" | "m" => modifiers.meta = true,
                "mod" => {
                    if mac {
                        modifiers.meta = true;
                    } else {
                        modifiers.ctrl = true;
                    }
                }
                _ => return Err(invalid()),
            }
        }
    }

    let key = normalize_key(key).ok_or_else(invalid)?;

    let mut parts = Vec::with_capacity(5);
    if modifiers.ctrl {
        parts.push("Ctrl");
    }
    if modifiers.alt {
        parts.push("Alt");
    }
    if modifiers.shift {
        parts.push("Shift");
    }
    if modifiers.meta {
        parts.push("Meta");
    }
    parts.push(&key);
    Ok(parts.join("+"))
}

fn normalize_key(key: &str) -> Option<String> {
    let mut chars = key.chars();
    let first = chars.next()?;
    if chars.next().is_none() {
        return Some(first.to_uppercase().collect());
    }
    let lower = key.to_ascii_lowercase();
    if let Some((_, named)) = NAMED_KEYS.iter().find(|(alias, _)| *alias == lower) {
        return Some((*named).to_string());
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    // F-keys and anything else: capitalized
    let mut out: String = first.to_uppercase().collect();
    out.push_str(&key[first.len_utf8()..]);
    Some(out)
}

/// Resolved chords for every command, in command order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyBindings {
    bindings: Vec<(String, Vec<String>)>,
}

impl KeyBindings {
    /// Combine command defaults with caller overrides.
    ///
    /// - An override replaces the command's defaults outright
    /// - A chord claimed by an override is taken away from every other
    ///   command
    /// - Overrides naming unknown commands are ignored
    ///
    /// `commands` pairs each command id with its default chords.
    pub fn resolve(
        commands: &[(String, Vec<String>)],
        overrides: &BTreeMap<String, Vec<String>>,
        mac: bool,
    ) -> Result<Self, EditorError> {
        for id in overrides.keys() {
            if !commands.iter().any(|(cmd, _)| cmd == id) {
                debug!(command = %id, "ignoring key binding for unknown command");
            }
        }

        let mut claimed = Vec::new();
        for (id, chords) in overrides {
            if commands.iter().any(|(cmd, _)| cmd == id) {
                for chord in chords {
                    claimed.push(normalize_chord(chord, mac)?);
                }
            }
        }

        let mut bindings = Vec::with_capacity(commands.len());
        for (id, defaults) in commands {
            let chords = match overrides.get(id) {
                Some(custom) => custom
                    .iter()
                    .map(|c| normalize_chord(c, mac))
                    .collect::<Result<Vec<_>, _>>()?,
                None => defaults
                    .iter()
                    .map(|c| normalize_chord(c, mac))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .filter(|c| !claimed.contains(c))
                    .collect(),
            };
            let mut unique = Vec::with_capacity(chords.len());
            for chord in chords {
                if !unique.contains(&chord) {
                    unique.push(chord);
                }
            }
            bindings.push((id.clone(), unique));
        }
        Ok(Self { bindings })
    }

    /// Chords bound to a command
    pub fn keys_for(&self, id: &str) -> &[String] {
        self.bindings
            .iter()
            .find(|(cmd, _)| cmd == id)
            .map(|(_, chords)| chords.as_slice())
            .unwrap_or(&[])
    }

    /// The command a normalized chord triggers; the first command claiming
    /// it wins
    pub fn command_for(&self, chord: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, chords)| chords.iter().any(|c| c == chord))
            .map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.bindings.iter().map(|(id, chords)| (id.as_str(), chords.as_slice()))
    }
}
