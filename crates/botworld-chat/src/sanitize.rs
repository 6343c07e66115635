//! Pure text transforms for bot-authored messages.
//!
//! Every message a bot speaks passes through [`sanitize_outgoing`] first.
//! The transform is idempotent: running it twice yields the same result
//! as running it once. A message that still carries prompt-template
//! markers after cleanup is discarded wholesale -- leaked internal
//! formatting must never reach players.

use botworld_types::SILENCE_TOKEN;

/// Bracketed section markers that indicate a planner/LLM leaked its
/// internal prompt formatting into the reply.
const SYSTEM_TAGS: &[&str] = &[
    "[inst]",
    "[/inst]",
    "[system]",
    "[/system]",
    "[assistant]",
    "[user]",
    "<<sys>>",
    "<</sys>>",
    "<|",
    "|>",
];

/// Sanitize an outgoing bot message.
///
/// Steps, in order:
/// 1. discard the whole message if it contains a system/delimiter tag;
/// 2. strip markdown code-fence markers;
/// 3. re-check for tag leakage uncovered by fence stripping and discard;
/// 4. strip symbol/emoji-range characters;
/// 5. strip the reserved silence token to a fixed point (removing one
///    occurrence can splice the surrounding text into another);
/// 6. trim. A stripping step can itself splice a tag together, so the
///    tag check runs once more on the final text.
///
/// A blank result means "say nothing".
pub fn sanitize_outgoing(message: &str) -> String {
    if contains_system_tag(message) {
        return String::new();
    }
    let cleaned = strip_code_fences(message);
    if contains_system_tag(&cleaned) {
        return String::new();
    }
    let mut cleaned = strip_symbols(&cleaned);
    loop {
        let stripped = cleaned.replace(SILENCE_TOKEN, "");
        if stripped == cleaned {
            break;
        }
        cleaned = stripped;
    }
    let cleaned = cleaned.trim().to_owned();
    if contains_system_tag(&cleaned) {
        return String::new();
    }
    cleaned
}

/// Whether the text contains a recognizable prompt-template marker.
fn contains_system_tag(text: &str) -> bool {
    let lower = text.to_lowercase();
    SYSTEM_TAGS.iter().any(|tag| lower.contains(tag))
}

/// Remove markdown code-fence markers, keeping the fenced content.
fn strip_code_fences(text: &str) -> String {
    text.replace("```", "")
}

/// Remove symbol-block and emoji-range characters.
///
/// Mirrors the `\p{So}\p{Cs}` class the hosting server rejects: arrows,
/// miscellaneous symbols, dingbats, the emoji planes, and variation
/// selectors.
fn strip_symbols(text: &str) -> String {
    text.chars().filter(|c| !is_symbolic(*c)).collect()
}

/// Whether a character falls in a stripped symbol range.
const fn is_symbolic(c: char) -> bool {
    matches!(
        c,
        '\u{2190}'..='\u{2BFF}'   // arrows, misc technical, misc symbols
        | '\u{FE00}'..='\u{FE0F}' // variation selectors
        | '\u{1F000}'..='\u{1FAFF}' // emoji planes
    )
}

/// Strip a bot's own name artifacts from the front of a planner message.
///
/// Planners occasionally echo the speaker back as `Name: ...`,
/// `:Name: ...`, or with a leading `[bot]` marker. All leading
/// occurrences are removed; the comparison is exact on the name.
pub fn strip_self_prefix(message: &str, bot_name: &str) -> String {
    let mut current = message.trim().to_owned();
    if bot_name.trim().is_empty() {
        return current;
    }
    let colon_wrapped = format!(":{bot_name}:");
    let plain = format!("{bot_name}:");
    loop {
        let lower = current.to_lowercase();
        let next = if lower.starts_with("[bot]") {
            current.get(5..).unwrap_or_default().trim().to_owned()
        } else if let Some(rest) = current.strip_prefix(&colon_wrapped) {
            rest.trim().to_owned()
        } else if let Some(rest) = current.strip_prefix(&plain) {
            rest.trim().to_owned()
        } else {
            return current;
        };
        current = next;
    }
}
