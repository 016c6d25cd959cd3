//! `{{placeholder}}` expansion for turn patterns.
//!
//! Patterns are expanded in a single left-to-right pass, so placeholder text
//! that appears inside substituted values (message content, system prompts) is
//! emitted verbatim and never expanded a second time.

/// Placeholder names understood by [`expand`].
pub(crate) const KNOWN_PLACEHOLDERS: [&str; 4] = ["role", "content", "system", "bos"];

/// Values substituted into a pattern. Unset values expand to the empty string.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Vars<'a> {
    pub role: &'a str,
    pub content: &'a str,
    pub system: &'a str,
    pub bos: &'a str,
}

impl<'a> Vars<'a> {
    fn get(&self, name: &str) -> Option<&'a str> {
        match name {
            "role" => Some(self.role),
            "content" => Some(self.content),
            "system" => Some(self.system),
            "bos" => Some(self.bos),
            _ => None,
        }
    }
}

/// Appends `pattern` to `out`, substituting every `{{name}}` with its value.
///
/// Unknown names expand to nothing; an unterminated `{{` is copied literally.
pub(crate) fn expand(pattern: &str, vars: &Vars<'_>, out: &mut String) {
    let mut rest = pattern;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return;
        };
        out.push_str(vars.get(after[..end].trim()).unwrap_or_default());
        rest = &after[end + 2..];
    }
    out.push_str(rest);
}

/// Convenience wrapper around [`expand`] returning a fresh string.
pub(crate) fn expand_to_string(pattern: &str, vars: &Vars<'_>) -> String {
    let mut out = String::with_capacity(pattern.len() + vars.content.len() + vars.system.len());
    expand(pattern, vars, &mut out);
    out
}

/// Extracts placeholder names referenced by a pattern, in order of appearance.
pub(crate) fn placeholders(pattern: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = pattern;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = after[..end].trim();
        if !name.is_empty() {
            names.push(name);
        }
        rest = &after[end + 2..];
    }
    names
}
