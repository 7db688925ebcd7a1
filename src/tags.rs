//! Tag normalization and the ordered-unique tag set editor

/// Canonical form of a tag: trimmed, lowercased, whitespace runs
/// collapsed to single hyphens. Empty input normalizes to empty.
pub fn normalize_tag(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Normalize a batch of raw tags, dropping empties and duplicates while
/// keeping first-occurrence order
pub fn normalize_set<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = Vec::new();
    for tag in raw {
        let cleaned = normalize_tag(tag.as_ref());
        if !cleaned.is_empty() && !seen.contains(&cleaned) {
            seen.push(cleaned);
        }
    }
    seen
}

/// Edit state for one breed's tag set: the accepted tags plus the text
/// being typed. Pure data; persistence goes through the catalog.
#[derive(Debug, Clone, Default)]
pub struct TagSetEditor {
    tags: Vec<String>,
    input: String,
}

impl TagSetEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set with tags loaded from a breed row
    pub fn load<I, S>(&mut self, existing: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_set(existing);
        self.input.clear();
    }

    /// Update the text being typed
    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Accept the current input as a tag. Empty or duplicate input is
    /// ignored; the buffer clears only when a tag was accepted.
    pub fn add_from_input(&mut self) -> bool {
        let input = self.input.clone();
        if self.add(&input) {
            self.input.clear();
            return true;
        }
        false
    }

    /// Add one tag, normalized. Returns whether the set changed.
    pub fn add(&mut self, raw: &str) -> bool {
        let cleaned = normalize_tag(raw);
        if cleaned.is_empty() || self.tags.contains(&cleaned) {
            return false;
        }
        self.tags.push(cleaned);
        true
    }

    /// Remove one tag by its normalized value
    pub fn remove(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }

    /// Remove the most recently added tag; backspace on an empty input
    pub fn remove_last(&mut self) -> Option<String> {
        self.tags.pop()
    }

    pub fn clear(&mut self) {
        self.tags.clear();
        self.input.clear();
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
