//! Navigation-link role matching.
//!
//! APOD marks its navigation anchors with literal glyphs: "<" for the
//! previous day, ">" for the next, and a "Discuss" label whose target
//! carries the page's own date. Matching on visible text is fragile to
//! upstream markup changes, so the rules live in a small ordered table
//! that can be swapped without touching the traversal code.

/// Role a navigation anchor plays on a dated page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// Link to the chronologically previous day.
    Prev,
    /// Link to the chronologically next day.
    Next,
    /// Link to the discussion page; its target names the current date.
    Discuss,
}

/// Ordered visible-text → role rules. First matching rule wins.
#[derive(Debug, Clone)]
pub struct LinkMatcher {
    rules: Vec<(String, LinkRole)>,
}

impl Default for LinkMatcher {
    fn default() -> Self {
        Self::new(vec![
            ("<".to_string(), LinkRole::Prev),
            (">".to_string(), LinkRole::Next),
            ("Discuss".to_string(), LinkRole::Discuss),
        ])
    }
}

impl LinkMatcher {
    pub fn new(rules: Vec<(String, LinkRole)>) -> Self {
        Self { rules }
    }

    /// Classify an anchor by its visible text, trimmed.
    pub fn role_for(&self, visible_text: &str) -> Option<LinkRole> {
        let text = visible_text.trim();
        self.rules
            .iter()
            .find(|(pattern, _)| pattern == text)
            .map(|(_, role)| *role)
    }
}
