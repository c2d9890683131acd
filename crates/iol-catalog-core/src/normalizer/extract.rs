//! Field extraction over a parsed catalog document.
//!
//! A [`Scope`] wraps one element and answers "try these candidate names in
//! order, return the first one that is present". Candidate names compare
//! case-insensitively and may be `/`-separated paths into nested elements
//! (e.g. `Haigis/a0`).

use roxmltree::Node;

/// One element of the catalog document that lookups are scoped to.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a, 'input> {
    node: Node<'a, 'input>,
}

impl<'a, 'input> Scope<'a, 'input> {
    pub fn new(node: Node<'a, 'input>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> Node<'a, 'input> {
        self.node
    }

    /// Local tag name of the scoped element.
    pub fn name(&self) -> &'a str {
        self.node.tag_name().name()
    }

    /// First child element matching any candidate, in candidate order.
    pub fn child<S: AsRef<str>>(&self, candidates: &[S]) -> Option<Scope<'a, 'input>> {
        candidates
            .iter()
            .find_map(|c| self.resolve_path(c.as_ref()))
    }

    /// All direct child elements matching any candidate, in document order.
    pub fn children<S: AsRef<str>>(&self, candidates: &[S]) -> Vec<Scope<'a, 'input>> {
        self.node
            .children()
            .filter(|n| n.is_element())
            .filter(|n| candidates.iter().any(|c| tag_matches(n, c.as_ref())))
            .map(Scope::new)
            .collect()
    }

    /// All descendant elements (excluding self) matching any candidate.
    pub fn descendants<S: AsRef<str>>(&self, candidates: &[S]) -> Vec<Scope<'a, 'input>> {
        self.node
            .descendants()
            .skip(1)
            .filter(|n| n.is_element())
            .filter(|n| candidates.iter().any(|c| tag_matches(n, c.as_ref())))
            .map(Scope::new)
            .collect()
    }

    /// Text of the first candidate child with non-empty text.
    ///
    /// Once a candidate yields a value, later candidates are never consulted.
    pub fn text<S: AsRef<str>>(&self, candidates: &[S]) -> Option<&'a str> {
        candidates.iter().find_map(|c| {
            self.resolve_path(c.as_ref())
                .and_then(|scope| scope.own_text())
        })
    }

    /// First attribute matching any candidate name with a non-empty value.
    pub fn attribute<S: AsRef<str>>(&self, candidates: &[S]) -> Option<&'a str> {
        candidates.iter().find_map(|c| {
            self.node
                .attributes()
                .find(|a| a.name().eq_ignore_ascii_case(c.as_ref()))
                .map(|a| a.value().trim())
                .filter(|v| !v.is_empty())
        })
    }

    /// Trimmed text content of this element, `None` when blank.
    pub fn own_text(&self) -> Option<&'a str> {
        self.node
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    fn resolve_path(&self, path: &str) -> Option<Scope<'a, 'input>> {
        let mut current = self.node;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .children()
                .find(|n| n.is_element() && tag_matches(n, segment))?;
        }
        if current == self.node {
            return None;
        }
        Some(Scope::new(current))
    }
}

fn tag_matches(node: &Node<'_, '_>, candidate: &str) -> bool {
    node.tag_name().name().eq_ignore_ascii_case(candidate)
}

/// Parse a catalog number. Accepts a decimal comma; rejects non-finite values.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse a catalog yes/no flag.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" | "y" => Some(true),
        "no" | "false" | "0" | "n" => Some(false),
        _ => None,
    }
}
