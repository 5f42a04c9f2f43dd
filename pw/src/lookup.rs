//! Read-only link resolution for standards and curricula names
//!
//! Generated plans mention standards and curricula by name; this table
//! resolves the names the model actually produces (case and punctuation
//! vary) to canonical display links for export.

use std::collections::BTreeMap;

/// Built-in standards frameworks and their reference pages
const STANDARD_LINKS: &[(&str, &str)] = &[
    ("csta", "https://csteachers.org/k12standards/"),
    ("iste", "https://iste.org/standards"),
    ("k12cs", "https://k12cs.org/"),
    ("ap computer science principles", "https://apcentral.collegeboard.org/courses/ap-computer-science-principles"),
    ("ap computer science a", "https://apcentral.collegeboard.org/courses/ap-computer-science-a"),
];

/// Built-in curriculum products and their home pages
const CURRICULUM_LINKS: &[(&str, &str)] = &[
    ("cs discoveries", "https://code.org/educate/csd"),
    ("cs fundamentals", "https://code.org/educate/curriculum/elementary-school"),
    ("cs principles", "https://code.org/educate/csp"),
    ("bootstrap algebra", "https://bootstrapworld.org/materials/algebra/"),
    ("exploring computer science", "http://www.exploringcs.org/"),
    ("project stem", "https://projectstem.org/"),
    ("cmu cs academy", "https://academy.cs.cmu.edu/"),
];

/// Name-to-URL resolution over a normalized key table
///
/// Exact normalized match wins; otherwise the first entry whose key is
/// contained in the query (or vice versa) is used, so "CSTA 2-AP-11"
/// resolves through the "csta" framework entry.
pub struct StandardsLookup {
    entries: BTreeMap<String, String>,
}

impl StandardsLookup {
    /// Table with the built-in frameworks and curricula
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        for (name, url) in STANDARD_LINKS.iter().chain(CURRICULUM_LINKS) {
            entries.insert(normalize(name), (*url).to_string());
        }
        Self { entries }
    }

    #[cfg(test)]
    fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace an entry
    pub fn insert(&mut self, name: &str, url: impl Into<String>) {
        self.entries.insert(normalize(name), url.into());
    }

    /// Resolve a name to a link, or None when nothing plausibly matches
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let key = normalize(name);
        if key.is_empty() {
            return None;
        }
        if let Some(url) = self.entries.get(&key) {
            return Some(url);
        }
        self.entries
            .iter()
            .find(|(k, _)| key.contains(k.as_str()) || k.contains(key.as_str()))
            .map(|(_, url)| url.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StandardsLookup {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lowercase, alphanumerics and spaces only, runs of spaces collapsed
fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_space = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}
