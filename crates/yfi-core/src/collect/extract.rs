//! Fact extraction from raw command output.

use regex::Regex;

/// An ordered list of compiled extraction patterns.
///
/// For each pattern, in order, every non-overlapping match contributes one
/// line: capture group 1 when the pattern has groups (empty if the group did
/// not participate), the whole match otherwise.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile patterns, failing on the first invalid one.
    pub fn compile<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PatternSet { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Newline-joined matches of every pattern, in declaration order.
    pub fn extract(&self, text: &str) -> String {
        self.matches(text).join("\n")
    }

    /// Matches of every pattern, in declaration order.
    pub fn matches<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.patterns
            .iter()
            .flat_map(|re| find_all(re, text))
            .collect()
    }
}

/// All matches of one pattern, group 1 when it has groups.
pub fn find_all<'t>(re: &Regex, text: &'t str) -> Vec<&'t str> {
    if re.captures_len() > 1 {
        re.captures_iter(text)
            .map(|caps| caps.get(1).map_or("", |m| m.as_str()))
            .collect()
    } else {
        re.find_iter(text).map(|m| m.as_str()).collect()
    }
}
