//! Name matching and output-name rewriting for rule-driven analyzers.

use regex::Regex;

use crate::config::GenericConfig;
use crate::error::AnalyzerError;

/// Compiled form of the matching rules in a [`GenericConfig`].
#[derive(Debug, Clone, Default)]
pub struct MatchRules {
    names: Vec<String>,
    startswith: Vec<String>,
    contains: Vec<String>,
    expected: Vec<String>,
    regex: Vec<Regex>,
    strip: Vec<String>,
}

impl MatchRules {
    /// Compile the rules of one analyzer.
    ///
    /// Regexes are anchored so they must match the whole name. `path` is only
    /// used for error messages.
    pub fn compile(path: &str, config: &GenericConfig) -> Result<Self, AnalyzerError> {
        let regex = config
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
                    AnalyzerError::InvalidRegex {
                        path: path.to_string(),
                        pattern: pattern.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut startswith = config.startswith.clone();
        startswith.extend(config.find_and_remove_prefix.iter().cloned());

        let mut strip = config.find_and_remove_prefix.clone();
        strip.extend(config.remove_prefix.iter().cloned());

        let rules = Self {
            names: config.name.clone(),
            startswith,
            contains: config.contains.clone(),
            expected: config.expected.clone(),
            regex,
            strip,
        };

        if !rules.can_claim() {
            return Err(AnalyzerError::NoMatchRules(path.to_string()));
        }
        Ok(rules)
    }

    /// True if some rule could ever accept a name.
    pub fn can_claim(&self) -> bool {
        !(self.names.is_empty()
            && self.startswith.is_empty()
            && self.contains.is_empty()
            && self.expected.is_empty()
            && self.regex.is_empty())
    }

    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
            || self.expected.iter().any(|n| n == name)
            || self.startswith.iter().any(|p| name.starts_with(p.as_str()))
            || self.contains.iter().any(|s| name.contains(s.as_str()))
            || self.regex.iter().any(|r| r.is_match(name))
    }

    /// Name the item is published under.
    ///
    /// Strips the first matching prefix, then one `:` and one space. A name
    /// that would become empty is kept as is.
    pub fn output_name<'a>(&self, name: &'a str) -> &'a str {
        let Some(rest) = self
            .strip
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix.as_str()))
        else {
            return name;
        };

        let rest = rest.strip_prefix(':').unwrap_or(rest);
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        if rest.is_empty() {
            name
        } else {
            rest
        }
    }

    /// Names pre-created as "Missing" until they report.
    pub fn expected(&self) -> &[String] {
        &self.expected
    }
}
