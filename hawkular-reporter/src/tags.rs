use std::collections::{BTreeMap, HashMap};

use regex::Regex;

use crate::config::ReporterConfig;

/// Tag keys and values of a series, ordered by key.
pub type Tags = BTreeMap<String, String>;

/// A tag pattern that could not be compiled.
#[derive(Debug, thiserror::Error)]
#[error("invalid tag pattern {pattern:?}")]
pub struct TagRuleError {
    pattern: String,
    #[source]
    source: regex::Error,
}

impl TagRuleError {
    /// Returns the pattern that failed to compile.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

#[derive(Clone, Debug)]
struct PatternRule {
    regex: Regex,
    tags: Tags,
}

/// Returns the regular expression of a name of the form `/regex/`.
fn slash_pattern(name: &str) -> Option<&str> {
    name.strip_prefix('/')?.strip_suffix('/')
}

/// Global, exact and pattern tag rules.
///
/// Tags of a series are resolved by applying, in this order, the global tags, the automatic tag
/// of a composite instrument, all matching pattern rules in the order they were added, the exact
/// rule of the base name, and the exact rule of the sub-metric name. Later sources override
/// earlier ones on conflicting keys.
///
/// Rules are matched against names without the configured prefix.
#[derive(Clone, Debug)]
pub struct TagRules {
    global: Tags,
    exact: HashMap<String, Tags>,
    patterns: Vec<PatternRule>,
    auto_tagging: bool,
}

impl TagRules {
    /// Creates an empty rule set with automatic tagging enabled.
    pub fn new() -> Self {
        Self {
            global: Tags::new(),
            exact: HashMap::new(),
            patterns: Vec::new(),
            auto_tagging: true,
        }
    }

    /// Builds the rule set from configuration.
    ///
    /// Patterns that fail to compile are logged and skipped. Use [`TagRules::check_config`] to
    /// obtain these errors instead.
    pub fn from_config(config: &ReporterConfig) -> Self {
        let (rules, errors) = Self::build(config);

        for error in errors {
            hawkular_log::error!(
                error = &error as &dyn std::error::Error,
                pattern = error.pattern(),
                "dropping tag rule with invalid pattern"
            );
        }

        rules
    }

    /// Returns all errors of the tag rules in the given configuration.
    pub fn check_config(config: &ReporterConfig) -> Vec<TagRuleError> {
        Self::build(config).1
    }

    fn build(config: &ReporterConfig) -> (Self, Vec<TagRuleError>) {
        let mut rules = Self::new();
        let mut errors = Vec::new();

        rules.set_global_tags(config.global_tags.clone());
        rules.set_auto_tagging(config.auto_tagging);

        for (name, tags) in &config.per_metric_tags {
            if let Err(error) = rules.set_exact_tags(name, tags.clone()) {
                errors.push(error);
            }
        }

        for rule in &config.pattern_tags {
            if let Err(error) = rules.set_pattern_tags(&rule.pattern, rule.tags.clone()) {
                errors.push(error);
            }
        }

        (rules, errors)
    }

    /// Replaces all global tags.
    pub fn set_global_tags(&mut self, tags: Tags) {
        self.global = tags;
    }

    /// Enables or disables automatic tags of composite instruments.
    pub fn set_auto_tagging(&mut self, enabled: bool) {
        self.auto_tagging = enabled;
    }

    /// Returns `true` if automatic tags of composite instruments are applied.
    pub fn auto_tagging(&self) -> bool {
        self.auto_tagging
    }

    /// Adds a tag to the series with the given base or sub-metric name.
    ///
    /// A name wrapped in slashes, such as `/^db\./`, is a pattern and adds a pattern rule instead.
    pub fn add_exact_tag(
        &mut self,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), TagRuleError> {
        let tags = Tags::from([(key.to_owned(), value.to_owned())]);

        match slash_pattern(name) {
            Some(pattern) => self.set_pattern_tags(pattern, tags),
            None => {
                self.exact.entry(name.to_owned()).or_default().extend(tags);
                Ok(())
            }
        }
    }

    /// Replaces the tags of the series with the given base or sub-metric name.
    ///
    /// A name wrapped in slashes, such as `/^db\./`, is a pattern and adds a pattern rule instead.
    pub fn set_exact_tags(&mut self, name: &str, tags: Tags) -> Result<(), TagRuleError> {
        match slash_pattern(name) {
            Some(pattern) => self.set_pattern_tags(pattern, tags),
            None => {
                self.exact.insert(name.to_owned(), tags);
                Ok(())
            }
        }
    }

    /// Adds a tag to every series whose name matches the pattern.
    pub fn add_pattern_tag(
        &mut self,
        pattern: &str,
        key: &str,
        value: &str,
    ) -> Result<(), TagRuleError> {
        let tags = Tags::from([(key.to_owned(), value.to_owned())]);
        self.set_pattern_tags(pattern, tags)
    }

    /// Adds a rule applying `tags` to every series whose name matches the pattern.
    ///
    /// The pattern matches anywhere within the name unless anchored with `^` or `$`. On error, no
    /// rule is added.
    pub fn set_pattern_tags(&mut self, pattern: &str, tags: Tags) -> Result<(), TagRuleError> {
        let regex = Regex::new(pattern).map_err(|source| TagRuleError {
            pattern: pattern.to_owned(),
            source,
        })?;

        self.patterns.push(PatternRule { regex, tags });
        Ok(())
    }

    /// Resolves the tags of a series.
    ///
    /// `suffix` is the suffix of a sub-metric of a composite instrument, and `auto_tag` its
    /// automatic tag, which is ignored if automatic tagging is disabled. Returns an empty map if
    /// no rule applies.
    pub fn resolve(
        &self,
        base_name: &str,
        suffix: Option<&str>,
        auto_tag: Option<(&str, &str)>,
    ) -> Tags {
        let mut tags = self.global.clone();

        if self.auto_tagging
            && let Some((key, value)) = auto_tag
        {
            tags.insert(key.to_owned(), value.to_owned());
        }

        let sub_name = suffix.map(|suffix| format!("{base_name}.{suffix}"));

        for rule in &self.patterns {
            let matches = rule.regex.is_match(base_name)
                || sub_name.as_deref().is_some_and(|name| rule.regex.is_match(name));

            if matches {
                tags.extend(rule.tags.clone());
            }
        }

        if let Some(exact) = self.exact.get(base_name) {
            tags.extend(exact.clone());
        }

        if let Some(exact) = sub_name.as_deref().and_then(|name| self.exact.get(name)) {
            tags.extend(exact.clone());
        }

        tags
    }
}

impl Default for TagRules {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use crate::config::PatternTagConfig;

    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_resolve_empty() {
        let rules = TagRules::new();
        assert!(rules.resolve("my.counter", None, None).is_empty());
    }

    #[test]
    fn test_resolve_global_and_exact() {
        let mut rules = TagRules::new();
        rules.set_global_tags(tags(&[("global-tag", "abc")]));
        rules.add_exact_tag("my.second.counter", "metric-tag", "def").unwrap();

        assert_eq!(
            rules.resolve("my.first.counter", None, None),
            tags(&[("global-tag", "abc")])
        );
        assert_eq!(
            rules.resolve("my.second.counter", None, None),
            tags(&[("global-tag", "abc"), ("metric-tag", "def")])
        );
    }

    #[test]
    fn test_resolve_precedence() {
        let mut rules = TagRules::new();
        rules.set_global_tags(tags(&[("a", "global"), ("b", "global"), ("meter", "global")]));
        rules.add_pattern_tag("my", "a", "pattern").unwrap();
        rules.add_pattern_tag("my", "b", "pattern").unwrap();
        rules.add_exact_tag("my.meter", "b", "exact").unwrap();
        rules.add_exact_tag("my.meter.5min", "c", "sub").unwrap();

        assert_eq!(
            rules.resolve("my.meter", Some("5min"), Some(("meter", "5min"))),
            tags(&[("a", "pattern"), ("b", "exact"), ("c", "sub"), ("meter", "5min")])
        );
    }

    #[test]
    fn test_exact_rule_overrides_auto_tag() {
        let mut rules = TagRules::new();
        rules.add_exact_tag("my.histogram", "histogram", "custom").unwrap();

        assert_eq!(
            rules.resolve("my.histogram", Some("max"), Some(("histogram", "max"))),
            tags(&[("histogram", "custom")])
        );
    }

    #[test]
    fn test_auto_tagging_disabled() {
        let mut rules = TagRules::new();
        rules.set_auto_tagging(false);

        assert!(
            rules
                .resolve("my.timer", Some("mean"), Some(("timer", "mean")))
                .is_empty()
        );
    }

    #[test]
    fn test_pattern_contains_match() {
        let mut rules = TagRules::new();
        rules.add_pattern_tag("cache", "group", "cache").unwrap();
        rules.add_pattern_tag("^db\\.", "group", "db").unwrap();

        assert_eq!(
            rules.resolve("app.cache.hits", None, None),
            tags(&[("group", "cache")])
        );
        assert_eq!(rules.resolve("db.queries", None, None), tags(&[("group", "db")]));
        assert!(rules.resolve("app.db.queries", None, None).is_empty());
    }

    #[test]
    fn test_pattern_matches_sub_metric() {
        let mut rules = TagRules::new();
        rules.add_pattern_tag("\\.99perc$", "slo", "yes").unwrap();

        assert!(rules.resolve("my.timer", Some("mean"), None).is_empty());
        assert_eq!(
            rules.resolve("my.timer", Some("99perc"), None),
            tags(&[("slo", "yes")])
        );
    }

    #[test]
    fn test_slash_name_adds_pattern() {
        let mut rules = TagRules::new();
        rules
            .set_exact_tags("/^some[\\s]regex$/", tags(&[("k", "v")]))
            .unwrap();

        assert_eq!(rules.resolve("some\tregex", None, None), tags(&[("k", "v")]));
        assert!(
            rules
                .resolve("some\tregex\tnot\tmatching", None, None)
                .is_empty()
        );
    }

    #[test]
    fn test_invalid_pattern_dropped() {
        let mut rules = TagRules::new();
        let error = rules.add_exact_tag("/(won't compile/", "k", "v").unwrap_err();

        assert_eq!(error.pattern(), "(won't compile");
        assert_eq!(error.to_string(), r#"invalid tag pattern "(won't compile""#);
        assert!(rules.resolve("(won't compile", None, None).is_empty());
    }

    #[test]
    fn test_prefix_not_used_for_lookup() {
        let mut rules = TagRules::new();
        rules.add_exact_tag("prefix-my.gauge", "k", "v").unwrap();

        assert!(rules.resolve("my.gauge", None, None).is_empty());
    }

    #[test]
    fn test_from_config_skips_invalid() {
        hawkular_log::init_test!();

        let config = ReporterConfig {
            global_tags: tags(&[("env", "test")]),
            per_metric_tags: BTreeMap::from([
                ("my.counter".to_owned(), tags(&[("k", "exact")])),
                ("/[/".to_owned(), tags(&[("k", "broken")])),
            ]),
            pattern_tags: vec![
                PatternTagConfig {
                    pattern: "counter$".to_owned(),
                    tags: tags(&[("kind", "counter")]),
                },
                PatternTagConfig {
                    pattern: "(".to_owned(),
                    tags: tags(&[("kind", "broken")]),
                },
            ],
            ..Default::default()
        };

        let errors = TagRules::check_config(&config);
        let patterns: Vec<_> = errors.iter().map(TagRuleError::pattern).collect();
        assert_eq!(patterns, vec!["[", "("]);

        let rules = TagRules::from_config(&config);
        assert_eq!(
            rules.resolve("my.counter", None, None),
            tags(&[("env", "test"), ("k", "exact"), ("kind", "counter")])
        );
    }
}
