use regex::Regex;

use crate::config::FilterConfig;

/// A filter pattern that could not be compiled.
#[derive(Debug, thiserror::Error)]
#[error("invalid filter pattern {pattern:?}")]
pub struct FilterError {
    pattern: String,
    #[source]
    source: regex::Error,
}

impl FilterError {
    /// Returns the pattern that failed to compile.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Selects the instruments of a registry that are reported.
///
/// An instrument is reported if its name matches any include pattern, or if there are no include
/// patterns, and it matches no exclude pattern. Patterns match anywhere within the registry name,
/// which does not contain the prefix.
#[derive(Clone, Debug, Default)]
pub struct MetricFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl MetricFilter {
    /// Creates a filter that reports all instruments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the filter from configuration.
    ///
    /// Patterns that fail to compile are logged and skipped. Use [`MetricFilter::check_config`]
    /// to obtain these errors instead.
    pub fn from_config(config: &FilterConfig) -> Self {
        let (filter, errors) = Self::build(config);

        for error in errors {
            hawkular_log::error!(
                error = &error as &dyn std::error::Error,
                pattern = error.pattern(),
                "dropping filter with invalid pattern"
            );
        }

        filter
    }

    /// Returns all errors of the filter patterns in the given configuration.
    pub fn check_config(config: &FilterConfig) -> Vec<FilterError> {
        Self::build(config).1
    }

    fn build(config: &FilterConfig) -> (Self, Vec<FilterError>) {
        let mut filter = Self::new();
        let mut errors = Vec::new();

        for pattern in &config.include {
            if let Err(error) = filter.include(pattern) {
                errors.push(error);
            }
        }

        for pattern in &config.exclude {
            if let Err(error) = filter.exclude(pattern) {
                errors.push(error);
            }
        }

        (filter, errors)
    }

    /// Adds a pattern of instrument names to report.
    pub fn include(&mut self, pattern: &str) -> Result<(), FilterError> {
        self.include.push(compile(pattern)?);
        Ok(())
    }

    /// Adds a pattern of instrument names never to report.
    pub fn exclude(&mut self, pattern: &str) -> Result<(), FilterError> {
        self.exclude.push(compile(pattern)?);
        Ok(())
    }

    /// Returns `true` if the instrument with the given registry name is reported.
    pub fn matches(&self, name: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|r| r.is_match(name));
        included && !self.exclude.iter().any(|r| r.is_match(name))
    }
}

fn compile(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(pattern).map_err(|source| FilterError {
        pattern: pattern.to_owned(),
        source,
    })
}
