/// Composes the full name of a series.
///
/// The full name is the base name with the prefix prepended, followed by the suffix of a
/// sub-metric separated with a dot. The prefix is prepended without a separator.
///
/// # Example
///
/// ```
/// use hawkular_reporter::compose;
///
/// assert_eq!(compose(None, "requests", None), "requests");
/// assert_eq!(compose(Some("app."), "requests", Some("5min")), "app.requests.5min");
/// ```
pub fn compose(prefix: Option<&str>, base_name: &str, suffix: Option<&str>) -> String {
    let prefix = prefix.unwrap_or_default();
    match suffix {
        Some(suffix) => format!("{prefix}{base_name}.{suffix}"),
        None => format!("{prefix}{base_name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose() {
        assert_eq!(compose(None, "my.gauge", None), "my.gauge");
        assert_eq!(compose(Some("prefix-"), "my.gauge", None), "prefix-my.gauge");
        assert_eq!(compose(None, "my.meter", Some("1min")), "my.meter.1min");
        assert_eq!(
            compose(Some("prefix-"), "my.timer", Some("999perc")),
            "prefix-my.timer.999perc"
        );
    }

    #[test]
    fn test_compose_empty_prefix() {
        assert_eq!(compose(Some(""), "x", Some("count")), "x.count");
    }
}
