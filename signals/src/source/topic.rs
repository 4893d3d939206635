/// Topic consumed when no explicit topic is configured.
pub const DEFAULT_TOPIC: &str = "projects/tapglue-signals/topics/test-events";

/// Resolves the topic the pipeline binds its source to.
///
/// Pure function of the explicit configuration value, no hidden process-wide
/// state: an explicit topic wins, otherwise [`DEFAULT_TOPIC`] is used.
pub fn resolve_topic(explicit: Option<&str>) -> String {
    match explicit {
        Some(topic) if !topic.is_empty() => topic.to_string(),
        _ => DEFAULT_TOPIC.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_topic_falls_back_to_default() {
        assert_eq!(resolve_topic(None), DEFAULT_TOPIC);
        assert_eq!(resolve_topic(Some("")), DEFAULT_TOPIC);
    }

    #[test]
    fn explicit_topic_wins() {
        assert_eq!(
            resolve_topic(Some("projects/tapglue-signals/topics/prod-events")),
            "projects/tapglue-signals/topics/prod-events"
        );
    }
}
