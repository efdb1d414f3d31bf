/// Request parameters and URL helpers
use serde_json::Value;

/// Parameter mapping sent with a request; values keep their JSON types
pub type Parameters = serde_json::Map<String, Value>;

/// Insert every entry of `right` into `left`, overwriting equal keys
pub fn merge_parameters(left: &mut Parameters, right: Parameters) {
    for (key, value) in right {
        left.insert(key, value);
    }
}

/// Flatten parameters to string pairs for query strings and form bodies
///
/// Strings go out unquoted, null as an empty value, everything else as
/// compact JSON.
pub fn parameter_pairs(parameters: &Parameters) -> Vec<(String, String)> {
    parameters
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

/// Join a base URL and a path with exactly one `/` between them
pub fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// True when `target` already names a scheme (`https://...`)
pub fn has_scheme(target: &str) -> bool {
    target.contains("://") && url::Url::parse(target).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_url_normalizes_slashes() {
        assert_eq!(join_url("http://a.test/", "/users"), "http://a.test/users");
        assert_eq!(join_url("http://a.test", "users"), "http://a.test/users");
        assert_eq!(join_url("http://a.test/", "users"), "http://a.test/users");
        assert_eq!(join_url("http://a.test", "/users"), "http://a.test/users");
        assert_eq!(join_url("http://a.test/v1", ""), "http://a.test/v1/");
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("https://api.example.com/users"));
        assert!(has_scheme("http://localhost:8080"));
        assert!(!has_scheme("/users"));
        assert!(!has_scheme("users/5"));
    }

    #[test]
    fn test_parameter_pairs_render_values() {
        let mut params = Parameters::new();
        params.insert("name".into(), json!("A"));
        params.insert("id".into(), json!(5));
        params.insert("flag".into(), json!(true));
        params.insert("none".into(), Value::Null);

        let pairs = parameter_pairs(&params);
        assert!(pairs.contains(&("name".to_string(), "A".to_string())));
        assert!(pairs.contains(&("id".to_string(), "5".to_string())));
        assert!(pairs.contains(&("flag".to_string(), "true".to_string())));
        assert!(pairs.contains(&("none".to_string(), String::new())));
    }

    #[test]
    fn test_merge_overwrites() {
        let mut left = Parameters::new();
        left.insert("a".into(), json!(1));
        left.insert("b".into(), json!(2));
        let mut right = Parameters::new();
        right.insert("b".into(), json!(3));
        right.insert("c".into(), json!(4));

        merge_parameters(&mut left, right);
        assert_eq!(Value::Object(left), json!({"a": 1, "b": 3, "c": 4}));
    }
}
