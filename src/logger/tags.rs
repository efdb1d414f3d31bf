/// Log tags identifying the subsystem a message comes from
///
/// The debug key of a tag is what `--debug-<key>` flags and the
/// `logging.debug_tags` config list refer to.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Cache,
    Registry,
    Request,
    Transport,
    Other(String),
}

impl LogTag {
    /// Lowercase key used by command-line flags and config
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Cache => "cache".to_string(),
            LogTag::Registry => "registry".to_string(),
            LogTag::Request => "request".to_string(),
            LogTag::Transport => "transport".to_string(),
            LogTag::Other(name) => name.to_lowercase(),
        }
    }

    /// Uncolored label written to log files
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::Other(name) => name.to_uppercase(),
            other => other.to_debug_key().to_uppercase(),
        }
    }

    pub fn from_debug_key(key: &str) -> LogTag {
        match key.to_lowercase().as_str() {
            "system" => LogTag::System,
            "config" => LogTag::Config,
            "cache" => LogTag::Cache,
            "registry" => LogTag::Registry,
            "request" => LogTag::Request,
            "transport" => LogTag::Transport,
            other => LogTag::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
