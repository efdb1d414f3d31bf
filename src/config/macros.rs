/// Configuration macros for zero-repetition config definitions
///
/// `config_struct!` declares a configuration struct with its defaults inline:
///
/// ```
/// reqcache::config_struct! {
///     pub struct RetryConfig {
///         attempts: u32 = 3,
///         backoff_ms: u64 = 250,
///     }
/// }
///
/// let retry = RetryConfig::default();
/// assert_eq!(retry.attempts, 3);
/// ```
///
/// It generates public fields, a `Default` impl with the given values, and
/// serde derives with `#[serde(default)]` so partial TOML files fill the gaps.
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}
