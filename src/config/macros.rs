/// Configuration macros for zero-repetition config definitions
///
/// `config_struct!` declares a configuration section with its defaults
/// embedded next to each field. It generates:
/// - The struct with public fields
/// - The Default implementation
/// - Serde support with `#[serde(default)]`, so partial TOML files work
///
/// # Example
/// ```
/// channelcast::config_struct! {
///     pub struct LimitsConfig {
///         max_event_length: usize = 64,
///         strict: bool = true,
///     }
/// }
///
/// let limits = LimitsConfig::default();
/// assert_eq!(limits.max_event_length, 64);
/// ```
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
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
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
