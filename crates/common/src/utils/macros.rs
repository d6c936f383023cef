//! Macros for reducing boilerplate code

/// Implements `Display` and `FromStr` for unit-only enums that have a
/// canonical lowercase string form.
///
/// Parsing is case-insensitive. Output is always the canonical string.
///
/// # Example
///
/// ```rust
/// use ebbflow_common::impl_status_conversions;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// pub enum Channel {
///     Primary,
///     Fallback,
/// }
///
/// impl_status_conversions!(Channel {
///     Primary => "primary",
///     Fallback => "fallback",
/// });
///
/// assert_eq!("PRIMARY".parse::<Channel>(), Ok(Channel::Primary));
/// assert_eq!(Channel::Fallback.to_string(), "fallback");
/// ```
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
