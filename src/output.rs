//! # Output Configuration
//!
//! This module provides utilities for controlling CLI output appearance,
//! including color and emoji support based on terminal capabilities and
//! user preferences.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use devsdk::output::{OutputConfig, emoji};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//!
//! println!("{} Building...", emoji(&config, "🔨", "[BUILD]"));
//! ```

use std::env;

use console::style;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, the plain text otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// One line of `devsdk list`: a `*` marks modules open for development.
pub fn module_line(config: &OutputConfig, name: &str, open: bool) -> String {
    match (open, config.use_color) {
        (true, true) => format!(" {} {}", style("*").green().bold(), style(name).bold()),
        (true, false) => format!(" * {}", name),
        (false, _) => format!("   {}", name),
    }
}

/// A message reporting that something finished well.
pub fn success(config: &OutputConfig, message: &str) -> String {
    let marker = emoji(config, "✅", "[OK]");
    if config.use_color {
        format!("{} {}", marker, style(message).green())
    } else {
        format!("{} {}", marker, message)
    }
}

/// A message reporting a problem that did not stop the command.
pub fn warning(config: &OutputConfig, message: &str) -> String {
    let marker = emoji(config, "⚠️ ", "[WARN]");
    if config.use_color {
        format!("{} {}", marker, style(message).yellow())
    } else {
        format!("{} {}", marker, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_color_always() {
        let config = OutputConfig::from_env_and_flag("always");
        assert!(config.use_color);
    }

    #[test]
    fn test_color_never() {
        let config = OutputConfig::from_env_and_flag("never");
        assert!(!config.use_color);
    }

    #[test]
    #[serial]
    fn test_no_color_disables_auto() {
        let previous = env::var_os("NO_COLOR");
        env::set_var("NO_COLOR", "");

        let config = OutputConfig::from_env_and_flag("auto");

        match previous {
            Some(value) => env::set_var("NO_COLOR", value),
            None => env::remove_var("NO_COLOR"),
        }
        assert!(!config.use_color);
    }

    #[test]
    #[serial]
    fn test_flag_beats_environment() {
        let previous = env::var_os("NO_COLOR");
        env::set_var("NO_COLOR", "1");

        let config = OutputConfig::from_env_and_flag("always");

        match previous {
            Some(value) => env::set_var("NO_COLOR", value),
            None => env::remove_var("NO_COLOR"),
        }
        assert!(config.use_color);
    }

    #[test]
    fn test_emoji_helper_with_color() {
        let config = OutputConfig::with_color();
        assert_eq!(emoji(&config, "🔨", "[BUILD]"), "🔨");
    }

    #[test]
    fn test_emoji_helper_without_color() {
        let config = OutputConfig::without_color();
        assert_eq!(emoji(&config, "🔨", "[BUILD]"), "[BUILD]");
    }

    #[test]
    fn test_module_line_plain() {
        let config = OutputConfig::without_color();
        assert_eq!(module_line(&config, "glib", true), " * glib");
        assert_eq!(module_line(&config, "gtk3", false), "   gtk3");
    }

    #[test]
    fn test_plain_messages_have_text_markers() {
        let config = OutputConfig::without_color();
        assert_eq!(success(&config, "Opened glib"), "[OK] Opened glib");
        assert_eq!(warning(&config, "offline"), "[WARN] offline");
    }
}
