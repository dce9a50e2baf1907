//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use rollcall_core::{RosterView, User};
use serde_json::Value;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a filtered list of users
    ///
    /// `total` is the size of the unfiltered list.
    pub fn print_users(&self, users: &[&User], total: usize) {
        match self.format {
            OutputFormat::Human => {
                if users.is_empty() {
                    println!("No users found.");
                } else {
                    for user in users {
                        println!("{}", user_line(user));
                    }
                }
                if users.len() == total {
                    println!("\n{} user(s)", total);
                } else {
                    println!("\n{} of {} user(s)", users.len(), total);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(users).unwrap_or_default());
            }
            OutputFormat::Quiet => {
                for user in users {
                    println!("{}", user.id);
                }
            }
        }
    }

    /// Print the current state of a live view
    pub fn print_view(&self, view: &RosterView, query: &str) {
        let users = view.search(query);

        match self.format {
            OutputFormat::Human => {
                let updated = view
                    .updated_at
                    .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!();
                println!("── {} · updated {} ──", view.presence_message(), updated);
                self.print_users(&users, view.users.len());
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "revision": view.revision,
                        "online": view.presence,
                        "message": view.presence_message(),
                        "updated_at": view.updated_at,
                        "total": view.users.len(),
                        "users": users,
                    })
                );
            }
            OutputFormat::Quiet => {
                println!("{}", view.presence);
                for user in users {
                    println!("{}", user.id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// One line per user: short id, name, then scalar attributes
fn user_line(user: &User) -> String {
    let attributes: Vec<String> = user
        .extra
        .iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .filter_map(|(key, value)| scalar(value).map(|v| format!("{}={}", key, v)))
        .collect();

    let mut line = format!("{} | {}", short_id(&user.id), truncate(&user.name, 30));
    if !attributes.is_empty() {
        line.push_str(" | ");
        line.push_str(&truncate(&attributes.join(" "), 50));
    }
    line
}

/// Display form of a scalar JSON value
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Last eight characters of an id (Mongo ids differ at the end)
fn short_id(id: &str) -> String {
    let count = id.chars().count();
    id.chars().skip(count.saturating_sub(8)).collect()
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ééééééééééé", 5), "éé...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("5a1b2c3d4e5f60718293a4b5"), "8293a4b5");
        assert_eq!(short_id("42"), "42");
    }

    #[test]
    fn test_user_line() {
        let user = User::new("5a1b2c3d4e5f60718293a4b5", "Ann")
            .with_attribute("email", "ann@example.com")
            .with_attribute("age", 31)
            .with_attribute("__v", 0)
            .with_attribute("tags", serde_json::json!(["a"]));

        assert_eq!(
            user_line(&user),
            "8293a4b5 | Ann | age=31 email=ann@example.com"
        );
    }

    #[test]
    fn test_user_line_without_attributes() {
        assert_eq!(user_line(&User::new("1", "Bob")), "1 | Bob");
    }
}
