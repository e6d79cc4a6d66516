//! Rule matcher: decides whether a policy entry covers a tool call.
//!
//! Two entry shapes are understood:
//! - an exact tool name, e.g. `Read`
//! - a command-prefix wildcard, e.g. `Bash(git status:*)`, which covers the
//!   named tool when its command starts with the literal prefix

/// A parsed policy entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEntry {
    Exact(String),
    CommandPrefix { tool: String, prefix: String },
}

impl PolicyEntry {
    /// Parse an entry. Anything that is not a well-formed `Tool(prefix:*)`
    /// is an exact name.
    pub fn parse(entry: &str) -> Self {
        if let Some((tool, prefix)) = entry
            .strip_suffix(":*)")
            .and_then(|inner| inner.split_once('('))
        {
            if !tool.is_empty() && !prefix.is_empty() {
                return Self::CommandPrefix {
                    tool: tool.to_string(),
                    prefix: prefix.to_string(),
                };
            }
        }
        Self::Exact(entry.to_string())
    }
}

/// Evaluates policy entries against tool calls.
pub struct RuleMatcher;

impl RuleMatcher {
    /// Check if `entry` matches the given tool name and input.
    ///
    /// Never panics; malformed entries simply do not match.
    pub fn matches(entry: &str, tool_name: &str, tool_input: &serde_json::Value) -> bool {
        if entry.is_empty() || tool_name.is_empty() {
            return false;
        }
        if entry == tool_name {
            return true;
        }

        match PolicyEntry::parse(entry) {
            PolicyEntry::CommandPrefix { tool, prefix } if tool == tool_name => {
                Self::command_of(tool_input).is_some_and(|command| command.starts_with(&prefix))
            }
            _ => false,
        }
    }

    /// First entry in `entries` that matches, if any.
    pub fn find<'a>(
        entries: &'a [String],
        tool_name: &str,
        tool_input: &serde_json::Value,
    ) -> Option<&'a str> {
        entries
            .iter()
            .map(String::as_str)
            .find(|entry| Self::matches(entry, tool_name, tool_input))
    }

    /// The trimmed command of a tool input: the input itself when it is a
    /// string, otherwise its `command` field. Empty commands yield `None`.
    fn command_of(tool_input: &serde_json::Value) -> Option<&str> {
        let raw = match tool_input {
            serde_json::Value::String(s) => s.as_str(),
            serde_json::Value::Object(map) => map.get("command")?.as_str()?,
            _ => return None,
        };
        let command = raw.trim();
        if command.is_empty() {
            None
        } else {
            Some(command)
        }
    }
}
