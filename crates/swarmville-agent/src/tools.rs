//! Mock tool catalog.
//!
//! Each tool returns canned data shaped like the real integration would.
//! Variable parts (lint issue counts, scanner findings, ids) are derived from
//! a seed computed from the subtask description, so the same description
//! always produces the same result.

use serde::Serialize;
use serde_json::{json, Value};

/// Tools the simulated backend knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MockTool {
    Github,
    Slack,
    Jira,
    CodeLinter,
    SecurityScanner,
}

impl MockTool {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "github" => Some(MockTool::Github),
            "slack" => Some(MockTool::Slack),
            "jira" => Some(MockTool::Jira),
            "code_linter" => Some(MockTool::CodeLinter),
            "security_scanner" => Some(MockTool::SecurityScanner),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MockTool::Github => "github",
            MockTool::Slack => "slack",
            MockTool::Jira => "jira",
            MockTool::CodeLinter => "code_linter",
            MockTool::SecurityScanner => "security_scanner",
        }
    }

    /// Keyword family that makes a description call for this tool.
    fn keywords(self) -> &'static [&'static str] {
        match self {
            MockTool::Github => &["pr", "pull request", "code", "review", "merge"],
            MockTool::Slack => &["message", "notify", "slack", "team"],
            MockTool::Jira => &["issue", "ticket", "jira", "bug"],
            MockTool::CodeLinter => &["lint", "quality", "style"],
            MockTool::SecurityScanner => &["security", "vulnerability", "scan"],
        }
    }

    fn run(self, seed: u64) -> Value {
        match self {
            MockTool::Github => json!({
                "id": 100 + seed % 900,
                "title": "Fix authentication bug",
                "files_changed": ["src/auth.py", "tests/test_auth.py"],
                "additions": 45,
                "deletions": 12,
                "status": "open"
            }),
            MockTool::Slack => json!({
                "message_id": format!("msg_{}", 1000 + seed % 9000),
                "channel": "#general"
            }),
            MockTool::Jira => json!({
                "key": format!("PROJ-{}", 100 + seed % 100),
                "summary": "Bug in login flow",
                "status": "Open",
                "priority": "High"
            }),
            MockTool::CodeLinter => {
                let issues = seed % 4;
                json!({
                    "issues_count": issues,
                    "quality_score": 100 - issues * 10
                })
            }
            MockTool::SecurityScanner => {
                let vulnerabilities = (seed / 4) % 3;
                let grade = match vulnerabilities {
                    0 => "A",
                    1 => "B",
                    _ => "C",
                };
                json!({
                    "vulnerabilities_count": vulnerabilities,
                    "security_score": grade
                })
            }
        }
    }
}

/// Result of a single tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub tool: String,
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

/// Run `name` against `description`. `forced_failure` makes the call fail.
pub fn run_tool(name: &str, description: &str, forced_failure: bool) -> ToolOutcome {
    let Some(tool) = MockTool::from_name(name) else {
        return ToolOutcome {
            tool: name.to_string(),
            success: false,
            data: Value::Null,
            error: Some(format!("Unknown tool: {name}")),
        };
    };

    if forced_failure {
        return ToolOutcome {
            tool: name.to_string(),
            success: false,
            data: Value::Null,
            error: Some(format!("{name} is unavailable")),
        };
    }

    ToolOutcome {
        tool: name.to_string(),
        success: true,
        data: tool.run(seed_for(description)),
        error: None,
    }
}

/// Pick the tools a worker would use for `description`.
///
/// Only tools in `available` are considered; when no keyword family matches,
/// the first available tool is used.
pub fn select_tools(description: &str, available: &[String]) -> Vec<String> {
    let lower = description.to_lowercase();
    let mut selected: Vec<String> = [
        MockTool::Github,
        MockTool::Slack,
        MockTool::Jira,
        MockTool::CodeLinter,
        MockTool::SecurityScanner,
    ]
    .into_iter()
    .filter(|tool| tool.keywords().iter().any(|kw| lower.contains(kw)))
    .map(|tool| tool.name().to_string())
    .filter(|name| available.contains(name))
    .collect();

    if selected.is_empty() {
        if let Some(first) = available.first() {
            selected.push(first.clone());
        }
    }
    selected
}

// FNV-1a over the description bytes.
fn seed_for(description: &str) -> u64 {
    description
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, b| {
            (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn tools(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_select_by_keyword_family() {
        let available = tools(&["github", "security_scanner", "code_linter"]);
        let selected = select_tools("Review code for quality and security issues", &available);
        assert_eq!(selected, tools(&["github", "code_linter", "security_scanner"]));
    }

    #[test]
    fn test_select_skips_tools_the_worker_lacks() {
        let available = tools(&["github", "slack"]);
        let selected = select_tools("Investigate and identify the bug", &available);
        // "bug" asks for jira, which is missing: fall back to the first tool
        assert_eq!(selected, tools(&["github"]));
    }

    #[test]
    fn test_select_with_no_tools() {
        assert!(select_tools("anything", &[]).is_empty());
    }

    #[test]
    fn test_run_tool_is_deterministic() {
        let a = run_tool("code_linter", "Review code", false);
        let b = run_tool("code_linter", "Review code", false);
        assert_eq!(a, b);
        assert!(a.success);
        assert!(a.data["issues_count"].as_u64().unwrap() <= 3);
    }

    #[test]
    fn test_unknown_and_forced_failures() {
        let unknown = run_tool("teleporter", "x", false);
        assert!(!unknown.success);
        assert_eq!(unknown.error.as_deref(), Some("Unknown tool: teleporter"));

        let forced = run_tool("github", "x", true);
        assert!(!forced.success);
        assert!(forced.data.is_null());
    }
}
