use serde::{Deserialize, Serialize};

/// Position inside a scanned file (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FindingExtra {
    #[serde(default)]
    pub message: String,
    /// Severity as reported by the engine; filled from the rule when missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// Source text of the first matched line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
}

/// One match reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub check_id: String,
    pub path: String,
    pub start: Position,
    pub end: Position,
    #[serde(default)]
    pub extra: FindingExtra,
}

/// An error the engine reported while scanning (unparsable file and the like)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineErrorEntry {
    #[serde(default)]
    pub check_id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Raw stdout of one engine invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOutput {
    #[serde(default)]
    pub matches: Vec<Finding>,
    #[serde(default)]
    pub errors: Vec<EngineErrorEntry>,
}

/// What the CLI prints or saves after a scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub results: Vec<Finding>,
    pub errors: Vec<EngineErrorEntry>,
}

impl Finding {
    /// `path:line: [SEVERITY] check_id: message`
    pub fn to_text(&self) -> String {
        let mut text = format!("{}:{}:", self.path, self.start.line);
        if let Some(severity) = &self.extra.severity {
            text.push_str(&format!(" [{severity}]"));
        }
        text.push_str(&format!(" {}: {}", self.check_id, self.extra.message));
        if let Some(line) = &self.extra.line {
            text.push_str(&format!("\n    {}", line.trim_end()));
        }
        text
    }
}
