// ABOUTME: Append-only log of statements executed during one relocation
// ABOUTME: Rendered for the caller as one statement per line

/// Executed statements, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLog {
    entries: Vec<String>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sql: impl Into<String>) {
        self.entries.push(sql.into());
    }

    /// Each statement terminated by `;`, joined by newlines
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|sql| format!("{};", sql))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
