//! Command line for the log-streaming subprocess
//!
//! The invocation is always laid out as
//! `<program> [base args] [-p <project>] logs --follow`.

/// Default program used to stream logs
pub const DEFAULT_PROGRAM: &str = "docker";

/// Arguments placed before the project flags for the default program
pub const DEFAULT_BASE_ARGS: &[&str] = &["compose"];

/// Builder for the `compose logs --follow` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsCommand {
    program: String,
    base_args: Vec<String>,
    project: Option<String>,
}

impl LogsCommand {
    /// Create a command using `docker compose`, optionally scoped to a project
    pub fn new(project: Option<String>) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            base_args: DEFAULT_BASE_ARGS.iter().map(|s| s.to_string()).collect(),
            project: project.filter(|p| !p.trim().is_empty()),
        }
    }

    /// Replace the base command (e.g. `docker-compose` or `podman compose`)
    pub fn with_program(mut self, program: impl Into<String>, base_args: Vec<String>) -> Self {
        self.program = program.into();
        self.base_args = base_args;
        self
    }

    /// Program to execute
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Project the logs are scoped to, if any
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Full argument vector following the program name
    pub fn args(&self) -> Vec<String> {
        let mut args = self.base_args.clone();
        if let Some(project) = &self.project {
            args.push("-p".to_string());
            args.push(project.clone());
        }
        args.push("logs".to_string());
        args.push("--follow".to_string());
        args
    }

    /// Human readable command line, for logs and error messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_without_project() {
        let cmd = LogsCommand::new(None);
        assert_eq!(cmd.program(), "docker");
        assert_eq!(cmd.args(), vec!["compose", "logs", "--follow"]);
    }

    #[test]
    fn test_project_flags_come_before_logs() {
        let cmd = LogsCommand::new(Some("shop".to_string()));
        assert_eq!(cmd.args(), vec!["compose", "-p", "shop", "logs", "--follow"]);
        assert_eq!(cmd.display(), "docker compose -p shop logs --follow");
    }

    #[test]
    fn test_blank_project_is_ignored() {
        let cmd = LogsCommand::new(Some("  ".to_string()));
        assert_eq!(cmd.project(), None);
        assert_eq!(cmd.args(), vec!["compose", "logs", "--follow"]);
    }

    #[test]
    fn test_custom_program() {
        let cmd = LogsCommand::new(Some("shop".to_string())).with_program("docker-compose", vec![]);
        assert_eq!(cmd.display(), "docker-compose -p shop logs --follow");
    }
}
