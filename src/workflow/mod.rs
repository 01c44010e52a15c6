// Workflow module - advisory step templates matched from the instruction

use serde::{Deserialize, Serialize};

/// Trigger phrases mapped to suggested steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub name: String,
    pub description: String,
    /// Matched case-insensitively as substrings of the instruction
    pub triggers: Vec<String>,
    pub steps: Vec<String>,
}

impl WorkflowTemplate {
    pub fn new(name: &str, description: &str, triggers: &[&str], steps: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            triggers: triggers.iter().map(|t| t.to_lowercase()).collect(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Guidance appended to the first user message. Advisory only.
    pub fn guidance(&self) -> String {
        let mut out = format!(
            "Suggested workflow ({}): {}\n",
            self.name, self.description
        );
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, step));
        }
        out.push_str("Adapt these steps as needed; they are suggestions, not requirements.");
        out
    }
}

/// First-match-wins matcher over an ordered template table
#[derive(Debug, Clone, Default)]
pub struct WorkflowMatcher {
    templates: Vec<WorkflowTemplate>,
}

impl WorkflowMatcher {
    pub fn new(templates: Vec<WorkflowTemplate>) -> Self {
        Self { templates }
    }

    /// The built-in table
    pub fn builtin() -> Self {
        Self::new(vec![
            WorkflowTemplate::new(
                "create-component",
                "add a new UI component",
                &["create component", "new component", "add component"],
                &[
                    "List the project files to find where components live",
                    "Read an existing component to match its conventions",
                    "Write the new component file",
                    "Export or register the component where it is used",
                    "Call complete with the files created",
                ],
            ),
            WorkflowTemplate::new(
                "fix-bug",
                "locate and fix a defect",
                &["fix bug", "fix the bug", "fix error", "debug", "not working", "broken"],
                &[
                    "Search the code for the symptom or the relevant identifiers",
                    "Read the files involved",
                    "Apply the smallest edit that fixes the cause",
                    "Re-read the edited region to verify the change",
                    "Call complete explaining the cause and the fix",
                ],
            ),
            WorkflowTemplate::new(
                "refactor",
                "restructure code without changing behavior",
                &["refactor", "clean up", "cleanup", "restructure"],
                &[
                    "Read the code to be refactored and its call sites",
                    "Plan the change and keep behavior identical",
                    "Edit each file in turn",
                    "Search for leftover references to renamed items",
                    "Call complete summarizing the structural changes",
                ],
            ),
            WorkflowTemplate::new(
                "add-tests",
                "add tests for existing code",
                &["add test", "write test", "unit test", "test coverage"],
                &[
                    "Read the code under test",
                    "Find existing tests to match their style and location",
                    "Write the new tests",
                    "Call complete listing the cases covered",
                ],
            ),
            WorkflowTemplate::new(
                "create-project",
                "scaffold a new project",
                &["create project", "new project", "scaffold", "set up a project", "setup a project"],
                &[
                    "Create the directory layout",
                    "Write the build or package manifest",
                    "Write an entry point and a README",
                    "Call complete listing the generated files",
                ],
            ),
            WorkflowTemplate::new(
                "explain-code",
                "explain how code works without changing it",
                &["explain", "how does", "what does"],
                &[
                    "List and read the relevant files",
                    "Do not modify any file",
                    "Call complete with the explanation as the summary",
                ],
            ),
        ])
    }

    /// First template with a trigger contained in `message`, ignoring case
    pub fn match_message(&self, message: &str) -> Option<&WorkflowTemplate> {
        let haystack = message.to_lowercase();
        self.templates
            .iter()
            .find(|t| t.triggers.iter().any(|trigger| haystack.contains(trigger.as_str())))
    }
}
