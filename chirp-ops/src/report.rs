use std::process::ExitCode;

/// Result of evaluating a single check
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Pass,
    Warning(String),
    Failure(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub name: String,
    pub outcome: Outcome,
}

/// Accumulates check results and renders the console summary
#[derive(Debug, Default)]
pub struct Report {
    results: Vec<CheckResult>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a named check
    pub fn record(&mut self, name: impl Into<String>, outcome: Outcome) {
        self.results.push(CheckResult {
            name: name.into(),
            outcome,
        });
    }

    pub fn pass(&mut self, name: impl Into<String>) {
        self.record(name, Outcome::Pass);
    }

    pub fn warn(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.record(name, Outcome::Warning(message.into()));
    }

    pub fn fail(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.record(name, Outcome::Failure(message.into()));
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Pass))
    }

    pub fn warnings(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Warning(_)))
    }

    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failure(_)))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Find a result by check name
    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// 0 when no check failed, 1 otherwise
    pub fn exit_status(&self) -> u8 {
        if self.failures() == 0 {
            0
        } else {
            1
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }

    /// Print every check followed by the pass/warning/failure summary
    pub fn print(&self, title: &str) {
        println!("{}", title);
        println!("{}", "=".repeat(title.chars().count()));
        println!();

        for result in &self.results {
            match &result.outcome {
                Outcome::Pass => println!("  ✓ {}", result.name),
                Outcome::Warning(msg) => println!("  ⚠ {} - {}", result.name, msg),
                Outcome::Failure(msg) => println!("  ✗ {} - {}", result.name, msg),
            }
        }

        println!();
        println!("Summary");
        println!("-------");
        println!("Passed:   {}", self.passed());
        println!("Warnings: {}", self.warnings());
        println!("Failures: {}", self.failures());
        println!();

        if self.failures() == 0 {
            if self.warnings() == 0 {
                println!("All checks passed.");
            } else {
                println!("No failures, but review the warnings above.");
            }
        } else {
            println!("{} check(s) failed.", self.failures());
        }
    }
}
