/// A `>`-style target attached to a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub target: String,
    pub append: bool,
}

/// One parsed pipeline stage: an argument vector plus optional redirect
/// targets. The first argument is the command name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stage {
    pub argv: Vec<String>,
    pub stdout_redirect: Option<Redirect>,
    pub stderr_redirect: Option<Redirect>,
}

impl Stage {
    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }
}

/// An ordered sequence of stages sharing one input line, connected
/// stdout-to-stdin left to right.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
