//! Terminal output for the CLI
//!
//! Interactive terminals get `cliclack` rendering; pipes and CI get plain
//! prefixed lines so output stays greppable.

mod output;
mod progress;
mod prompts;

pub use output::{intro, key_value, outro_success, remark, step_info, step_ok, step_warn, step_warn_hint};
pub use progress::TaskSpinner;
pub use prompts::confirm;

use std::io::IsTerminal;

const CI_VARS: [&str; 8] = [
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

/// How the current process may talk to its user
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    auto_yes: bool,
}

impl UiContext {
    /// Interactive only with a terminal on both ends and no CI marker
    pub fn detect() -> Self {
        let tty = std::io::stdout().is_terminal() && std::io::stdin().is_terminal();
        let ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            interactive: tty && !ci,
            auto_yes: false,
        }
    }

    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
        }
    }

    /// Answer yes to every confirmation
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }
}
