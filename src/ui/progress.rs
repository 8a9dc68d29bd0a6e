//! Spinner for long-running commands

use super::UiContext;
use console::style;

pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.is_interactive(),
        }
    }

    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    pub fn stop(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.stop(message),
            None => println!("{} {}", style("[OK]").green(), message),
        }
    }

    pub fn stop_error(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.error(message),
            None => println!("{} {}", style("[FAIL]").red(), message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_spinner() {
        let mut spinner = TaskSpinner::new(&UiContext::non_interactive());
        spinner.start("Warming index...");
        spinner.stop("Indexed 3 stores");
    }
}
