use chrono::Local;
use owo_colors::OwoColorize;
use supports_color::Stream;

const PROGRESS_STAMP_FORMAT: &str = "%d-%m-%Y_%H:%M:%S";

/// Human-facing progress on stdout. Diagnostics go through `tracing`.
#[derive(Debug)]
pub(crate) struct Printer {
    color: bool,
}

#[allow(clippy::print_stdout)]
impl Printer {
    pub(crate) fn detect() -> Self {
        Self {
            color: supports_color::on(Stream::Stdout).is_some(),
        }
    }

    /// `DD-MM-YYYY_HH:MM:SS : message`
    pub(crate) fn progress(&self, message: &str) {
        let stamp = Local::now().format(PROGRESS_STAMP_FORMAT);
        println!("{stamp} : {message}");
    }

    pub(crate) fn banner(&self, message: &str) {
        if self.color {
            println!("{}", message.yellow());
        } else {
            println!("{message}");
        }
    }

    pub(crate) fn fatal(&self, message: &str) {
        if self.color {
            println!("{}", message.red());
        } else {
            println!("{message}");
        }
    }

    pub(crate) fn highlight(&self, text: &str) {
        if self.color {
            println!("{}", text.green());
        } else {
            println!("{text}");
        }
    }

    pub(crate) fn plain(&self, text: &str) {
        println!("{text}");
    }
}
