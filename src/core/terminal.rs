use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_step(step: &str) {
    println!("{} {}", SPARKLE, style(step).bold());
}

pub fn print_banner() {
    let lines: &[&str] = &[
        r"  ___  _   _ _____ ____   ___  ____ _____ ",
        r" / _ \| | | |_   _|  _ \ / _ \/ ___|_   _|",
        r"| | | | | | | | | | |_) | | | \___ \ | |  ",
        r"| |_| | |_| | | | |  __/| |_| |___) || |  ",
        r" \___/ \___/  |_| |_|    \___/|____/ |_|  ",
    ];
    println!();
    for line in lines {
        println!("{}", style(*line).cyan().bold());
    }
    println!("{}\n", style("fleet update orchestrator").dim());
}

/// Small builder for the boxed status sections the CLI prints after a
/// command finishes.
pub struct GuideSection {
    title: String,
    lines: Vec<String>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn status(mut self, label: &str, value: &str) -> Self {
        self.lines.push(format!(
            "  {} {}: {}",
            GEAR,
            style(label).bold().cyan(),
            value
        ));
        self
    }

    pub fn info(mut self, msg: &str) -> Self {
        self.lines.push(format!("  {} {}", INFO_ICON, style(msg).blue()));
        self
    }

    pub fn command(mut self, cmd: &str, desc: &str) -> Self {
        let pad = " ".repeat(14usize.saturating_sub(cmd.len()));
        self.lines
            .push(format!("  {}{pad} {desc}", style(cmd).green().bold()));
        self
    }

    pub fn blank(mut self) -> Self {
        self.lines.push(String::new());
        self
    }

    pub fn print(self) {
        println!("\n {}", style(&self.title).bold().underlined());
        for line in self.lines {
            println!("{line}");
        }
    }
}
