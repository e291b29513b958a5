use clap::{CommandFactory, Parser};
use clap_complete::{Shell, generate};
use std::io;

/// Generate shell completion scripts for kana
#[derive(Parser, Debug)]
pub struct Completion {
    /// The shell to generate completions for
    #[arg(value_enum, long)]
    pub shell: Shell,
}

impl Completion {
    pub fn run(&self) -> anyhow::Result<()> {
        self.write_to(&mut io::stdout());
        Ok(())
    }

    fn write_to(&self, out: &mut dyn io::Write) {
        let mut cmd = crate::cli::Cli::command();
        let bin_name = cmd.get_name().to_string();
        generate(self.shell, &mut cmd, bin_name, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_subcommands() {
        let completion = Completion { shell: Shell::Bash };
        let mut buf = Vec::new();
        completion.write_to(&mut buf);

        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains("kana"));
        assert!(script.contains("plugins"));
    }
}
