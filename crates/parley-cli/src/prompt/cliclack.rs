use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::{input, spinner};
use console::style;

use super::{Input, InputType, Prompt, Theme};

pub struct CliclackPrompt {
    spinner: cliclack::ProgressBar,
    input_mode: InputMode,
    theme: Theme,
}

enum InputMode {
    Singleline,
    Multiline,
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt {
            spinner: spinner(),
            input_mode: InputMode::Singleline,
            theme: Theme::Dark,
        }
    }

    fn theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

impl Default for CliclackPrompt {
    fn default() -> Self {
        Self::new()
    }
}

fn print(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    // plain output when the terminal cannot be highlighted
    if printed.is_err() {
        println!("{}", content);
    }
}

fn flush() {
    let _ = io::stdout().flush();
}

impl Prompt for CliclackPrompt {
    fn render(&mut self, text: &str) {
        print(text, self.theme_name());
        println!();
        flush();
    }

    fn render_fragment(&mut self, fragment: &str) {
        print!("{}", fragment);
        flush();
    }

    fn render_error(&mut self, error: &str) {
        println!("{}", style(error).red());
        flush();
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner.start("awaiting reply");
    }

    fn hide_busy(&mut self) {
        self.spinner.stop("");
    }

    fn get_input(&mut self) -> Result<Input> {
        let mut input = input("Parley Chat: ( O)>         [Help: /?]").placeholder("");
        match self.input_mode {
            InputMode::Multiline => input = input.multiline(),
            InputMode::Singleline => (),
        }
        let message_text: String = input.interact()?;
        let message_text = message_text.trim();

        if message_text.is_empty() {
            return Ok(Input {
                input_type: InputType::AskAgain,
                content: None,
            });
        }
        if ["exit", "/exit", "/quit"]
            .iter()
            .any(|command| message_text.eq_ignore_ascii_case(command))
        {
            return Ok(Input {
                input_type: InputType::Exit,
                content: None,
            });
        }
        if message_text.eq_ignore_ascii_case("/m") {
            self.input_mode = InputMode::Multiline;
            return self.get_input();
        }
        if message_text.eq_ignore_ascii_case("/s") {
            self.input_mode = InputMode::Singleline;
            return self.get_input();
        }
        if message_text.eq_ignore_ascii_case("/t") {
            self.theme = match self.theme {
                Theme::Light => {
                    println!("Switching to Dark theme");
                    Theme::Dark
                }
                Theme::Dark => {
                    println!("Switching to Light theme");
                    Theme::Light
                }
            };
            return self.get_input();
        }
        if message_text.eq_ignore_ascii_case("/?") {
            println!("Commands:");
            println!("exit - Exit the session");
            println!("/m - Switch to multiline input mode");
            println!("/s - Switch to singleline input mode");
            println!("/t - Toggle Light/Dark theme");
            println!("/? - Display this help message");
            println!("Ctrl+C - Interrupt the reply (the question is not kept in the history)");
            return self.get_input();
        }

        Ok(Input {
            input_type: InputType::Message,
            content: Some(message_text.to_string()),
        })
    }

    fn close(&self) {
        // No cleanup required
    }
}
