use anyhow::Result;

pub mod cliclack;

/// The terminal side of a chat session
pub trait Prompt {
    fn get_input(&mut self) -> Result<Input>;
    /// Show a complete answer
    fn render(&mut self, text: &str);
    /// Show one streamed fragment as soon as it arrives
    fn render_fragment(&mut self, fragment: &str);
    fn end_stream(&mut self) {
        println!("\n");
    }
    fn render_error(&mut self, error: &str);
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);
    fn ready(&self) {
        println!("\n");
        println!("Parley is running! Ask about the store's products, or type exit to leave.");
        println!("\n");
    }
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // only set for messages
}

pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}

pub enum Theme {
    Light,
    Dark,
}
