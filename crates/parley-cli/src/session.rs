use anyhow::Result;
use futures::StreamExt;

use crate::prompt::{InputType, Prompt};
use parley::agent::{Agent, StreamEvent};
use parley::models::message::Message;

/// How a single exchange ended
#[derive(Debug, PartialEq)]
enum Outcome {
    Answered(String),
    Failed,
    Interrupted,
}

/// An interactive chat that keeps the user/assistant turns in memory
pub struct Session<'a> {
    agent: Agent,
    prompt: Box<dyn Prompt + 'a>,
    system_prompt: String,
    stream: bool,
    history: Vec<Message>,
}

impl<'a> Session<'a> {
    pub fn new(
        agent: Agent,
        prompt: Box<dyn Prompt + 'a>,
        system_prompt: String,
        stream: bool,
    ) -> Self {
        Session {
            agent,
            prompt,
            system_prompt,
            stream,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.ready();

        loop {
            let input = self.prompt.get_input()?;
            let text = match input.input_type {
                InputType::Message => match input.content {
                    Some(text) => text,
                    None => continue,
                },
                InputType::Exit => break,
                InputType::AskAgain => continue,
            };
            self.exchange(&text).await;
        }

        self.prompt.close();
        Ok(())
    }

    /// Ask one question. Only answered exchanges are added to the history.
    async fn exchange(&mut self, text: &str) {
        let outcome = if self.stream {
            self.stream_reply(text).await
        } else {
            self.blocking_reply(text).await
        };

        match outcome {
            Outcome::Answered(answer) => {
                self.history.push(Message::user().with_text(text));
                self.history.push(Message::assistant().with_text(answer));
            }
            Outcome::Interrupted => {
                self.prompt
                    .render_error("Interrupted: the last question was not kept.");
            }
            Outcome::Failed => {}
        }
    }

    async fn blocking_reply(&mut self, text: &str) -> Outcome {
        self.prompt.show_busy();
        let reply = tokio::select! {
            reply = self.agent.reply(&self.system_prompt, text, &self.history) => Some(reply),
            _ = tokio::signal::ctrl_c() => None,
        };
        self.prompt.hide_busy();

        match reply {
            Some(Ok(answer)) => {
                self.prompt.render(&answer);
                Outcome::Answered(answer)
            }
            Some(Err(e)) => {
                self.prompt
                    .render_error(&format!("[Error during chat]: {}", e));
                Outcome::Failed
            }
            None => Outcome::Interrupted,
        }
    }

    async fn stream_reply(&mut self, text: &str) -> Outcome {
        let mut events = self.agent.chat_stream(&self.system_prompt, text, &self.history);
        let mut answer = String::new();
        let mut failed = false;

        let finished = loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(StreamEvent::Fragment(fragment)) => {
                        self.prompt.render_fragment(&fragment);
                        answer.push_str(&fragment);
                    }
                    Some(StreamEvent::Error(error)) => {
                        self.prompt.render_error(&error);
                        failed = true;
                    }
                    Some(StreamEvent::Done) | None => break true,
                },
                _ = tokio::signal::ctrl_c() => break false,
            }
        };
        self.prompt.end_stream();

        match (finished, failed) {
            (false, _) => Outcome::Interrupted,
            (true, true) => Outcome::Failed,
            (true, false) => Outcome::Answered(answer),
        }
    }
}
