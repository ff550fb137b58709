//! Terminal consent prompts.
//!
//! Shows each consent prompt on stdout and reads the answer from a line
//! source (stdin by default). Only one prompt reads input at a time; others
//! wait their turn.

use std::collections::HashSet;
use std::io::{stdout, BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use hubgate_core::{
    PromptError, PromptEvent, PromptId, PromptKind, PromptRequest, PromptSink, PromptSubscription,
};
use parking_lot::Mutex;

/// Source of answer lines.
pub trait LineReader: Send + Sync {
    /// Read one line, or `None` at end of input.
    fn read_line(&self) -> Option<String>;
}

/// Reads answers from stdin.
pub struct StdinReader;

impl LineReader for StdinReader {
    fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }
}

/// Interpret `input` as an answer to a prompt of `kind`.
///
/// Returns `None` for input that is not a valid choice.
pub fn parse_choice(kind: PromptKind, input: &str) -> Option<PromptEvent> {
    let input = input.trim().to_lowercase();
    if matches!(input.as_str(), "q" | "quit" | "dismiss") {
        return Some(PromptEvent::Dismissed);
    }
    let index = match (kind, input.as_str()) {
        (PromptKind::AllowDeny, "n" | "no" | "d" | "deny") => 0,
        (PromptKind::AllowDeny, "y" | "yes" | "a" | "allow") => 1,
        (PromptKind::Permanence, "s" | "session") => 0,
        (PromptKind::Permanence, "a" | "always") => 1,
        _ => return None,
    };
    Some(PromptEvent::Action { index })
}

fn choices(kind: PromptKind) -> &'static str {
    match kind {
        PromptKind::AllowDeny => "y/n/q",
        PromptKind::Permanence => "s/a/q",
    }
}

/// Print a prompt with its options.
pub fn print_prompt(request: &PromptRequest) {
    println!("\n\x1b[1m{}\x1b[0m", request.title);
    println!("  {}", request.message);
    if let Some(url) = &request.url {
        println!("  \x1b[2m{}\x1b[0m", url);
    }

    println!();
    match request.kind {
        PromptKind::AllowDeny => {
            println!("  \x1b[1my\x1b[0m  {}", request.actions[1]);
            println!("  \x1b[1mn\x1b[0m  {}", request.actions[0]);
        }
        PromptKind::Permanence => {
            println!("  \x1b[1ms\x1b[0m  {}", request.actions[0]);
            println!("  \x1b[1ma\x1b[0m  {}", request.actions[1]);
        }
    }
    println!("  \x1b[1mq\x1b[0m  dismiss");
}

/// Print a confirmation message
pub fn print_confirmation(message: &str) {
    println!("  \x1b[32m✓\x1b[0m {}", message);
}

struct TerminalInner {
    reader: Box<dyn LineReader>,
    // Held while a prompt owns the terminal.
    console: Mutex<()>,
    cleared: Mutex<HashSet<PromptId>>,
}

/// A [`PromptSink`] that asks on the terminal.
///
/// Reading happens on a blocking thread. A prompt cleared by the flow (for
/// example after a timeout) is abandoned as soon as it is next answered.
#[derive(Clone)]
pub struct TerminalPromptSink {
    inner: Arc<TerminalInner>,
}

impl TerminalPromptSink {
    /// Prompt on stdin/stdout.
    pub fn new() -> Self {
        Self::with_reader(StdinReader)
    }

    /// Prompt on stdout, reading answers from `reader`.
    pub fn with_reader(reader: impl LineReader + 'static) -> Self {
        Self {
            inner: Arc::new(TerminalInner {
                reader: Box::new(reader),
                console: Mutex::new(()),
                cleared: Mutex::new(HashSet::new()),
            }),
        }
    }
}

impl Default for TerminalPromptSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalInner {
    fn is_cleared(&self, id: &PromptId) -> bool {
        self.cleared.lock().remove(id)
    }

    /// Ask until a valid answer arrives. `None` at end of input or when the
    /// prompt was cleared meanwhile.
    fn ask(&self, request: &PromptRequest) -> Option<PromptEvent> {
        let _console = self.console.lock();
        if self.is_cleared(&request.id) {
            return None;
        }
        print_prompt(request);

        loop {
            print!("\nChoice: ");
            let _ = stdout().flush();

            let line = self.reader.read_line()?;
            if self.is_cleared(&request.id) {
                println!("  \x1b[33mPrompt expired\x1b[0m");
                return None;
            }
            if line.trim().is_empty() {
                continue;
            }
            match parse_choice(request.kind, &line) {
                Some(event) => return Some(event),
                None => println!(
                    "\x1b[31mInvalid choice. Use {}\x1b[0m",
                    choices(request.kind)
                ),
            }
        }
    }
}

#[async_trait]
impl PromptSink for TerminalPromptSink {
    async fn show(&self, request: PromptRequest) -> Result<PromptSubscription, PromptError> {
        let (responder, subscription) = PromptSubscription::channel(request.id.clone());
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || {
            let Some(event) = inner.ask(&request) else {
                return;
            };
            match event {
                PromptEvent::Action { index } => {
                    print_confirmation(&request.actions[index.min(1)]);
                }
                PromptEvent::Dismissed => print_confirmation("Dismissed"),
            }
            let _ = responder.send(event);
        });

        Ok(subscription)
    }

    async fn clear(&self, id: &PromptId) {
        self.inner.cleared.lock().insert(id.clone());
    }
}
