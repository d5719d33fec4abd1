//! Operator interaction boundary: yes/no confirmations and free-text answers.

use crate::error::{ExpensiveError, ExpensiveResult};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask a yes/no question; an empty answer picks `default`.
    async fn confirm(&self, question: &str, default: bool) -> ExpensiveResult<bool>;

    async fn ask(&self, question: &str) -> ExpensiveResult<String>;

    /// Ask for a secret such as the account password.
    ///
    /// The default forwards to [`Prompter::ask`], which may echo the answer.
    async fn ask_secret(&self, question: &str) -> ExpensiveResult<String> {
        self.ask(question).await
    }

    /// Show information the operator needs before the next question.
    async fn show(&self, message: &str) -> ExpensiveResult<()>;
}

/// Interpret a typed answer.
pub fn parse_answer(input: &str, default: bool) -> bool {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

/// Reads a secret after printing the prompt.
pub type SecretReader = fn(String) -> std::io::Result<String>;

/// Prompts on the terminal.
pub struct StdinPrompter {
    input: Mutex<BufReader<Stdin>>,
    read_secret: SecretReader,
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self::with_secret_reader(rpassword::prompt_password)
    }

    pub fn with_secret_reader(read_secret: SecretReader) -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin())),
            read_secret,
        }
    }

    async fn write(&self, text: &str) -> ExpensiveResult<()> {
        let mut out = tokio::io::stdout();
        out.write_all(text.as_bytes()).await.map_err(io_error)?;
        out.flush().await.map_err(io_error)
    }

    async fn read_line(&self) -> ExpensiveResult<String> {
        let mut line = String::new();
        let read = self
            .input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(io_error)?;
        if read == 0 {
            return Err(ExpensiveError::Terminal("input closed".to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

fn io_error(err: std::io::Error) -> ExpensiveError {
    ExpensiveError::Terminal(err.to_string())
}

#[async_trait]
impl Prompter for StdinPrompter {
    async fn confirm(&self, question: &str, default: bool) -> ExpensiveResult<bool> {
        let choices = if default { "Y/n" } else { "y/N" };
        self.write(&format!("{} [{}] ", question, choices)).await?;
        Ok(parse_answer(&self.read_line().await?, default))
    }

    async fn ask(&self, question: &str) -> ExpensiveResult<String> {
        self.write(&prompt_line(question)).await?;
        self.read_line().await
    }

    /// Reads from the controlling terminal with echo turned off.
    async fn ask_secret(&self, question: &str) -> ExpensiveResult<String> {
        let prompt = prompt_line(question);
        let read_secret = self.read_secret;
        tokio::task::spawn_blocking(move || read_secret(prompt))
            .await
            .map_err(|e| ExpensiveError::Terminal(e.to_string()))?
            .map_err(io_error)
    }

    async fn show(&self, message: &str) -> ExpensiveResult<()> {
        self.write(&format!("{}\n", message)).await
    }
}

fn prompt_line(question: &str) -> String {
    format!("{}: ", question)
}
