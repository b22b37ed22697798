//! Pairing an unregistered session with a phone number instead of a QR code.

use crate::channels::{ClientError, MessagingClient};
use std::io::{BufRead, Write};

const PROMPT: &str = "Enter your WhatsApp number (e.g., 2126...): ";

#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("reading phone number: {0}")]
    Io(#[from] std::io::Error),
    #[error("prompt task failed: {0}")]
    Prompt(#[from] tokio::task::JoinError),
    #[error("requesting pairing code: {0}")]
    Client(#[from] ClientError),
}

/// Where the phone number to pair with comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneNumberSource {
    /// Configured number; no prompt.
    Fixed(String),
    /// Ask on the terminal.
    Terminal,
}

impl PhoneNumberSource {
    pub fn from_config(phone_number: Option<&str>) -> Self {
        match phone_number.map(str::trim).filter(|s| !s.is_empty()) {
            Some(n) => Self::Fixed(n.to_string()),
            None => Self::Terminal,
        }
    }

    async fn read(&self) -> Result<String, PairingError> {
        match self {
            Self::Fixed(n) => Ok(n.clone()),
            Self::Terminal => {
                let line = tokio::task::spawn_blocking(|| {
                    let stdin = std::io::stdin();
                    prompt_line(stdin.lock(), std::io::stdout())
                })
                .await??;
                Ok(line)
            }
        }
    }
}

/// Keep only ASCII digits.
pub fn sanitize_phone_number(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Write the prompt and read one line.
pub fn prompt_line<R: BufRead, W: Write>(mut input: R, mut output: W) -> std::io::Result<String> {
    write!(output, "{}", PROMPT)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Get a phone number and request a pairing code for it. Returns None when no number was given.
pub async fn request_code(
    client: &dyn MessagingClient,
    source: &PhoneNumberSource,
) -> Result<Option<String>, PairingError> {
    let digits = sanitize_phone_number(&source.read().await?);
    if digits.is_empty() {
        log::warn!("pairing: no phone number given, skipping pairing");
        return Ok(None);
    }
    let code = client.request_pairing_code(&digits).await?;
    Ok(Some(code))
}
