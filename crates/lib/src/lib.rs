//! autoreply core library: answers incoming chat messages through a question-answer API.
//!
//! Shared by the CLI; the binary only parses arguments and installs signal handling.

pub mod answer;
pub mod bot;
pub mod channels;
pub mod config;
pub mod init;
pub mod pairing;
pub mod replier;
pub mod session;
pub mod supervisor;
