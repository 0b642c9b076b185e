//! Masked terminal prompt answering elevated credential requests.

use crate::remote::WriteCredential;
use crate::sync::CredentialProvider;
use async_trait::async_trait;
use rustyline::config::{ColorMode, Configurer};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::borrow::Cow;
use tracing::warn;
use unicode_width::UnicodeWidthStr;
use zeroize::Zeroize;

#[derive(
    rustyline_derive::Completer,
    rustyline_derive::Helper,
    rustyline_derive::Hinter,
    rustyline_derive::Validator,
)]
struct MaskingHelper;

impl Highlighter for MaskingHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Owned("*".repeat(line.width()))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn read_masked(prompt: &str) -> rustyline::Result<String> {
    let mut rl = Editor::<MaskingHelper, DefaultHistory>::new()?;
    rl.set_helper(Some(MaskingHelper));
    // Highlighting is what masks the input, so it must stay on.
    rl.set_color_mode(ColorMode::Forced);
    rl.set_auto_add_history(false);
    rl.readline(prompt)
}

/// Asks on the terminal every time. An empty answer, Ctrl-C or Ctrl-D
/// declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptCredentialProvider;

#[async_trait]
impl CredentialProvider for PromptCredentialProvider {
    async fn request_elevated_credential(&self, operation: &str) -> Option<WriteCredential> {
        let prompt = format!("Admin API key to {} (empty to cancel): ", operation);
        match tokio::task::spawn_blocking(move || read_masked(&prompt)).await {
            Ok(Ok(mut key)) => {
                let credential = WriteCredential::new(key.as_str());
                key.zeroize();
                credential
            }
            Ok(Err(ReadlineError::Interrupted | ReadlineError::Eof)) => None,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read admin API key");
                None
            }
            Err(e) => {
                warn!(error = %e, "Credential prompt task failed");
                None
            }
        }
    }
}
