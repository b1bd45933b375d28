//! Text-to-speech through an external program

use std::process::Stdio;
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::config::SpeechConfig;
use crate::ui_backend::SpeechOutput;

/// Runs `command args... <text>` for every completed reply
///
/// The program is started in the background and never awaited by the chat
/// loop; failures are only logged.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    command: String,
    args: Vec<String>,
}

impl CommandSpeech {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// `None` when speech is disabled
    pub fn from_config(config: &SpeechConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.command.clone(), config.args.clone()))
    }

    pub(crate) fn spawn(&self, text: &str) -> Option<JoinHandle<()>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No async runtime; skipping speech output");
                return None;
            }
        };

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let program = self.command.clone();

        Some(handle.spawn(async move {
            match cmd.output().await {
                Ok(output) if output.status.success() => {
                    tracing::debug!("{} finished speaking", program);
                }
                Ok(output) => {
                    tracing::warn!(
                        "{} exited with {}: {}",
                        program,
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                Err(e) => tracing::warn!("Failed to run {}: {}", program, e),
            }
        }))
    }
}

impl SpeechOutput for CommandSpeech {
    fn speak(&self, text: &str) {
        self.spawn(text);
    }
}
