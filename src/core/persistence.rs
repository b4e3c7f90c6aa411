//! On-disk state and last error records
//!
//! State file: a single line holding the state code.
//! Error file: the error code on the first line, the message on the second.

use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::warn;

use crate::core::{
    error::{PersistenceError, PersistenceResult},
    types::{ErrorCode, LastError, OnboardingState},
};

/// Location of the persisted onboarding records
///
/// A missing path disables persistence for that record.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    state_path: Option<PathBuf>,
    error_path: Option<PathBuf>,
}

impl StateStore {
    pub fn new(state_path: Option<PathBuf>, error_path: Option<PathBuf>) -> Self {
        Self {
            state_path,
            error_path,
        }
    }

    /// Store that keeps nothing on disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the persisted state, `NotConfigured` if there is none
    pub async fn load_state(&self) -> PersistenceResult<OnboardingState> {
        let Some(content) = Self::read(self.state_path.as_deref()).await? else {
            return Ok(OnboardingState::NotConfigured);
        };

        let line = content.lines().next().unwrap_or_default().trim();
        match line.parse::<i16>().ok().map(OnboardingState::try_from) {
            Some(Ok(state)) => Ok(state),
            _ => {
                warn!(value = line, "Ignoring invalid persisted state");
                Ok(OnboardingState::NotConfigured)
            }
        }
    }

    /// Load the persisted last error, the "no error" record if there is none
    pub async fn load_error(&self) -> PersistenceResult<LastError> {
        let Some(content) = Self::read(self.error_path.as_deref()).await? else {
            return Ok(LastError::none());
        };

        let mut lines = content.lines();
        let code_line = lines.next().unwrap_or_default().trim();
        let Some(Ok(code)) = code_line.parse::<i16>().ok().map(ErrorCode::try_from) else {
            warn!(value = code_line, "Ignoring invalid persisted error code");
            return Ok(LastError::none());
        };

        Ok(LastError {
            code,
            message: lines.next().unwrap_or_default().to_string(),
        })
    }

    pub async fn save_state(&self, state: OnboardingState) -> PersistenceResult<()> {
        Self::write(
            self.state_path.as_deref(),
            &format!("{}\n", i16::from(state)),
        )
        .await
    }

    /// Persist an error record; the message is flattened to a single line
    pub async fn save_error(&self, error: &LastError) -> PersistenceResult<()> {
        let message = error.message.lines().collect::<Vec<_>>().join(" ");
        Self::write(
            self.error_path.as_deref(),
            &format!("{}\n{}\n", i16::from(error.code), message),
        )
        .await
    }

    async fn read(path: Option<&Path>) -> PersistenceResult<Option<String>> {
        let Some(path) = path else {
            return Ok(None);
        };

        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    async fn write(path: Option<&Path>, content: &str) -> PersistenceResult<()> {
        let Some(path) = path else {
            return Ok(());
        };

        fs::write(path, content).await.map_err(|source| PersistenceError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}
