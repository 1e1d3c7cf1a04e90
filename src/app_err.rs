use aws_sdk_ec2::error::{DisplayErrorContext, SdkError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("{0}")]
    Usage(String),

    #[error("AWS SDK error: {0}")]
    Aws(String),

    #[error("timed out after {waited:?} waiting for {instance_id} to become {target}")]
    WaitTimeout {
        instance_id: String,
        target: String,
        waited: Duration,
    },

    #[error("{instance_id} entered state {state} while waiting for {target}")]
    UnexpectedState {
        instance_id: String,
        state: String,
        target: String,
    },

    #[error("snapshot run aborted at {instance_id}: {source}")]
    SnapshotAborted {
        instance_id: String,
        #[source]
        source: Box<ApplicationError>,
    },

    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

impl ApplicationError {
    pub fn usage<S: Into<String>>(message: S) -> Self {
        ApplicationError::Usage(message.into())
    }

    pub fn aws<S: Into<String>>(message: S) -> Self {
        ApplicationError::Aws(message.into())
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, ApplicationError::Usage(_))
    }
}

impl<E> From<SdkError<E>> for ApplicationError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: SdkError<E>) -> Self {
        ApplicationError::Aws(DisplayErrorContext(&err).to_string())
    }
}

pub type AppResult<T> = Result<T, ApplicationError>;
