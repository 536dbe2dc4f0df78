use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("unknown sync job: {name}")]
    UnknownJob { name: String },

    #[error("unknown interval key: {value}")]
    UnknownInterval { value: String },

    #[error("interval '{value}' is not allowed for the {job} job")]
    IntervalNotAllowed { job: &'static str, value: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unknown_job(name: impl Into<String>) -> Self {
        Self::UnknownJob { name: name.into() }
    }

    #[must_use]
    pub fn unknown_interval(value: impl Into<String>) -> Self {
        Self::UnknownInterval {
            value: value.into(),
        }
    }

    #[must_use]
    pub fn interval_not_allowed(job: &'static str, value: impl Into<String>) -> Self {
        Self::IntervalNotAllowed {
            job,
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
