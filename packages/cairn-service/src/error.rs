pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<cairn_providers::Error> for Error {
	fn from(err: cairn_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<cairn_storage::Error> for Error {
	fn from(err: cairn_storage::Error) -> Self {
		match err {
			cairn_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			err => Self::Storage { message: err.to_string() },
		}
	}
}

impl From<cairn_config::Error> for Error {
	fn from(err: cairn_config::Error) -> Self {
		match err {
			cairn_config::Error::Validation { message } => Self::InvalidRequest { message },
			err => Self::InvalidRequest { message: err.to_string() },
		}
	}
}
