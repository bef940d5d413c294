use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown bone: {name}")]
    UnknownBone { name: String },

    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    #[error("unknown attachment '{name}' for slot '{slot}'")]
    UnknownAttachment { slot: String, name: String },

    #[error("no texture region for attachment path '{path}'")]
    UnknownTexture { path: String },

    #[error("constraints '{first}' and '{second}' share order {order}")]
    DuplicateConstraintOrder {
        order: i32,
        first: String,
        second: String,
    },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("renderer was disposed")]
    Disposed,
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }
}
