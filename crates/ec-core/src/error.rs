use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Invalid id: {value} ({what} ids start at 1)")]
    InvalidId { what: &'static str, value: u64 },

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Unknown sub-module '{sub_module}' for module '{module}'")]
    UnknownSubModule { module: String, sub_module: String },
}
