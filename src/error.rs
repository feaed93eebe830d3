pub type StoryreelResult<T> = Result<T, StoryreelError>;

#[derive(thiserror::Error, Debug)]
pub enum StoryreelError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("speech synthesis error: {0}")]
    Synthesis(String),

    #[error("scene render error: {0}")]
    Render(String),

    #[error("video encode error: {0}")]
    Encode(String),

    #[error("subtitle error: {0}")]
    Subtitle(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoryreelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn subtitle(msg: impl Into<String>) -> Self {
        Self::Subtitle(msg.into())
    }
}
