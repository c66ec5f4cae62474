pub type MaskResult<T> = Result<T, MaskError>;

#[derive(thiserror::Error, Debug)]
pub enum MaskError {
    #[error("coordinate ({x}, {y}) is outside the {width}×{height} buffer")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    #[error("invalid tool state: {0}")]
    InvalidToolState(String),

    #[error("invalid buffer dimensions {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("data URL error: {0}")]
    DataUrl(String),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A script command failed while being applied.
    #[error("line {line}: {source}")]
    Command {
        line: usize,
        #[source]
        source: Box<MaskError>,
    },

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MaskError {
    pub fn out_of_bounds(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self::OutOfBounds {
            x,
            y,
            width,
            height,
        }
    }

    pub fn tool_state(msg: impl Into<String>) -> Self {
        Self::InvalidToolState(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn data_url(msg: impl Into<String>) -> Self {
        Self::DataUrl(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Attach the script line a command came from.
    pub fn at_line(self, line: usize) -> Self {
        Self::Command {
            line,
            source: Box::new(self),
        }
    }

    /// The underlying error, without script line context.
    pub fn root(&self) -> &MaskError {
        match self {
            Self::Command { source, .. } => source.root(),
            other => other,
        }
    }
}
