use thiserror::Error;

/// Malformed or unsupported class-file structure. Fatal for the class being read.
#[derive(Debug, Error)]
pub enum ClassParserError {
    #[error("class file structure is invalid: {0}")]
    Binary(#[from] binrw::Error),
    #[error("malformed `{attribute}` attribute")]
    Attribute { attribute: &'static str },
    #[error("constant pool entry #{index} is not a {expected}")]
    ConstantPool { index: u16, expected: &'static str },
    #[error("invalid descriptor `{0}`")]
    Descriptor(String),
}

/// Failure inside the reverse-engineering pipeline of a single method.
#[derive(Debug, Error)]
pub enum RevEngineError {
    #[error("invalid opcode 0x{opcode:02x} at pc {pc}")]
    InvalidOpcode { pc: usize, opcode: u8 },
    #[error("instruction at pc {pc} runs past the end of the code array")]
    TruncatedInstruction { pc: usize },
    #[error("operand stack underflow at pc {pc}")]
    StackUnderflow { pc: usize },
    #[error("constant pool entry #{index} is not a {expected}")]
    ConstantPool { index: u16, expected: &'static str },
    #[error("instruction at pc {pc} failed: {source}")]
    Instruction {
        pc: usize,
        #[source]
        source: Box<RevEngineError>,
    },
    #[error("block {inner} overlaps block {outer}")]
    BlockOverlap { outer: String, inner: String },
    #[error("collation failed: {0}")]
    Collation(String),
}

impl RevEngineError {
    /// Attaches the pc of the instruction being processed, unless one is already known.
    pub fn at(self, pc: usize) -> Self {
        match self {
            RevEngineError::ConstantPool { .. } => RevEngineError::Instruction {
                pc,
                source: Box::new(self),
            },
            other => other,
        }
    }
}

/// Top-level error for loading and decompiling a class.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parser(#[from] ClassParserError),
    #[error(transparent)]
    RevEngine(#[from] RevEngineError),
    #[cfg(feature = "jar")]
    #[error("jar access failed: {0}")]
    Jar(#[from] zip::result::ZipError),
    #[cfg(feature = "http")]
    #[error("fetching class failed: {0}")]
    Http(#[from] ureq::Error),
    #[error("unsupported class location `{0}`")]
    UnsupportedUrl(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
