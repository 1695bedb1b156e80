use crate::gindex::GIndex;

/// Malformed input encountered while decoding.
///
/// Positions are absolute byte offsets into the buffer handed to the
/// top-level decode call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("expected {expected} bytes at byte {position}, got {actual}")]
    InvalidLength {
        position: usize,
        expected: usize,
        actual: usize,
    },
    #[error("{actual} bytes at byte {position} cannot hold the {fixed}-byte fixed region")]
    Truncated {
        position: usize,
        fixed: usize,
        actual: usize,
    },
    #[error(
        "first offset {offset} at byte {position} does not end the {expected}-byte fixed region"
    )]
    FirstOffsetMismatch {
        position: usize,
        offset: usize,
        expected: usize,
    },
    #[error("offset {offset} at byte {position} points past the end of a {len}-byte payload")]
    OffsetOutOfBounds {
        position: usize,
        offset: usize,
        len: usize,
    },
    #[error("offset {offset} at byte {position} precedes the previous offset {previous}")]
    OffsetsNotMonotonic {
        position: usize,
        offset: usize,
        previous: usize,
    },
    #[error("{len} bytes at byte {position} are not a multiple of the {size}-byte element")]
    NotMultiple {
        position: usize,
        len: usize,
        size: usize,
    },
    #[error("{count} elements at byte {position} exceed the limit of {max}")]
    TooLong { position: usize, count: u64, max: u64 },
    #[error("selector {selector} at byte {position} is out of range for {variants} variants")]
    InvalidSelector {
        position: usize,
        selector: u8,
        variants: usize,
    },
    #[error("byte {value:#04x} at byte {position} is not a boolean")]
    InvalidBool { position: usize, value: u8 },
    #[error("field `{field}`: {source}")]
    InField {
        field: String,
        #[source]
        source: Box<DecodeError>,
    },
    #[error("element {index}: {source}")]
    InElement {
        index: usize,
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    pub(crate) fn in_field(self, field: &str) -> Self {
        DecodeError::InField {
            field: field.to_string(),
            source: Box::new(self),
        }
    }

    pub(crate) fn in_element(self, index: usize) -> Self {
        DecodeError::InElement {
            index,
            source: Box::new(self),
        }
    }

    /// The innermost error, with field and element context stripped.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            DecodeError::InField { source, .. } | DecodeError::InElement { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

/// Error type for schema, value and tree operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SszError {
    #[error("value does not match schema: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },
    #[error("collection of {len} elements exceeds the limit of {max}")]
    CollectionTooLong { len: u64, max: u64 },
    #[error("expected exactly {expected} elements, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },
    #[error("selector {selector} is invalid for {variants} variants")]
    InvalidSelector { selector: u64, variants: usize },
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: u64, len: u64 },
    #[error("field `{field}`: {source}")]
    FieldValidation {
        field: String,
        #[source]
        source: Box<SszError>,
    },
    #[error("no field named `{0}`")]
    UnknownField(String),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("no node at generalized index {0}")]
    MissingNode(GIndex),
    #[error("encoded size {0} does not fit a 4-byte offset")]
    OffsetOverflow(usize),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl SszError {
    pub(crate) fn in_field(self, field: &str) -> Self {
        SszError::FieldValidation {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, SszError>;
