/// Error types for sqlx-plus
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The placeholder lexer could not be built, or the SQL text is unusable
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// A named parameter was bound that never appears in the statement
    #[error("Unknown query parameter: {name}")]
    UnknownParameter { name: String, sql: String },

    #[error("Parameter index {index} is out of range of this query's parameters (max parameters: {max})")]
    ParameterIndexOutOfRange { index: usize, max: usize },

    /// The same name or ordinal was bound twice for one execution
    #[error("Duplicate parameter '{name}' in query:\n{sql}")]
    DuplicateParameter { name: String, sql: String },

    /// Placeholders left unbound, listed in ascending ordinal order
    #[error("Missing parameter values for the following parameters: [{}]", .missing.join(", "))]
    MissingParameters { missing: Vec<String>, sql: String },

    #[error("No parameters set")]
    NoParametersSet { sql: String },

    /// A named placeholder has no counterpart field on the bound object
    #[error("No member named '{field}' on {target} for query parameter ':{parameter}'")]
    ReflectionBind {
        parameter: String,
        field: String,
        target: &'static str,
    },

    #[error("Custom-mapped field {field} not found in {target} for result set column {column}")]
    UnknownMappedField {
        column: String,
        field: String,
        target: &'static str,
    },

    #[error("Cannot assign NULL to non-nullable member '{field}' of type {target}")]
    NullToPrimitive { field: String, target: &'static str },

    #[error("Value '{value}' is not a variant of enum {target}")]
    EnumCoercion { value: String, target: &'static str },

    #[error("Cannot coerce {value} into {target}")]
    ScalarCoercion { value: String, target: &'static str },

    #[error("Query returned no rows, expected exactly one:\n{sql}")]
    EmptyResult { sql: String },

    #[error("Query returned more than one row, expected exactly one:\n{sql}")]
    NonUniqueResult { sql: String },

    #[error("Loading {target} into a map requires a declared key field")]
    MissingKeyFieldDeclaration { target: &'static str },

    #[error("Map key field '{field}' not found in {target}")]
    UnknownKeyField { field: String, target: &'static str },

    /// A row produced a NULL key while loading a keyed map
    #[error("Null value encountered for key field '{field}' at row {row} while constructing {target}; check that the query's column names match the record's fields")]
    NullMapKey {
        field: String,
        row: usize,
        target: &'static str,
    },

    #[error("Cannot interpret query results as {shape}")]
    UnsupportedReturnShape { shape: String },

    #[error("Batch chunk size must be positive, got {0}")]
    InvalidChunkSize(usize),

    /// A chunk of a batch failed; `row` is relative to the chunk
    #[error("Batch chunk {chunk} failed at row {row}: {source}")]
    BatchExecution {
        chunk: usize,
        row: usize,
        #[source]
        source: Box<Error>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error from SQLx database operations
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<regex::Error> for Error {
    fn from(error: regex::Error) -> Self {
        Error::MalformedQuery(error.to_string())
    }
}

/// Result type alias for sqlx-plus operations
pub type Result<T> = std::result::Result<T, Error>;
