use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("column '{column}' not found in {table}")]
    MissingColumn { column: String, table: String },

    #[error("could not generate External ID for metadata row {row}: no External ID, st_q4 or bl_q4 value")]
    ExternalId { row: String },

    #[error("no checksum found for file {file}")]
    ChecksumNotFound { file: String },

    #[error("checksum mismatch for {file}: expected {expected}, found {found}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        found: String,
    },

    #[error("target directory {dir} does not exist")]
    MissingTargetDir { dir: String },

    #[error("could not find metadata for any of the samples: {samples}")]
    NoSampleMetadata { samples: String },

    #[error("could not derive sample identifiers from file {file}")]
    SampleIds { file: String },

    #[error("manifest entry '{line}' has no data type and no default data type was given")]
    UntypedManifestEntry { line: String },

    #[error("DCC request to {url} failed with status {status}: {body}")]
    Dcc {
        url: String,
        status: u16,
        body: String,
    },

    #[error("could not identify viromics sample {sample_id} in clinical metadata")]
    ViromicsId { sample_id: String },
}
