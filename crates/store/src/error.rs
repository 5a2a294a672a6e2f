use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no table named '{0}'")]
    UnknownTable(String),

    #[error("duplicate key {key} in table '{table}'")]
    DuplicateKey { table: String, key: String },

    #[error("no row with {field} = {key} in table '{table}'")]
    MissingRow {
        table: String,
        field: String,
        key: String,
    },

    #[error("no transaction is active on table '{0}'")]
    NoTransaction(String),

    #[error("a transaction is already active on table '{0}'")]
    TransactionActive(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum CursorStoreError {
    #[error("cursor store backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("cursor serialization failed: {0}")]
    Serialization(#[from] bincode::Error),
}
