use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HgtError {
    #[error("invalid HGT name {0}")]
    Name(String),

    #[error("invalid HGT byte len {0}, not a square grid of i16 samples")]
    Len(usize),
}
