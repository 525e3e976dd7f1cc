use thiserror::Error;

#[derive(Error, Debug)]
pub enum PropahError {
    #[error("missing required parameter '{0}'")]
    Builder(&'static str),

    #[error("invalid propagation config: {0}")]
    Config(#[from] serde_json::Error),
}
