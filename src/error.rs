use thiserror::Error;

#[derive(Debug, Error)]
pub enum CivicDeskError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, CivicDeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CivicDeskError::Config("x".to_string());
        assert!(format!("{err}").contains("configuration error"));
        let err = CivicDeskError::NotFound("document 7".to_string());
        assert_eq!(format!("{err}"), "not found: document 7");
    }
}
