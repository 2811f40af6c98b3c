pub type DmxResult<T> = Result<T, DmxError>;

#[derive(thiserror::Error, Debug)]
pub enum DmxError {
    /// Invalid geometry, missing file or malformed scene document.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(
        "capacity exceeded: universe {universe} has {available} free channels, {requested} requested"
    )]
    CapacityExceeded {
        universe: u16,
        requested: usize,
        available: usize,
    },

    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    #[error("a scene manager is already active")]
    AlreadyActive,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DmxError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport_unavailable(msg: impl Into<String>) -> Self {
        Self::TransportUnavailable(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(DmxError::configuration("x")
            .to_string()
            .starts_with("configuration error:"));
        assert!(DmxError::transport_unavailable("x")
            .to_string()
            .starts_with("transport unavailable:"));
        let capacity = DmxError::CapacityExceeded {
            universe: 3,
            requested: 48,
            available: 12,
        };
        assert!(capacity.to_string().contains("universe 3"));
    }

    #[test]
    fn io_errors_convert() {
        let base = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DmxError = base.into();
        assert!(err.to_string().contains("gone"));
        assert!(!err.is_configuration());
    }
}
