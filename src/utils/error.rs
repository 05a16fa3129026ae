use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModbusError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("Incomplete frame: expected {expected} bytes, received {received}")]
    IncompleteFrame { expected: usize, received: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Lock acquisition failed")]
    LockError,

    #[error("Sensor name already registered: {0}")]
    DuplicateName(String),

    #[error("Sensor not found: {0}")]
    UnknownSensor(String),

    #[error("Unknown sensor type: {0}")]
    UnknownSensorType(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Sensor '{sensor}' has no channel {channel}")]
    InvalidChannel { sensor: String, channel: usize },

    #[error("Collector is already running")]
    CollectorRunning,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ModbusError {
    /// Errors caused by the caller's input rather than the bus.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ModbusError::DuplicateName(_)
                | ModbusError::UnknownSensor(_)
                | ModbusError::UnknownSensorType(_)
                | ModbusError::InvalidAddress(_)
                | ModbusError::InvalidChannel { .. }
        )
    }

    /// Short machine-readable code for boundary responses.
    pub fn code(&self) -> &'static str {
        match self {
            ModbusError::ConnectionError(_) | ModbusError::CommunicationError(_) => "TRANSPORT_ERROR",
            ModbusError::IncompleteFrame { .. } => "INCOMPLETE_FRAME",
            ModbusError::InvalidFrame(_) => "INVALID_FRAME",
            ModbusError::LockError => "LOCK_ERROR",
            ModbusError::DuplicateName(_) => "DUPLICATE_NAME",
            ModbusError::UnknownSensor(_) => "UNKNOWN_SENSOR",
            ModbusError::UnknownSensorType(_) => "UNKNOWN_SENSOR_TYPE",
            ModbusError::InvalidAddress(_) => "INVALID_ADDRESS",
            ModbusError::InvalidChannel { .. } => "INVALID_CHANNEL",
            ModbusError::CollectorRunning => "COLLECTOR_RUNNING",
            ModbusError::ConfigError(_) => "CONFIG_ERROR",
            ModbusError::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<serde_json::Error> for ModbusError {
    fn from(err: serde_json::Error) -> Self {
        ModbusError::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        ModbusError::CommunicationError(format!("IO error: {}", err))
    }
}

impl From<toml::de::Error> for ModbusError {
    fn from(err: toml::de::Error) -> Self {
        ModbusError::ConfigError(format!("TOML error: {}", err))
    }
}
