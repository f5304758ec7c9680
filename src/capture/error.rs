/// Reasons a camera stream could not be acquired.
///
/// Acquisition failures are reported to the caller and never retried by the loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquireError {
    /// `acquire` was called before any device was selected.
    NoDeviceSelected,
    /// The device id is not in the catalog or the node disappeared.
    NotFound(String),
    /// The user or OS refused access to the device.
    PermissionDenied(String),
    /// Another process holds the device.
    Busy(String),
    /// Any other failure while opening or configuring the device.
    Io { device: String, message: String },
}

impl AcquireError {
    /// Stable machine-readable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            AcquireError::NoDeviceSelected => "ACQUIRE_NO_DEVICE",
            AcquireError::NotFound(_) => "ACQUIRE_NOT_FOUND",
            AcquireError::PermissionDenied(_) => "ACQUIRE_PERMISSION_DENIED",
            AcquireError::Busy(_) => "ACQUIRE_BUSY",
            AcquireError::Io { .. } => "ACQUIRE_IO",
        }
    }

    /// Map an OS error from opening `device`.
    pub fn from_io(device: &str, err: &std::io::Error) -> Self {
        const EBUSY: i32 = 16;
        match err.kind() {
            std::io::ErrorKind::NotFound => AcquireError::NotFound(device.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                AcquireError::PermissionDenied(device.to_string())
            }
            _ if err.raw_os_error() == Some(EBUSY) => AcquireError::Busy(device.to_string()),
            _ => AcquireError::Io {
                device: device.to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl std::fmt::Display for AcquireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquireError::NoDeviceSelected => write!(f, "{}: no device selected", self.code()),
            AcquireError::NotFound(device) => {
                write!(f, "{}: device {} not found", self.code(), device)
            }
            AcquireError::PermissionDenied(device) => {
                write!(f, "{}: access to {} was denied", self.code(), device)
            }
            AcquireError::Busy(device) => {
                write!(f, "{}: device {} is busy", self.code(), device)
            }
            AcquireError::Io { device, message } => {
                write!(f, "{}: failed to open {}: {}", self.code(), device, message)
            }
        }
    }
}

impl std::error::Error for AcquireError {}
