/// Error code registry for photopipe
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Step selection errors
/// - 3000-3999: Storage errors
/// - 4000-4999: Provisioning and execution errors
/// - 5000-5999: Pipeline errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_YAML: u16 = 1002;
    pub const CONFIG_INVALID_JSON: u16 = 1003;
    pub const CONFIG_INVALID_TOML: u16 = 1004;
    pub const CONFIG_INVALID_VALUE: u16 = 1005;
    pub const CONFIG_SOURCE_MISSING: u16 = 1006;
    pub const CONFIG_CAMERA_DATABASE_MISSING: u16 = 1007;
    pub const CONFIG_INVALID_PIPELINE: u16 = 1008;

    // Step selection errors (2000-2999)
    pub const SELECT_UNKNOWN_LABEL: u16 = 2001;
    pub const SELECT_INDEX_OUT_OF_RANGE: u16 = 2002;
    pub const SELECT_EMPTY_RANGE: u16 = 2003;

    // Storage errors (3000-3999)
    pub const STORAGE_GENERIC: u16 = 3000;
    pub const STORAGE_IO_ERROR: u16 = 3001;
    pub const STORAGE_PERMISSION_DENIED: u16 = 3002;
    pub const STORAGE_NOT_FOUND: u16 = 3004;
    pub const STORAGE_LOG_WRITE_FAILED: u16 = 3005;
    pub const STORAGE_COPY_FAILED: u16 = 3006;

    // Provisioning and execution errors (4000-4999)
    pub const EXEC_GENERIC: u16 = 4000;
    pub const EXEC_COMMAND_NOT_FOUND: u16 = 4001;
    pub const EXEC_TIMEOUT: u16 = 4002;
    pub const EXEC_SUBPROCESS_FAILED: u16 = 4003;
    pub const EXEC_SIGNAL_RECEIVED: u16 = 4005;
    pub const EXEC_SPAWN_FAILED: u16 = 4007;
    pub const PROVISION_FAILED: u16 = 4100;
    pub const PROVISION_TIMEOUT: u16 = 4101;
    pub const PROVISION_NO_HANDLE: u16 = 4102;

    // Pipeline errors (5000-5999)
    pub const PIPELINE_GENERIC: u16 = 5000;
    pub const PIPELINE_TEMPLATE_UNKNOWN_PLACEHOLDER: u16 = 5012;
    pub const PIPELINE_TEMPLATE_UNBALANCED: u16 = 5013;
    pub const PIPELINE_CANCELLED: u16 = 5006;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_INVALID_YAML => "Invalid YAML syntax in pipeline definition",
        ErrorCode::CONFIG_INVALID_JSON => "Invalid JSON syntax in pipeline definition",
        ErrorCode::CONFIG_INVALID_TOML => "Invalid TOML syntax in settings file",
        ErrorCode::CONFIG_INVALID_VALUE => "Invalid configuration value",
        ErrorCode::CONFIG_SOURCE_MISSING => "Source image directory not found",
        ErrorCode::CONFIG_CAMERA_DATABASE_MISSING => "Camera sensor database not found",
        ErrorCode::CONFIG_INVALID_PIPELINE => "Pipeline definition failed validation",

        ErrorCode::SELECT_UNKNOWN_LABEL => "No step with this label",
        ErrorCode::SELECT_INDEX_OUT_OF_RANGE => "Step index out of range",
        ErrorCode::SELECT_EMPTY_RANGE => "Step range selects no steps",

        ErrorCode::STORAGE_GENERIC => "General storage error",
        ErrorCode::STORAGE_IO_ERROR => "I/O operation failed",
        ErrorCode::STORAGE_PERMISSION_DENIED => "Permission denied",
        ErrorCode::STORAGE_NOT_FOUND => "File or directory not found",
        ErrorCode::STORAGE_LOG_WRITE_FAILED => "Failed to write session log",
        ErrorCode::STORAGE_COPY_FAILED => "Failed to copy source images",

        ErrorCode::EXEC_GENERIC => "General execution error",
        ErrorCode::EXEC_COMMAND_NOT_FOUND => "Command not found",
        ErrorCode::EXEC_TIMEOUT => "Command timed out",
        ErrorCode::EXEC_SUBPROCESS_FAILED => "External tool exited with non-zero status",
        ErrorCode::EXEC_SIGNAL_RECEIVED => "External tool terminated by signal",
        ErrorCode::EXEC_SPAWN_FAILED => "Failed to spawn process",
        ErrorCode::PROVISION_FAILED => "Container failed to start",
        ErrorCode::PROVISION_TIMEOUT => "Container did not become ready in time",
        ErrorCode::PROVISION_NO_HANDLE => "Container runtime returned no container id",

        ErrorCode::PIPELINE_GENERIC => "General pipeline error",
        ErrorCode::PIPELINE_TEMPLATE_UNKNOWN_PLACEHOLDER => "Unknown placeholder in step command",
        ErrorCode::PIPELINE_TEMPLATE_UNBALANCED => "Unbalanced brace in step command",
        ErrorCode::PIPELINE_CANCELLED => "Run cancelled before the next step",

        _ => "Unknown error code",
    }
}
