// Version information for the chat relay

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-signed-relay-2026-10-18";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2026-10-18";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "ecdsa-client-signatures",
    "history-replay",
    "push-relay",
    "listen-relay",
    "duplex-chat-relay",
    "http-publish",
    "file-journal",
    "graceful-shutdown",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Chat Relay {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
