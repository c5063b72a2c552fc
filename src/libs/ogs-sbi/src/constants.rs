//! SBI Constants
//!
//! HTTP methods, resource names and content types
//! used on the binding management interface.

/// HTTP Methods
pub mod method {
    pub const DELETE: &str = "DELETE";
    pub const POST: &str = "POST";
}

/// API Versions
pub mod api {
    pub const V1: &str = "v1";
}

/// Resource Names
pub mod resource {
    pub const PCF_BINDINGS: &str = "pcfBindings";
}

/// HTTP Headers
pub mod header {
    pub const ACCEPT: &str = "Accept";
    pub const CONTENT_TYPE: &str = "Content-Type";
}

/// Content Types
pub mod content_type {
    pub const APPLICATION_JSON: &str = "application/json";
    pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";
}
