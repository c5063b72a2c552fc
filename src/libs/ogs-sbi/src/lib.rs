//! NextGCore SBI (Service Based Interface) Library
//!
//! Shared SBI facilities for the binding support path:
//!
//! - [`types`] - Service types and NF types
//! - [`constants`] - HTTP methods, resource names, headers and content types
//! - [`message`] - Request artifact, OpenAPI models and `build_request`
//! - [`context`] - NF instance records and the NF instance directory
//! - [`error`] - Error types
//!
//! ```rust
//! use ogs_sbi::constants::{api, method, resource};
//! use ogs_sbi::{build_request, SbiHeader, SbiMessage, SbiServiceType};
//!
//! let message = SbiMessage {
//!     header: SbiHeader::new(method::DELETE, SbiServiceType::NbsfManagement, api::V1)
//!         .with_resource(resource::PCF_BINDINGS)
//!         .with_resource("1"),
//!     pcf_binding: None,
//! };
//! let request = build_request(&message).unwrap();
//! assert_eq!(request.uri, "/nbsf-management/v1/pcfBindings/1");
//! ```

pub mod constants;
pub mod context;
pub mod error;
pub mod message;
pub mod types;

pub use context::{NfAssocState, NfInstance, NfInstanceDirectory, NfInstanceRef, NfStatus};
pub use error::{SbiError, SbiResult};
pub use message::{build_request, PcfBinding, SbiHeader, SbiMessage, SbiRequest, Snssai};
pub use types::{NfType, SbiServiceType};
