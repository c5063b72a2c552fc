//! NextGCore BSF (Binding Support Function) Library
//!
//! Session binding registry for the BSF:
//! - Session registry indexed by SUPI+S-NSSAI, IPv4 address, IPv6 prefix and binding id
//! - Reference-counted NF instance association
//! - Nbsf_Management binding registration requests

pub mod bsf_sm;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod nbsf_build;
pub mod nf_sm;
pub mod sbi_path;


// Re-export commonly used types
pub use bsf_sm::{BsfSmContext, BsfState};
pub use config::{BsfConfig, BsfSection, NfInstanceConf};
pub use context::{
    bsf_context_final, bsf_context_init, bsf_self, get_sess_load, BsfContext, BsfSess,
    Ipv6Prefix, SNssai, SessId, MAX_NUM_OF_SESS,
};
pub use error::{BsfError, BsfResult};
pub use event::{BsfEvent, BsfEventId, NfTarget, SessCreateData, SessKey};
pub use nbsf_build::{pcf_nbsf_management_build_de_register, pcf_nbsf_management_build_register};
pub use nf_sm::{BindOutcome, BsfNfSm, DefaultNfFinalizer, NfFinalizer, ReleaseOutcome};
pub use sbi_path::{RequestQueue, SbiTransport};
