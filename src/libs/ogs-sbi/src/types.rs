//! SBI Types
//!
//! Service and NF type enumerations used by the binding support path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SBI Service Types - subset of ogs_sbi_service_type_e used by binding management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SbiServiceType {
    NnrfNfm,
    NnrfDisc,
    NpcfSmpolicycontrol,
    NpcfPolicyauthorization,
    NbsfManagement,
}

impl SbiServiceType {
    /// Convert service type to service name string
    pub fn to_name(&self) -> &'static str {
        match self {
            Self::NnrfNfm => "nnrf-nfm",
            Self::NnrfDisc => "nnrf-disc",
            Self::NpcfSmpolicycontrol => "npcf-smpolicycontrol",
            Self::NpcfPolicyauthorization => "npcf-policyauthorization",
            Self::NbsfManagement => "nbsf-management",
        }
    }

}

impl fmt::Display for SbiServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_name())
    }
}

/// NF Type enumeration - matches OpenAPI_nf_type_e
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NfType {
    Nrf,
    Amf,
    Smf,
    Nef,
    Pcf,
    Af,
    Bsf,
    Scp,
}

impl NfType {
    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Nrf => "NRF",
            Self::Amf => "AMF",
            Self::Smf => "SMF",
            Self::Nef => "NEF",
            Self::Pcf => "PCF",
            Self::Af => "AF",
            Self::Bsf => "BSF",
            Self::Scp => "SCP",
        }
    }
}

impl fmt::Display for NfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}
