//! Configuration types shared by the stack code generator and its front-ends.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(test, allow(unused_crate_dependencies))]

mod opts;
pub use opts::CodegenOpts;

/// A version specifier of the EVM we want to compile to.
///
/// Defaults to the latest version deployed on Ethereum Mainnet at the time of release.
/// Names are camel-cased everywhere: `Display`, `FromStr`, serde and the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
    strum::EnumCount,
    strum::VariantNames,
)]
#[strum(serialize_all = "camelCase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[cfg_attr(feature = "clap", value(rename_all = "camelCase"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum EvmVersion {
    // NOTE: Order matters.
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
    London,
    Paris,
    Shanghai,
    #[default]
    Cancun,
    Prague,
}

impl EvmVersion {
    /// Returns the name of the version, as accepted by `FromStr`.
    pub fn to_str(self) -> &'static str {
        self.into()
    }

    pub fn supports_returndata(self) -> bool {
        self >= Self::Byzantium
    }
    pub fn has_static_call(self) -> bool {
        self >= Self::Byzantium
    }
    pub fn has_bitwise_shifting(self) -> bool {
        self >= Self::Constantinople
    }
    pub fn has_create2(self) -> bool {
        self >= Self::Constantinople
    }
    pub fn has_ext_code_hash(self) -> bool {
        self >= Self::Constantinople
    }
    pub fn has_chain_id(self) -> bool {
        self >= Self::Istanbul
    }
    pub fn has_self_balance(self) -> bool {
        self >= Self::Istanbul
    }
    pub fn has_base_fee(self) -> bool {
        self >= Self::London
    }
    pub fn has_prev_randao(self) -> bool {
        self >= Self::Paris
    }
    pub fn has_push0(self) -> bool {
        self >= Self::Shanghai
    }
    pub fn has_transient_storage(self) -> bool {
        self >= Self::Cancun
    }
    pub fn has_mcopy(self) -> bool {
        self >= Self::Cancun
    }
    pub fn has_blob_hash(self) -> bool {
        self >= Self::Cancun
    }
    pub fn has_blob_base_fee(self) -> bool {
        self >= Self::Cancun
    }
}
