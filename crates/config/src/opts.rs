use crate::EvmVersion;

#[cfg(feature = "clap")]
use clap::Args;

/// Code generator options.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(Args))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct CodegenOpts {
    /// EVM version to emit bytecode for.
    #[cfg_attr(feature = "clap", arg(long, value_enum, default_value_t))]
    pub evm_version: EvmVersion,
    /// Reuse the stack slots of variables that are no longer used.
    ///
    /// When disabled, every variable occupies its slot until the end of its block and return
    /// variables are allocated on function entry.
    #[cfg_attr(
        feature = "clap",
        arg(
            long = "no-optimize-stack-allocation",
            action = clap::ArgAction::SetFalse,
            default_value_t = true,
        )
    )]
    pub optimize_stack_allocation: bool,
}

impl Default for CodegenOpts {
    fn default() -> Self {
        Self { evm_version: EvmVersion::default(), optimize_stack_allocation: true }
    }
}

impl CodegenOpts {
    /// Returns the options for the given EVM version, with stack allocation optimized.
    pub fn new(evm_version: EvmVersion) -> Self {
        Self { evm_version, ..Default::default() }
    }

    /// Sets [`optimize_stack_allocation`](Self::optimize_stack_allocation).
    pub fn with_optimize_stack_allocation(mut self, yes: bool) -> Self {
        self.optimize_stack_allocation = yes;
        self
    }
}
