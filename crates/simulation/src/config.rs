//! Simulation configuration and per-chain address books.
//!
//! Handlers never look addresses up globally: the [`AddressBook`] travels inside the
//! [`SimulationConfig`] handed to the [`crate::Interpreter`].

use alloy_chains::NamedChain;
use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// Morpho Blue singleton, deployed at the same address on mainnet and Base
pub const MORPHO_ADDRESS: Address = address!("BBBBBbbBBb9cC5e90e3b3Af64bdAF62C37EEFFCb");

/// Uniswap's Permit2, deployed at the same address on every chain
pub const PERMIT2_ADDRESS: Address = address!("000000000022D473030F116dDEE9F6B43aC78BA3");

/// Default bound on nested callback levels
pub const DEFAULT_MAX_CALLBACK_DEPTH: usize = 8;

/// Protocol contract addresses the handlers need to recognise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    pub morpho: Address,
    pub permit2: Address,
    /// The bundler adapter that users authorize to act on their positions
    pub bundler_adapter: Address,
    #[serde(default)]
    pub public_allocator: Option<Address>,
    #[serde(default)]
    pub wrapped_native: Option<Address>,
}

impl AddressBook {
    /// Known deployments, `None` for chains without one
    pub fn for_chain(chain: NamedChain) -> Option<Self> {
        match chain {
            NamedChain::Mainnet => Some(Self {
                morpho: MORPHO_ADDRESS,
                permit2: PERMIT2_ADDRESS,
                bundler_adapter: address!("4A6c312ec70E8747a587EE860a0353cd42Be0aE0"),
                public_allocator: Some(address!("fd32fA2ca22c76dD6E550706Ad913FC6CE91c75D")),
                wrapped_native: Some(address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")),
            }),
            NamedChain::Base => Some(Self {
                morpho: MORPHO_ADDRESS,
                permit2: PERMIT2_ADDRESS,
                bundler_adapter: address!("b98c948CFA24072e58935BC004a8A7b376AE746A"),
                public_allocator: Some(address!("A090dD1a701408Df1d4d0B85b716c87565f90467")),
                wrapped_native: Some(address!("4200000000000000000000000000000000000006")),
            }),
            _ => None,
        }
    }
}

/// Everything a simulation run depends on besides the snapshot and the actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub address_book: AddressBook,
    /// Whether permits and signed authorizations must carry a signature
    #[serde(default)]
    pub require_signatures: bool,
    #[serde(default = "default_max_callback_depth")]
    pub max_callback_depth: usize,
}

fn default_max_callback_depth() -> usize {
    DEFAULT_MAX_CALLBACK_DEPTH
}

impl SimulationConfig {
    pub fn new(address_book: AddressBook) -> Self {
        Self {
            address_book,
            require_signatures: false,
            max_callback_depth: DEFAULT_MAX_CALLBACK_DEPTH,
        }
    }

    /// Configuration for a chain with a known deployment
    pub fn for_chain(chain: NamedChain) -> Option<Self> {
        AddressBook::for_chain(chain).map(Self::new)
    }

    pub fn with_required_signatures(mut self, require_signatures: bool) -> Self {
        self.require_signatures = require_signatures;
        self
    }
}
