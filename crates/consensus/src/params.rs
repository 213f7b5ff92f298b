//! Per-network chain parameters.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

#[derive(Clone, Debug)]
pub struct ChainParams {
    pub network: Network,
    /// Human-readable part for bech32 witness addresses.
    pub bech32_hrp: &'static str,
    pub default_port: u16,
}

pub fn chain_params(network: Network) -> ChainParams {
    match network {
        Network::Mainnet => ChainParams {
            network,
            bech32_hrp: "pc",
            default_port: 9633,
        },
        Network::Testnet => ChainParams {
            network,
            bech32_hrp: "tp",
            default_port: 19633,
        },
        Network::Regtest => ChainParams {
            network,
            bech32_hrp: "rp",
            default_port: 29633,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hrp_per_network() {
        assert_eq!(chain_params(Network::Mainnet).bech32_hrp, "pc");
        assert_eq!(chain_params(Network::Testnet).bech32_hrp, "tp");
        assert_ne!(
            chain_params(Network::Mainnet).default_port,
            chain_params(Network::Regtest).default_port
        );
    }
}
