//! Deterministic deployments through a CREATE2 factory.
//!
//! The factory is the keyless deterministic deployment proxy: calldata is
//! `salt ++ init_code` and the contract lands at
//! `keccak256(0xff ++ factory ++ salt ++ keccak256(init_code))[12..]`.

use alloy_core::primitives::{Address, B256, Bytes, U64, address, keccak256};

use crate::chain::{ChainClient, TransactionReceipt, TransactionRequest};

/// Address of the deterministic deployment proxy, identical on every EVM chain it exists on.
pub const DEFAULT_FACTORY: Address = address!("0x4e59b44847b379578588920cA78FbF26c0B4956C");

/// Turn a configured salt string into the 32-byte CREATE2 salt.
///
/// A `0x`-prefixed 32-byte hex string is used verbatim; anything else is hashed.
pub fn encode_salt(salt: &str) -> Result<B256, String> {
    if let Some(hex_digits) = salt.strip_prefix("0x") {
        if hex_digits.len() == 64 {
            return salt.parse::<B256>().map_err(|e| e.to_string());
        }
        if hex_digits.chars().all(|c| c.is_ascii_hexdigit()) && !hex_digits.is_empty() {
            return Err(format!(
                "hex salt must be 32 bytes, got {} hex digits",
                hex_digits.len()
            ));
        }
    }
    Ok(keccak256(salt.as_bytes()))
}

/// Creation code followed by the encoded constructor arguments.
pub fn init_code(bytecode: &Bytes, constructor_args: &Bytes) -> Bytes {
    let mut code = Vec::with_capacity(bytecode.len() + constructor_args.len());
    code.extend_from_slice(bytecode);
    code.extend_from_slice(constructor_args);
    code.into()
}

/// Client for a CREATE2 factory contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Create2Factory {
    pub address: Address,
}

impl Default for Create2Factory {
    fn default() -> Self {
        Self {
            address: DEFAULT_FACTORY,
        }
    }
}

/// Result of a deterministic deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Create2Outcome {
    /// A contract was already present at the computed address.
    Existing(Address),
    /// The factory deployed the contract.
    Deployed {
        address: Address,
        receipt: TransactionReceipt,
    },
}

impl Create2Outcome {
    pub fn address(&self) -> Address {
        match self {
            Self::Existing(address) | Self::Deployed { address, .. } => *address,
        }
    }
}

impl Create2Factory {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// The address `init_code` deploys to with `salt`. Independent of the sender.
    pub fn compute_address(&self, salt: B256, init_code: &Bytes) -> Address {
        self.address.create2(salt, keccak256(init_code))
    }

    /// Deploy `init_code` unless code already lives at its deterministic address.
    pub async fn deploy<C: ChainClient>(
        &self,
        chain: &C,
        from: Address,
        salt: B256,
        init_code: Bytes,
        gas: Option<u64>,
    ) -> anyhow::Result<Create2Outcome> {
        let address = self.compute_address(salt, &init_code);

        if !chain.code_at(address).await?.is_empty() {
            tracing::debug!(%address, "Contract already present at deterministic address");
            return Ok(Create2Outcome::Existing(address));
        }

        if chain.code_at(self.address).await?.is_empty() {
            anyhow::bail!("no CREATE2 factory deployed at {}", self.address);
        }

        let mut data = Vec::with_capacity(32 + init_code.len());
        data.extend_from_slice(salt.as_slice());
        data.extend_from_slice(&init_code);

        let receipt = chain
            .submit(TransactionRequest {
                from,
                to: Some(self.address),
                data: data.into(),
                gas: gas.map(U64::from),
            })
            .await?;

        if chain.code_at(address).await?.is_empty() {
            anyhow::bail!(
                "factory transaction {} succeeded but no code was deployed at {address}",
                receipt.transaction_hash
            );
        }

        Ok(Create2Outcome::Deployed { address, receipt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{b256, bytes};

    #[test]
    fn test_hex_salt_used_verbatim() {
        let salt = "0x0000000000000000000000000000000000000000000000000000000000000001";
        assert_eq!(
            encode_salt(salt).unwrap(),
            b256!("0x0000000000000000000000000000000000000000000000000000000000000001")
        );
    }

    #[test]
    fn test_text_salt_is_hashed() {
        assert_eq!(
            encode_salt("MF-DCAV2-DCAHubCompanion-V1").unwrap(),
            keccak256("MF-DCAV2-DCAHubCompanion-V1")
        );
    }

    #[test]
    fn test_short_hex_salt_is_rejected() {
        assert!(encode_salt("0x1234").is_err());
    }

    #[test]
    fn test_compute_address_known_vector() {
        // EIP-1014 example 1: zero deployer, zero salt, init code 0x00.
        let factory = Create2Factory::new(Address::ZERO);
        assert_eq!(
            factory.compute_address(B256::ZERO, &bytes!("00")),
            address!("0x4D1A2e2bB4F88F0250f26Ffff098B0b30B26BF38")
        );
    }

    #[test]
    fn test_compute_address_is_stable() {
        let factory = Create2Factory::default();
        let code = init_code(&bytes!("6080604052"), &bytes!("00000000000000000000000000000000000000000000000000000000000000aa"));
        let salt = encode_salt("v1").unwrap();
        assert_eq!(
            factory.compute_address(salt, &code),
            factory.compute_address(salt, &code)
        );
        assert_ne!(
            factory.compute_address(salt, &code),
            factory.compute_address(encode_salt("v2").unwrap(), &code)
        );
    }
}
