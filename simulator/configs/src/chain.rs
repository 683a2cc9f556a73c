use std::{collections::BTreeMap, fmt, str::FromStr};

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use serde_with::{DisplayFromStr, serde_as};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum HexDecodeError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// Decode an optionally `0x`-prefixed hex string into exactly `N` bytes.
pub fn decode_fixed<const N: usize>(raw: &str) -> Result<[u8; N], HexDecodeError> {
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(raw)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| HexDecodeError::Length {
        expected: N,
        actual: bytes.len(),
    })
}

/// 20-byte account or contract address.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0; 20]);

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Address derived from a seed string, used for deterministic accounts.
    #[must_use]
    pub fn from_seed(seed: &str) -> Self {
        let digest = Sha256::digest(seed.as_bytes());
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Self(out)
    }

    /// Address of the contract created by `sender` at `nonce`.
    #[must_use]
    pub fn contract(sender: &Self, nonce: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(sender.0);
        hasher.update(nonce.to_be_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Self(out)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = HexDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s).map(Self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// 32-byte SHA-256 digest identifying headers, transactions and state.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Self = Self([0; 32]);
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Hash {
    type Err = HexDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s).map(Self)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenesisError {
    #[error("genesis gas limit must be > 0")]
    ZeroGasLimit,
    #[error("genesis difficulty must be > 0")]
    ZeroDifficulty,
    #[error("genesis chain id must be > 0")]
    ZeroChainId,
}

/// Genesis specification shared by every node of a cluster.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub chain_id: u64,
    pub gas_limit: u64,
    pub difficulty: u64,
    #[serde_as(as = "BTreeMap<_, DisplayFromStr>")]
    pub alloc: BTreeMap<Address, BigUint>,
}

impl Genesis {
    pub fn validate(&self) -> Result<(), GenesisError> {
        if self.chain_id == 0 {
            return Err(GenesisError::ZeroChainId);
        }
        if self.gas_limit == 0 {
            return Err(GenesisError::ZeroGasLimit);
        }
        if self.difficulty == 0 {
            return Err(GenesisError::ZeroDifficulty);
        }
        Ok(())
    }

    /// Commitment over chain id and the allocation table.
    #[must_use]
    pub fn state_root(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.chain_id.to_be_bytes());
        for (address, balance) in &self.alloc {
            let balance = balance.to_bytes_be();
            hasher.update(address.0);
            hasher.update((balance.len() as u64).to_be_bytes());
            hasher.update(&balance);
        }
        Hash(hasher.finalize().into())
    }

    #[must_use]
    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            number: 0,
            parent_hash: Hash::ZERO,
            state_root: self.state_root(),
            tx_root: Hash::ZERO,
            coinbase: Address::ZERO,
            timestamp: 0,
            difficulty: self.difficulty,
            gas_limit: self.gas_limit,
        }
    }

    #[must_use]
    pub fn hash(&self) -> Hash {
        self.header().hash()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub parent_hash: Hash,
    pub state_root: Hash,
    pub tx_root: Hash,
    pub coinbase: Address,
    pub timestamp: u64,
    pub difficulty: u64,
    pub gas_limit: u64,
}

impl BlockHeader {
    #[must_use]
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.number.to_be_bytes());
        hasher.update(self.parent_hash.0);
        hasher.update(self.state_root.0);
        hasher.update(self.tx_root.0);
        hasher.update(self.coinbase.0);
        hasher.update(self.timestamp.to_be_bytes());
        hasher.update(self.difficulty.to_be_bytes());
        hasher.update(self.gas_limit.to_be_bytes());
        Hash(hasher.finalize().into())
    }
}

/// Contracts the bootstrap chain can deploy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractKind {
    CheckpointOracle {
        admins: Vec<Address>,
        section_size: u64,
        process_confirms: u64,
        threshold: u64,
    },
    LotteryBook,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub nonce: u64,
    pub gas_price: u64,
    pub contract: ContractKind,
    pub created: Address,
}

impl Transaction {
    #[must_use]
    pub fn hash(&self) -> Hash {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        Hash(Sha256::digest(&encoded).into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    #[must_use]
    pub const fn number(&self) -> u64 {
        self.header.number
    }

    /// Root committing to `transactions` in order.
    #[must_use]
    pub fn tx_root(transactions: &[Transaction]) -> Hash {
        if transactions.is_empty() {
            return Hash::ZERO;
        }
        let mut hasher = Sha256::new();
        for tx in transactions {
            hasher.update(tx.hash().0);
        }
        Hash(hasher.finalize().into())
    }
}

/// Initial chain state: the genesis plus pre-generated blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainConfig {
    pub genesis: Genesis,
    #[serde(default)]
    pub chain: Vec<Block>,
}

impl BlockchainConfig {
    #[must_use]
    pub fn headers(&self) -> Vec<BlockHeader> {
        self.chain.iter().map(|block| block.header.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_round_trips_through_display() {
        let address = Address::from_seed("alice");
        let parsed: Address = address.to_string().parse().unwrap();
        assert_eq!(parsed, address);
        assert!(address.to_string().starts_with("0x"));
    }

    #[test]
    fn address_rejects_wrong_length() {
        let err = "0xdeadbeef".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            HexDecodeError::Length {
                expected: 20,
                actual: 4
            }
        );
    }

    #[test]
    fn contract_address_depends_on_nonce() {
        let sender = Address::from_seed("sender");
        assert_ne!(Address::contract(&sender, 0), Address::contract(&sender, 1));
        assert_eq!(Address::contract(&sender, 0), Address::contract(&sender, 0));
    }

    #[test]
    fn genesis_validation_rejects_zero_gas_limit() {
        let genesis = Genesis {
            chain_id: 1,
            gas_limit: 0,
            difficulty: 1,
            alloc: BTreeMap::new(),
        };
        assert_eq!(genesis.validate(), Err(GenesisError::ZeroGasLimit));
    }

    #[test]
    fn genesis_hash_covers_allocation() {
        let mut genesis = Genesis {
            chain_id: 1337,
            gas_limit: 10,
            difficulty: 10,
            alloc: BTreeMap::new(),
        };
        let empty = genesis.hash();
        genesis
            .alloc
            .insert(Address::from_seed("funded"), BigUint::from(5u32));
        assert_ne!(genesis.hash(), empty);
    }

    #[test]
    fn genesis_balances_serialize_as_decimal_strings() {
        let mut alloc = BTreeMap::new();
        alloc.insert(Address::ZERO, BigUint::from(10u32).pow(18));
        let genesis = Genesis {
            chain_id: 1,
            gas_limit: 1,
            difficulty: 1,
            alloc,
        };
        let json = serde_json::to_value(&genesis).unwrap();
        assert_eq!(
            json["alloc"]["0x0000000000000000000000000000000000000000"],
            serde_json::json!("1000000000000000000")
        );
        let back: Genesis = serde_json::from_value(json).unwrap();
        assert_eq!(back, genesis);
    }
}
