use les_simulator_config::chain::{Address, Block, BlockHeader, Genesis, Hash};

use super::{ChainError, bootstrap::next_block_with};

/// Header-only chain kept by light clients.
#[derive(Clone, Debug)]
pub struct HeaderChain {
    headers: Vec<BlockHeader>,
}

impl HeaderChain {
    #[must_use]
    pub fn new(genesis: &Genesis) -> Self {
        Self {
            headers: vec![genesis.header()],
        }
    }

    #[must_use]
    pub fn head(&self) -> &BlockHeader {
        // The genesis header is never removed.
        &self.headers[self.headers.len() - 1]
    }

    #[must_use]
    pub fn genesis_hash(&self) -> Hash {
        self.headers[0].hash()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Append `headers`, skipping those already known. Returns the number of
    /// headers that were new.
    pub fn insert_headers(&mut self, headers: &[BlockHeader]) -> Result<usize, ChainError> {
        let mut inserted = 0;
        for header in headers {
            if link(&self.headers, header)? {
                self.headers.push(header.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

/// Full chain kept by servers.
#[derive(Clone, Debug)]
pub struct BlockChain {
    genesis: BlockHeader,
    blocks: Vec<Block>,
}

impl BlockChain {
    #[must_use]
    pub fn new(genesis: &Genesis) -> Self {
        Self {
            genesis: genesis.header(),
            blocks: Vec::new(),
        }
    }

    #[must_use]
    pub fn head(&self) -> &BlockHeader {
        self.blocks
            .last()
            .map_or(&self.genesis, |block| &block.header)
    }

    #[must_use]
    pub fn genesis_hash(&self) -> Hash {
        self.genesis.hash()
    }

    #[must_use]
    pub fn block(&self, number: u64) -> Option<&Block> {
        let index = usize::try_from(number.checked_sub(1)?).ok()?;
        self.blocks.get(index)
    }

    /// Append `blocks`, skipping those already known. Returns the number of
    /// blocks that were new.
    pub fn insert_chain(&mut self, blocks: &[Block]) -> Result<usize, ChainError> {
        let mut inserted = 0;
        for block in blocks {
            let expected = Block::tx_root(&block.transactions);
            if block.header.tx_root != expected {
                return Err(ChainError::TxRootMismatch {
                    number: block.number(),
                });
            }
            let headers = self.headers();
            if link(&headers, &block.header)? {
                self.blocks.push(block.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Seal an empty block on top of the current head.
    pub fn produce_block(&mut self, coinbase: Address, timestamp: u64) -> &Block {
        let block = next_block_with(self.head(), Vec::new(), coinbase, timestamp);
        self.blocks.push(block);
        let last = self.blocks.len() - 1;
        &self.blocks[last]
    }

    fn headers(&self) -> Vec<BlockHeader> {
        std::iter::once(self.genesis.clone())
            .chain(self.blocks.iter().map(|block| block.header.clone()))
            .collect()
    }
}

/// Decide whether `header` extends `known`. `Ok(false)` means it is already
/// part of `known`.
fn link(known: &[BlockHeader], header: &BlockHeader) -> Result<bool, ChainError> {
    let head = &known[known.len() - 1];
    let number = header.number;

    if number <= head.number {
        let existing = usize::try_from(number)
            .ok()
            .and_then(|index| known.get(index));
        return match existing {
            Some(existing) if existing.hash() == header.hash() => Ok(false),
            _ => Err(ChainError::Conflict { number }),
        };
    }
    if number != head.number + 1 {
        return Err(ChainError::NonContiguous {
            expected: head.number + 1,
            actual: number,
        });
    }
    if header.parent_hash != head.hash() {
        return Err(ChainError::UnknownParent {
            number,
            parent: header.parent_hash,
        });
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::chain::bootstrap::next_block;

    fn genesis() -> Genesis {
        Genesis {
            chain_id: 1,
            gas_limit: 10,
            difficulty: 10,
            alloc: BTreeMap::new(),
        }
    }

    fn blocks(genesis: &Genesis, count: usize) -> Vec<Block> {
        let mut parent = genesis.header();
        let mut out = Vec::new();
        for _ in 0..count {
            let block = next_block(&parent, Vec::new());
            parent = block.header.clone();
            out.push(block);
        }
        out
    }

    #[test]
    fn header_chain_skips_known_headers() {
        let genesis = genesis();
        let headers: Vec<_> = blocks(&genesis, 3).into_iter().map(|b| b.header).collect();
        let mut chain = HeaderChain::new(&genesis);

        assert_eq!(chain.insert_headers(&headers).unwrap(), 3);
        assert_eq!(chain.insert_headers(&headers).unwrap(), 0);
        assert_eq!(chain.head().number, 3);
        assert_eq!(chain.genesis_hash(), genesis.hash());
    }

    #[test]
    fn gaps_are_rejected() {
        let genesis = genesis();
        let headers: Vec<_> = blocks(&genesis, 3).into_iter().map(|b| b.header).collect();
        let mut chain = HeaderChain::new(&genesis);

        let err = chain.insert_headers(&headers[1..]).unwrap_err();
        assert_eq!(
            err,
            ChainError::NonContiguous {
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn foreign_chain_is_rejected() {
        let other = Genesis {
            chain_id: 2,
            ..genesis()
        };
        let mut chain = BlockChain::new(&genesis());
        let err = chain.insert_chain(&blocks(&other, 1)).unwrap_err();
        assert!(matches!(err, ChainError::UnknownParent { number: 1, .. }));
    }

    #[test]
    fn block_chain_produces_on_head() {
        let genesis = genesis();
        let mut chain = BlockChain::new(&genesis);
        chain.insert_chain(&blocks(&genesis, 2)).unwrap();

        let produced = chain.produce_block(Address::from_seed("miner"), 99).clone();
        assert_eq!(produced.number(), 3);
        assert_eq!(chain.head(), &produced.header);
        assert_eq!(chain.block(3), Some(&produced));
        assert!(chain.block(0).is_none());
    }
}
