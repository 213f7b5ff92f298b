//! Memory-only ledger, mostly useful for testing and light-client work.

use std::collections::HashMap;
use std::sync::Mutex;

use plotd_consensus::{hash_to_hex, Hash256, ZERO_HASH};
use plotd_primitives::address::Address;
use plotd_primitives::{Block, BlockHeader, Transaction};

use crate::{LedgerError, TxRecord};

/// Location and spend status of one stored transaction version.
#[derive(Clone, Debug)]
struct TxInsertData {
    block_height: i32,
    offset: usize,
    spent: Vec<bool>,
}

impl TxInsertData {
    fn is_fully_spent(&self) -> bool {
        self.spent.iter().all(|spent| *spent)
    }
}

#[derive(Default)]
struct Inner {
    blocks: Vec<Block>,
    heights: HashMap<Hash256, i32>,
    /// A hash may map to several versions so long as every entry but the
    /// last is fully spent.
    txns: HashMap<Hash256, Vec<TxInsertData>>,
    closed: bool,
}

/// In-memory ledger. One store-wide lock serializes every operation; the
/// persistent variant is free to shard.
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block, spending the outputs its transactions reference. The
    /// first block is taken as genesis regardless of its parent hash; every
    /// later block must reference a stored parent. All transactions are
    /// validated before any state changes, so a failed insert leaves the
    /// ledger untouched.
    pub fn insert_block(&self, block: &Block) -> Result<i32, LedgerError> {
        let mut inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }

        if !inner.heights.contains_key(&block.header.prev_block) && !inner.blocks.is_empty() {
            return Err(LedgerError::MissingParent);
        }

        // Inputs may reference other transactions in this same block, so
        // index them up front. First occurrence wins, which also lets the
        // duplicate check below spot a repeated hash.
        let tx_hashes: Vec<Hash256> = block.transactions.iter().map(Transaction::txid).collect();
        let mut in_flight: HashMap<Hash256, usize> = HashMap::new();
        for (i, tx_hash) in tx_hashes.iter().enumerate() {
            in_flight.entry(*tx_hash).or_insert(i);
        }

        let new_height = inner.blocks.len() as i32;
        for (i, tx) in block.transactions.iter().enumerate() {
            for tx_in in &tx.vin {
                if tx_in.is_coinbase() {
                    continue;
                }
                if tx.is_coinbase() {
                    continue;
                }

                let prev = &tx_in.prevout;
                if let Some(&in_flight_index) = in_flight.get(&prev.hash) {
                    // In-block references must point backwards.
                    if i <= in_flight_index {
                        plotd_log::log_warn!(
                            "insert_block: tx {} references in-flight tx {} at or after itself",
                            hash_to_hex(&tx_hashes[i]),
                            hash_to_hex(&prev.hash)
                        );
                        return Err(LedgerError::MissingTx);
                    }
                } else {
                    let Some(origin) = inner.txns.get(&prev.hash) else {
                        plotd_log::log_warn!(
                            "insert_block: tx {} references unknown tx {}",
                            hash_to_hex(&tx_hashes[i]),
                            hash_to_hex(&prev.hash)
                        );
                        return Err(LedgerError::MissingTx);
                    };
                    let Some(origin_last) = origin.last() else {
                        return Err(LedgerError::MissingTx);
                    };
                    if prev.index as usize >= origin_last.spent.len() {
                        plotd_log::log_warn!(
                            "insert_block: tx {} output index {} out of range",
                            hash_to_hex(&prev.hash),
                            prev.index
                        );
                        return Err(LedgerError::MissingTx);
                    }
                }
            }

            // A transaction hash repeated inside one block.
            if let Some(&in_flight_index) = in_flight.get(&tx_hashes[i]) {
                if in_flight_index < i {
                    plotd_log::log_warn!(
                        "block contains duplicate transaction {}",
                        hash_to_hex(&tx_hashes[i])
                    );
                    return Err(LedgerError::DuplicateTx);
                }
            }

            // A reinserted hash is only allowed once the old version is
            // fully spent.
            if let Some(existing) = inner.txns.get(&tx_hashes[i]) {
                if let Some(last) = existing.last() {
                    if !last.is_fully_spent() {
                        plotd_log::log_warn!(
                            "attempt to insert duplicate transaction {}",
                            hash_to_hex(&tx_hashes[i])
                        );
                        return Err(LedgerError::DuplicateTx);
                    }
                }
            }
        }

        let block_hash = block.hash();
        inner.blocks.push(block.clone());
        inner.heights.insert(block_hash, new_height);

        // Record every transaction, then mark the outputs its inputs spend.
        for (i, tx) in block.transactions.iter().enumerate() {
            inner
                .txns
                .entry(tx_hashes[i])
                .or_default()
                .push(TxInsertData {
                    block_height: new_height,
                    offset: i,
                    spent: vec![false; tx.vout.len()],
                });
            if tx.is_coinbase() {
                continue;
            }

            for tx_in in &tx.vin {
                if tx_in.is_coinbase() {
                    continue;
                }
                if tx.is_coinbase() {
                    continue;
                }

                // Existence and range were validated above.
                let prev = &tx_in.prevout;
                if let Some(origin_last) = inner
                    .txns
                    .get_mut(&prev.hash)
                    .and_then(|list| list.last_mut())
                {
                    origin_last.spent[prev.index as usize] = true;
                }
            }
        }

        Ok(new_height)
    }

    /// Remove every block above the given one, unwinding spend state. Spend
    /// information is undone in reverse order because later transactions in
    /// a block may reference earlier ones.
    pub fn drop_after_block_by_hash(&self, hash: &Hash256) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }

        let height = *inner
            .heights
            .get(hash)
            .ok_or(LedgerError::BlockNotFound)?;

        while inner.blocks.len() as i32 > height + 1 {
            let Some(block) = inner.blocks.pop() else {
                break;
            };
            let block_hash = block.hash();
            inner.heights.remove(&block_hash);
            for tx in block.transactions.iter().rev() {
                let tx_hash = tx.txid();
                remove_tx(&mut inner.txns, tx, &tx_hash);
            }
        }

        Ok(())
    }

    pub fn exists_block_hash(&self, hash: &Hash256) -> Result<bool, LedgerError> {
        let inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }
        Ok(inner.heights.contains_key(hash))
    }

    pub fn fetch_block_by_hash(&self, hash: &Hash256) -> Result<Block, LedgerError> {
        let inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }
        match inner.heights.get(hash) {
            Some(&height) => Ok(inner.blocks[height as usize].clone()),
            None => Err(LedgerError::BlockNotFound),
        }
    }

    pub fn fetch_block_height_by_hash(&self, hash: &Hash256) -> Result<i32, LedgerError> {
        let inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }
        inner
            .heights
            .get(hash)
            .copied()
            .ok_or(LedgerError::BlockNotFound)
    }

    pub fn fetch_block_header_by_hash(
        &self,
        hash: &Hash256,
    ) -> Result<BlockHeader, LedgerError> {
        let inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }
        match inner.heights.get(hash) {
            Some(&height) => Ok(inner.blocks[height as usize].header.clone()),
            None => Err(LedgerError::BlockNotFound),
        }
    }

    pub fn fetch_block_hash_by_height(&self, height: i32) -> Result<Hash256, LedgerError> {
        let inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }
        if height < 0 || height as usize >= inner.blocks.len() {
            return Err(LedgerError::HeightOutOfRange);
        }
        Ok(inner.blocks[height as usize].hash())
    }

    /// Hashes of the blocks in `[start, end)`. The end height is always
    /// clamped to the current block count; callers relying on a smaller end
    /// get the tail anyway, which existing consumers expect.
    pub fn fetch_height_range(
        &self,
        start: i32,
        _end: i32,
    ) -> Result<Vec<Hash256>, LedgerError> {
        let inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }

        let end = inner.blocks.len() as i32;
        if start < 0 {
            return Err(LedgerError::InvalidRange);
        }
        if end < start {
            return Err(LedgerError::InvalidRange);
        }

        Ok(inner.blocks[start as usize..end as usize]
            .iter()
            .map(Block::hash)
            .collect())
    }

    /// Whether the most recent version of the transaction exists and still
    /// has unspent outputs.
    pub fn exists_tx_hash(&self, hash: &Hash256) -> Result<bool, LedgerError> {
        let inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }
        match inner.txns.get(hash).and_then(|list| list.last()) {
            Some(last) => Ok(!last.is_fully_spent()),
            None => Ok(false),
        }
    }

    /// Every stored version of the transaction, oldest first.
    pub fn fetch_tx_by_hash(&self, hash: &Hash256) -> Result<Vec<TxRecord>, LedgerError> {
        let inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }
        let Some(list) = inner.txns.get(hash) else {
            plotd_log::log_warn!(
                "fetch_tx_by_hash: requested hash {} does not exist",
                hash_to_hex(hash)
            );
            return Err(LedgerError::MissingTx);
        };
        Ok(list
            .iter()
            .map(|tx_data| make_record(&inner, hash, tx_data))
            .collect())
    }

    /// Look up the most recent version of each requested hash. Results are
    /// reported per entry; with `include_spent` unset, fully spent
    /// transactions report as missing.
    pub fn fetch_tx_by_hash_list(
        &self,
        hashes: &[Hash256],
        include_spent: bool,
    ) -> Vec<Result<TxRecord, LedgerError>> {
        let inner = self.inner.lock().expect("ledger lock");
        hashes
            .iter()
            .map(|hash| {
                if inner.closed {
                    return Err(LedgerError::Closed);
                }
                let Some(tx_data) = inner.txns.get(hash).and_then(|list| list.last()) else {
                    return Err(LedgerError::MissingTx);
                };
                if !include_spent && tx_data.is_fully_spent() {
                    return Err(LedgerError::MissingTx);
                }
                Ok(make_record(&inner, hash, tx_data))
            })
            .collect()
    }

    /// Hash and height of the tip, or the zero hash and -1 when empty.
    pub fn newest_hash(&self) -> Result<(Hash256, i32), LedgerError> {
        let inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }
        match inner.blocks.last() {
            Some(block) => Ok((block.hash(), inner.blocks.len() as i32 - 1)),
            None => Ok((ZERO_HASH, -1)),
        }
    }

    /// Purge all state and refuse further operations.
    pub fn close(&self) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }
        inner.blocks = Vec::new();
        inner.heights = HashMap::new();
        inner.txns = HashMap::new();
        inner.closed = true;
        Ok(())
    }

    /// Rollback does not apply to a memory-only ledger; identical to close.
    pub fn rollback_close(&self) -> Result<(), LedgerError> {
        self.close()
    }

    /// Nothing to flush; grabs the lock so callers still get a barrier
    /// against in-progress operations.
    pub fn sync(&self) -> Result<(), LedgerError> {
        let inner = self.inner.lock().expect("ledger lock");
        if inner.closed {
            return Err(LedgerError::Closed);
        }
        Ok(())
    }

    pub fn fetch_addr_index_tip(&self) -> Result<(Hash256, i32), LedgerError> {
        Err(LedgerError::NotImplemented)
    }

    pub fn update_addr_index_for_block(
        &self,
        _hash: &Hash256,
        _height: i32,
    ) -> Result<(), LedgerError> {
        Err(LedgerError::NotImplemented)
    }

    pub fn fetch_txs_for_addr(
        &self,
        _addr: &Address,
        _skip: usize,
        _limit: usize,
    ) -> Result<Vec<TxRecord>, LedgerError> {
        Err(LedgerError::NotImplemented)
    }
}

fn make_record(inner: &Inner, hash: &Hash256, tx_data: &TxInsertData) -> TxRecord {
    let block = &inner.blocks[tx_data.block_height as usize];
    TxRecord {
        tx_hash: *hash,
        tx: block.transactions[tx_data.offset].clone(),
        block_hash: block.hash(),
        height: tx_data.block_height,
        spent: tx_data.spent.clone(),
    }
}

/// Unspend the outputs this transaction consumed, then drop its most recent
/// version.
fn remove_tx(
    txns: &mut HashMap<Hash256, Vec<TxInsertData>>,
    tx: &Transaction,
    tx_hash: &Hash256,
) {
    for tx_in in &tx.vin {
        if tx_in.is_coinbase() {
            continue;
        }
        if tx.is_coinbase() {
            continue;
        }

        let prev = &tx_in.prevout;
        let origin_last = txns.get_mut(&prev.hash).and_then(|list| list.last_mut());
        let Some(origin_last) = origin_last else {
            plotd_log::log_warn!(
                "unable to find input transaction {} to unspend output {} of {}",
                hash_to_hex(&prev.hash),
                prev.index,
                hash_to_hex(tx_hash)
            );
            continue;
        };
        if (prev.index as usize) < origin_last.spent.len() {
            origin_last.spent[prev.index as usize] = false;
        } else {
            plotd_log::log_warn!(
                "unspend index {} out of range for tx {}",
                prev.index,
                hash_to_hex(&prev.hash)
            );
        }
    }

    let remove_entry = match txns.get_mut(tx_hash) {
        Some(list) => {
            list.pop();
            list.is_empty()
        }
        None => false,
    };
    if remove_entry {
        txns.remove(tx_hash);
    }
}
