use alloy_primitives::B256;
use strata_types::Log;

use crate::snapshot::Controllable;

/// Append-only buffer of the logs emitted by the current transaction.
#[derive(Debug, Default, Clone)]
pub struct Logs {
    journal: Vec<Log>,
    tx_hash: B256,
    tx_index: u64,
}

impl Logs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transaction stamped onto subsequently added logs.
    pub fn set_tx_context(&mut self, tx_hash: B256, tx_index: u64) {
        self.tx_hash = tx_hash;
        self.tx_index = tx_index;
    }

    pub fn add_log(&mut self, mut log: Log) {
        log.tx_hash = self.tx_hash;
        log.tx_index = self.tx_index;
        log.index = self.journal.len() as u64;
        self.journal.push(log);
    }

    pub fn len(&self) -> usize {
        self.journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    pub fn logs(&self) -> &[Log] {
        &self.journal
    }

    /// Logs of the current transaction stamped with block metadata.
    pub fn get_logs(&self, tx_hash: B256, block_hash: B256, block_number: u64) -> Vec<Log> {
        self.journal
            .iter()
            .cloned()
            .map(|mut log| {
                log.tx_hash = tx_hash;
                log.block_hash = block_hash;
                log.block_number = block_number;
                log
            })
            .collect()
    }
}

impl Controllable for Logs {
    fn registry_key(&self) -> &'static str {
        "logs"
    }

    fn snapshot(&mut self) -> usize {
        self.journal.len()
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        self.journal.truncate(id);
    }

    fn finalize(&mut self) {
        self.journal.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes};

    fn log(addr: u8) -> Log {
        Log::new(Address::with_last_byte(addr), vec![], Bytes::new())
    }

    #[test]
    fn test_registry_key() {
        assert_eq!(Logs::new().registry_key(), "logs");
    }

    #[test]
    fn test_add_and_revert() {
        let tx_hash = B256::with_last_byte(0xaa);
        let mut logs = Logs::new();
        logs.set_tx_context(tx_hash, 3);

        logs.add_log(log(1));
        assert_eq!(logs.len(), 1);
        let snap = logs.snapshot();

        logs.add_log(log(2));
        assert_eq!(logs.len(), 2);

        logs.revert_to_snapshot(snap);
        assert_eq!(logs.len(), 1);
        let kept = &logs.logs()[0];
        assert_eq!(kept.address, Address::with_last_byte(1));
        assert_eq!(kept.tx_hash, tx_hash);
        assert_eq!(kept.tx_index, 3);
    }

    #[test]
    fn test_get_logs_stamps_block() {
        let mut logs = Logs::new();
        let tx_hash = B256::with_last_byte(1);
        logs.set_tx_context(tx_hash, 0);
        logs.add_log(log(1));
        logs.add_log(log(2));

        let block_hash = B256::with_last_byte(0xbb);
        let stamped = logs.get_logs(tx_hash, block_hash, 42);
        assert_eq!(stamped.len(), 2);
        assert!(stamped.iter().all(|l| l.block_hash == block_hash && l.block_number == 42));
        assert_eq!(stamped[1].index, 1);
    }

    #[test]
    fn test_finalize_clears() {
        let mut logs = Logs::new();
        logs.add_log(log(1));
        logs.finalize();
        assert!(logs.is_empty());
    }
}
