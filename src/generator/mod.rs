use crate::types::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Synthesizes [`Batch`]es with a controllable fraction of transactions
/// sharing accounts or storage slots, drawing from separate address and
/// storage-key pools so account-level and storage-level conflicts can be
/// tuned independently.
pub struct BatchGenerator {
    pub n_tx: usize,
    pub address_space: usize,
    pub key_space: usize,
    pub conflict_ratio: f64,
    pub seed: u64,
}

impl BatchGenerator {
    pub fn new(n_tx: usize, address_space: usize, key_space: usize, conflict_ratio: f64, seed: u64) -> Self {
        Self {
            n_tx,
            address_space,
            key_space,
            conflict_ratio,
            seed,
        }
    }

    fn generate_program(
        &self,
        from: Address,
        to: Option<Address>,
        storage_keys: &[StorageKey],
        rng: &mut StdRng,
    ) -> Vec<MicroOp> {
        let mut program = vec![MicroOp::GetBalance(from)];

        if let Some(to) = to {
            program.push(MicroOp::SubBalance(from, U256::from_u64(rng.gen_range(1..1000))));
            program.push(MicroOp::AddBalance(to, U256::from_u64(rng.gen_range(1..1000))));
        } else {
            program.push(MicroOp::CreateAccount(from));
        }

        for key in storage_keys {
            program.push(MicroOp::SLoad(*key));
        }
        for key in storage_keys {
            program.push(MicroOp::SStore(*key, U256::from_u64(rng.gen_range(1..1000))));
        }

        program.push(MicroOp::SetNonce(from, rng.gen_range(0..1_000_000)));

        if rng.gen::<f64>() < 0.2 {
            let data: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
            program.push(MicroOp::Keccak(data));
        }
        if rng.gen::<f64>() < 0.05 {
            program.push(MicroOp::SelfDestruct(from));
        }
        for _ in 0..rng.gen_range(0..3) {
            program.push(MicroOp::NoOp);
        }

        program
    }

    fn pick_address(&self, pool: &[Address], rng: &mut StdRng) -> Address {
        if rng.gen::<f64>() < self.conflict_ratio && !pool.is_empty() {
            pool[rng.gen_range(0..pool.len())]
        } else {
            Address::new(rng.gen::<[u8; 20]>())
        }
    }

    fn pick_key(&self, pool: &[StorageKey], rng: &mut StdRng) -> StorageKey {
        if rng.gen::<f64>() < self.conflict_ratio && !pool.is_empty() {
            pool[rng.gen_range(0..pool.len())]
        } else {
            StorageKey::new(rng.gen::<[u8; 32]>())
        }
    }

    pub fn generate(&self) -> Batch {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let address_pool: Vec<Address> = (0..self.address_space)
            .map(|i| {
                let mut bytes = [0u8; 20];
                bytes[0..8].copy_from_slice(&(i as u64).to_be_bytes());
                Address::new(bytes)
            })
            .collect();

        let key_pool: Vec<StorageKey> = (0..self.key_space)
            .map(|i| {
                let mut bytes = [0u8; 32];
                bytes[0..8].copy_from_slice(&(i as u64).to_be_bytes());
                StorageKey::new(bytes)
            })
            .collect();

        tracing::info!(
            n_tx = self.n_tx,
            address_space = self.address_space,
            key_space = self.key_space,
            conflict_ratio = self.conflict_ratio,
            seed = self.seed,
            "generating synthetic batch"
        );

        let mut transactions = Vec::with_capacity(self.n_tx);
        for tx_idx in 0..self.n_tx {
            let from = self.pick_address(&address_pool, &mut rng);
            let to = if rng.gen::<f64>() < 0.9 {
                Some(self.pick_address(&address_pool, &mut rng))
            } else {
                None
            };

            let storage_key_count = rng.gen_range(0..=3);
            let storage_keys: Vec<StorageKey> = (0..storage_key_count)
                .map(|_| self.pick_key(&key_pool, &mut rng))
                .collect();

            let program = self.generate_program(from, to, &storage_keys, &mut rng);

            transactions.push(BatchTransaction {
                tx_idx: tx_idx as u32,
                from,
                to,
                value: U256::from_u64(rng.gen_range(0..1000)),
                program,
                access_list: storage_keys,
                nonce: tx_idx as u64,
            });
        }

        let batch = Batch::new(1, transactions);
        tracing::info!(
            num_transactions = batch.transactions.len(),
            "generated synthetic batch"
        );
        batch
    }

    pub fn small() -> Self {
        Self::new(100, 50, 1000, 0.1, 42)
    }

    pub fn medium() -> Self {
        Self::new(1000, 200, 10000, 0.2, 42)
    }

    pub fn large() -> Self {
        Self::new(5000, 500, 50000, 0.3, 42)
    }

    pub fn no_conflicts(n_tx: usize, seed: u64) -> Self {
        Self::new(n_tx, n_tx * 10, n_tx * 10, 0.0, seed)
    }

    pub fn full_conflicts(n_tx: usize, seed: u64) -> Self {
        Self::new(n_tx, 1, 1, 1.0, seed)
    }
}

impl Default for BatchGenerator {
    fn default() -> Self {
        Self::medium()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_produces_requested_count() {
        let batch = BatchGenerator::small().generate();
        assert_eq!(batch.transactions.len(), 100);
        let batch2 = BatchGenerator::new(50, 10, 500, 0.2, 42).generate();
        assert_eq!(batch2.transactions.len(), 50);
    }

    #[test]
    fn test_full_conflicts_share_one_address() {
        let batch = BatchGenerator::full_conflicts(20, 7).generate();
        let first_from = batch.transactions[0].from;
        assert!(batch.transactions.iter().any(|t| t.from == first_from));
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let a = BatchGenerator::new(30, 10, 100, 0.3, 99).generate();
        let b = BatchGenerator::new(30, 10, 100, 0.3, 99).generate();
        assert_eq!(a.transactions.len(), b.transactions.len());
        for (ta, tb) in a.transactions.iter().zip(b.transactions.iter()) {
            assert_eq!(ta.from, tb.from);
            assert_eq!(ta.to, tb.to);
        }
    }
}
