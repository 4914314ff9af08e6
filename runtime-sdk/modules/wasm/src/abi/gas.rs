//! Gas costs of host operations.
use crate::GasCosts;

impl GasCosts {
    /// Cost of converting a canonical address into its human readable form.
    pub fn humanize_cost(&self) -> u64 {
        self.humanize_address.saturating_mul(self.multiplier)
    }

    /// Cost of converting a human readable address into its canonical form.
    pub fn canonicalize_cost(&self) -> u64 {
        self.canonicalize_address.saturating_mul(self.multiplier)
    }

    /// Cost of deserializing `len` bytes of JSON.
    pub fn json_deserialization_cost(&self, len: usize) -> u64 {
        self.json_deserialization_per_byte
            .saturating_mul(self.multiplier)
            .saturating_mul(len as u64)
    }

    /// Cost charged before reading the given key.
    pub fn storage_get_cost(&self, key_len: usize) -> u64 {
        self.storage_get_base
            .saturating_add(self.storage_key_byte.saturating_mul(key_len as u64))
    }

    /// Cost of a value of the given size read from or written to storage.
    pub fn storage_value_cost(&self, value_len: usize) -> u64 {
        self.storage_value_byte.saturating_mul(value_len as u64)
    }

    /// Cost charged before writing the given key/value pair.
    pub fn storage_insert_cost(&self, key_len: usize, value_len: usize) -> u64 {
        self.storage_insert_base
            .saturating_add(self.storage_key_byte.saturating_mul(key_len as u64))
            .saturating_add(self.storage_value_cost(value_len))
    }

    /// Cost charged before removing the given key.
    pub fn storage_remove_cost(&self, key_len: usize) -> u64 {
        self.storage_remove_base
            .saturating_add(self.storage_key_byte.saturating_mul(key_len as u64))
    }

    /// Cost of dispatching the given number of contract messages.
    pub fn message_dispatch_cost(&self, count: usize) -> u64 {
        self.message_dispatch.saturating_mul(count as u64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_costs() {
        let costs = GasCosts::default();
        assert_eq!(costs.humanize_cost(), 500);
        assert_eq!(costs.canonicalize_cost(), 400);
        assert_eq!(costs.json_deserialization_cost(0), 0);
        assert_eq!(costs.json_deserialization_cost(10), 1_000);
        assert_eq!(costs.storage_get_cost(4), 24);
        assert_eq!(costs.storage_insert_cost(4, 6), 30);
        assert_eq!(costs.storage_remove_cost(4), 24);
        assert_eq!(costs.message_dispatch_cost(3), 300);
    }

    #[test]
    fn test_json_cost_monotonic() {
        let costs = GasCosts::default();
        let mut last = 0;
        for len in [0, 1, 2, 100, 1_000, usize::MAX] {
            let cost = costs.json_deserialization_cost(len);
            assert!(cost >= last);
            last = cost;
        }
        assert_eq!(costs.json_deserialization_cost(usize::MAX), u64::MAX);
    }

    #[test]
    fn test_alternate_schedule() {
        let costs = GasCosts {
            multiplier: 1,
            humanize_address: 7,
            ..Default::default()
        };
        assert_eq!(costs.humanize_cost(), 7);
        assert_eq!(costs.canonicalize_cost(), 4);
    }
}
