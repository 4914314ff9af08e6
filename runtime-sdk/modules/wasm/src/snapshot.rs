//! State sync snapshots of stored code and contracts.
//!
//! A snapshot is an ordered list of CBOR encoded chunks. Each chunk carries a list of items; code
//! and code information come first in ascending code identifier order, followed by contracts in
//! ascending address order and finally the sequences.
use std::{
    collections::{BTreeMap, BTreeSet},
    mem,
};

use wasmd_runtime_sdk::{
    logger::get_logger,
    storage::{OverlayStore, Store},
    types::address::Address,
};

use crate::{code, state, store, types, Config, Error, Keeper};

/// Snapshot format version.
pub const SNAPSHOT_FORMAT: u32 = 1;

/// A complete snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Height at which the snapshot was taken.
    pub height: u64,
    /// Snapshot format version.
    pub format: u32,
    /// Encoded chunks, in order.
    pub chunks: Vec<Vec<u8>>,
}

/// A single snapshot chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub struct SnapshotChunk {
    pub height: u64,
    pub index: u32,
    pub items: Vec<SnapshotItem>,
    /// Whether this is the final chunk.
    #[cbor(optional)]
    pub last: bool,
}

/// An atomic unit of snapshotted state. Items are never split across chunks.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub enum SnapshotItem {
    /// Raw bytecode, once per distinct checksum.
    #[cbor(rename = "code")]
    Code {
        checksum: types::Checksum,
        code: Vec<u8>,
    },

    #[cbor(rename = "code_info")]
    CodeInfo {
        code_id: types::CodeId,
        info: types::CodeInfo,
    },

    /// A contract together with its whole key/value store.
    #[cbor(rename = "contract")]
    Contract {
        address: Address,
        info: types::ContractInfo,
        state: Vec<types::KeyValue>,
    },

    #[cbor(rename = "inactive")]
    Inactive { address: Address },

    #[cbor(rename = "sequence")]
    Sequence { key: Vec<u8>, value: u64 },
}

/// Groups items into size bounded chunks.
///
/// The bound covers the whole encoded chunk. An item that does not fit on its own is written
/// to a chunk of its own.
struct ChunkWriter {
    height: u64,
    max_size: usize,
    chunks: Vec<Vec<u8>>,
    items: Vec<SnapshotItem>,
    /// Encoded size of the chunk without its items, with room for the longest item array header.
    envelope: usize,
    size: usize,
}

impl ChunkWriter {
    fn new(height: u64, max_size: usize) -> Self {
        let empty = SnapshotChunk {
            height,
            index: u32::MAX,
            items: Vec::new(),
            last: true,
        };
        Self {
            height,
            max_size,
            chunks: Vec::new(),
            items: Vec::new(),
            envelope: cbor::to_vec(empty).len() + 8,
            size: 0,
        }
    }

    fn push(&mut self, item: SnapshotItem) {
        let size = cbor::to_vec(item.clone()).len();
        if !self.items.is_empty()
            && self.envelope.saturating_add(self.size).saturating_add(size) > self.max_size
        {
            self.flush(false);
        }
        self.size += size;
        self.items.push(item);
    }

    fn flush(&mut self, last: bool) {
        let chunk = SnapshotChunk {
            height: self.height,
            index: self.chunks.len() as u32,
            items: mem::take(&mut self.items),
            last,
        };
        self.chunks.push(cbor::to_vec(chunk));
        self.size = 0;
    }

    fn finish(mut self) -> Vec<Vec<u8>> {
        self.flush(true);
        self.chunks
    }
}

impl<Cfg: Config> Keeper<Cfg> {
    /// Serialize all stored code and contracts into a chunked snapshot.
    pub fn create_snapshot<S: Store>(&self, mut state: S, height: u64) -> Result<Snapshot, Error> {
        let mut writer = ChunkWriter::new(height, self.config().snapshot_chunk_size);

        let mut codes = Vec::new();
        store::iterate_code_infos(&mut state, None, |code_id, info| {
            codes.push((code_id, info));
            false
        });
        let mut written = BTreeSet::new();
        for (code_id, info) in codes {
            if written.insert(info.checksum) {
                let code = self.load_code(&mut state, &info.checksum)?;
                writer.push(SnapshotItem::Code {
                    checksum: info.checksum,
                    code,
                });
            }
            writer.push(SnapshotItem::CodeInfo { code_id, info });
        }

        let mut contracts = Vec::new();
        store::iterate_contract_infos(&mut state, None, |address, info| {
            contracts.push((address, info));
            false
        });
        for (address, info) in contracts {
            let kv = store::contract_store(&mut state, address)
                .iter()
                .map(|(key, value)| types::KeyValue { key, value })
                .collect();
            writer.push(SnapshotItem::Contract {
                address,
                info,
                state: kv,
            });
            if store::is_inactive(&mut state, &address) {
                writer.push(SnapshotItem::Inactive { address });
            }
        }

        for (key, value) in store::sequences(&mut state) {
            writer.push(SnapshotItem::Sequence { key, value });
        }

        let chunks = writer.finish();
        slog::info!(self.logger(), "created snapshot";
            "height" => height,
            "chunks" => chunks.len(),
        );

        Ok(Snapshot {
            height,
            format: SNAPSHOT_FORMAT,
            chunks,
        })
    }

    /// Apply a completed restore to the given state and warm up pinned code.
    pub fn finish_restore<S: Store>(&self, restorer: Restorer, mut state: S) -> Result<(), Error> {
        restorer.finish(&mut state)?;
        self.initialize_pinned_codes(state)
    }
}

/// Incremental snapshot restore.
///
/// Chunks are decoded and verified into a staging area which is only written to state by
/// [`Restorer::finish`]. Any failure discards the staging area and poisons the restore.
pub struct Restorer {
    height: u64,
    next_index: u32,
    complete: bool,
    failed: bool,

    codes: BTreeMap<types::Checksum, Vec<u8>>,
    code_infos: Vec<(types::CodeId, types::CodeInfo)>,
    code_ids: BTreeSet<types::CodeId>,
    contracts: Vec<(Address, types::ContractInfo, Vec<types::KeyValue>)>,
    addresses: BTreeSet<Address>,
    inactive: Vec<Address>,
    sequences: Vec<(Vec<u8>, u64)>,
    next_code_id: u64,
    next_instance_id: u64,

    logger: slog::Logger,
}

impl Restorer {
    /// Start restoring a snapshot taken at `height`.
    pub fn begin(height: u64, format: u32) -> Result<Self, Error> {
        if format != SNAPSHOT_FORMAT {
            return Err(Error::CorruptSnapshot(format!(
                "unsupported format: {}",
                format
            )));
        }

        Ok(Self {
            height,
            next_index: 0,
            complete: false,
            failed: false,
            codes: BTreeMap::new(),
            code_infos: Vec::new(),
            code_ids: BTreeSet::new(),
            contracts: Vec::new(),
            addresses: BTreeSet::new(),
            inactive: Vec::new(),
            sequences: Vec::new(),
            next_code_id: 1,
            next_instance_id: 1,
            logger: get_logger("modules/wasm"),
        })
    }

    /// Decode and stage the next chunk. Returns whether it was the final chunk.
    pub fn restore_chunk(&mut self, chunk: &[u8]) -> Result<bool, Error> {
        if self.failed {
            return Err(Error::CorruptSnapshot("restore already failed".to_string()));
        }

        match self.stage_chunk(chunk) {
            Ok(last) => Ok(last),
            Err(err) => {
                slog::warn!(self.logger, "discarding snapshot restore";
                    "height" => self.height,
                    "chunk" => self.next_index,
                    "err" => ?err,
                );
                self.discard();
                Err(err)
            }
        }
    }

    fn stage_chunk(&mut self, chunk: &[u8]) -> Result<bool, Error> {
        if self.complete {
            return Err(Error::CorruptSnapshot(
                "chunk received after the final chunk".to_string(),
            ));
        }

        let chunk: SnapshotChunk = cbor::from_slice(chunk)
            .map_err(|err| Error::CorruptSnapshot(format!("malformed chunk: {:?}", err)))?;
        if chunk.height != self.height {
            return Err(Error::CorruptSnapshot(format!(
                "height mismatch (expected: {} got: {})",
                self.height, chunk.height
            )));
        }
        if chunk.index != self.next_index {
            return Err(Error::CorruptSnapshot(format!(
                "chunk out of order (expected: {} got: {})",
                self.next_index, chunk.index
            )));
        }

        for item in chunk.items {
            self.stage_item(item)?;
        }

        self.next_index += 1;
        self.complete = chunk.last;
        Ok(chunk.last)
    }

    fn stage_item(&mut self, item: SnapshotItem) -> Result<(), Error> {
        match item {
            SnapshotItem::Code { checksum, code } => {
                let actual = types::Checksum::digest(&code);
                if actual != checksum {
                    return Err(Error::CorruptSnapshot(format!(
                        "checksum mismatch (expected: {} got: {})",
                        checksum, actual
                    )));
                }
                self.codes.insert(checksum, code);
            }
            SnapshotItem::CodeInfo { code_id, info } => {
                if !self.codes.contains_key(&info.checksum) {
                    return Err(Error::CorruptSnapshot(format!(
                        "code {} references unknown checksum {}",
                        code_id, info.checksum
                    )));
                }
                let next = code_id.as_u64().checked_add(1).ok_or_else(|| {
                    Error::CorruptSnapshot(format!("code identifier {} out of range", code_id))
                })?;
                self.next_code_id = self.next_code_id.max(next);
                self.code_ids.insert(code_id);
                self.code_infos.push((code_id, info));
            }
            SnapshotItem::Contract {
                address,
                info,
                state,
            } => {
                if !self.code_ids.contains(&info.code_id) {
                    return Err(Error::CorruptSnapshot(format!(
                        "contract {} references unknown code {}",
                        address, info.code_id
                    )));
                }
                let next = info.instance_id.checked_add(1).ok_or_else(|| {
                    Error::CorruptSnapshot(format!(
                        "contract {} instance identifier out of range",
                        address
                    ))
                })?;
                self.next_instance_id = self.next_instance_id.max(next);
                self.addresses.insert(address);
                self.contracts.push((address, info, state));
            }
            SnapshotItem::Inactive { address } => {
                if !self.addresses.contains(&address) {
                    return Err(Error::CorruptSnapshot(format!(
                        "unknown inactive contract {}",
                        address
                    )));
                }
                self.inactive.push(address);
            }
            SnapshotItem::Sequence { key, value } => {
                if key.is_empty() {
                    return Err(Error::CorruptSnapshot("empty sequence key".to_string()));
                }
                if value == u64::MAX {
                    return Err(Error::CorruptSnapshot(format!(
                        "sequence {} out of range",
                        String::from_utf8_lossy(&key)
                    )));
                }
                self.sequences.push((key, value));
            }
        }
        Ok(())
    }

    fn discard(&mut self) {
        self.failed = true;
        self.codes.clear();
        self.code_infos.clear();
        self.code_ids.clear();
        self.contracts.clear();
        self.addresses.clear();
        self.inactive.clear();
        self.sequences.clear();
    }

    /// Write all staged state in a single step.
    pub fn finish<S: Store>(self, state: S) -> Result<(), Error> {
        if self.failed {
            return Err(Error::CorruptSnapshot("restore already failed".to_string()));
        }
        if !self.complete {
            return Err(Error::CorruptSnapshot(
                "final chunk was never received".to_string(),
            ));
        }

        let mut overlay = OverlayStore::new(state);

        for (checksum, code) in &self.codes {
            code::store_code(&mut overlay, checksum, code)?;
        }

        let codes = self.code_infos.len();
        for (code_id, info) in self.code_infos {
            store::store_code_info(&mut overlay, code_id, info);
        }

        let contracts = self.contracts.len();
        for (address, info, kv) in self.contracts {
            {
                let mut contract_store = store::contract_store(&mut overlay, address);
                for types::KeyValue { key, value } in kv {
                    contract_store.insert(&key, &value);
                }
            }
            store::index_contract_by_code(&mut overlay, info.code_id, &address);
            store::store_contract_info(&mut overlay, &address, info);
        }

        for address in &self.inactive {
            store::set_inactive(&mut overlay, address, true);
        }

        for (key, value) in &self.sequences {
            store::set_sequence(&mut overlay, key, *value);
        }
        // Numbering must continue past every restored identifier.
        for (key, next) in [
            (state::SEQUENCE_CODE_ID, self.next_code_id),
            (state::SEQUENCE_INSTANCE_ID, self.next_instance_id),
        ] {
            if store::peek_sequence(&mut overlay, key) < next {
                store::set_sequence(&mut overlay, key, next);
            }
        }

        overlay.commit();

        slog::info!(self.logger, "restored snapshot";
            "height" => self.height,
            "codes" => codes,
            "contracts" => contracts,
        );
        Ok(())
    }
}
