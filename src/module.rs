use crate::command::{Command, CommandReply};
use crate::config::TableConfig;
use crate::error::{L2Error, Result};
use crate::gate::{GateId, DROP_GATE};
use crate::mac::MacAddress;
use crate::table::Table;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

/// The class name the surrounding pipeline runtime registers this module
/// under (§6). This crate does not implement that registration itself —
/// it's an external collaborator — but exposes the name so an embedding
/// runtime can bind to it.
pub const CLASS_NAME: &str = "L2Forward";

/// Default instance name (§6).
pub const DEFAULT_INSTANCE_NAME: &str = "l2_forward";

/// The module has exactly one input gate (§6).
pub const INPUT_GATES: usize = 1;

/// Maximum packets classified per `process_batch` call, mirroring the
/// pipeline runtime's `MAX_PKT_BURST`.
pub const MAX_PKT_BURST: usize = 32;

/// A MAC-to-gate forwarding module: a [`Table`] plus per-module
/// `default_gate` state, reachable from both a data plane (`process_batch`,
/// `lookup`) and a control plane (`add`, `delete`, `set_default_gate`,
/// `populate`) running on separate threads.
///
/// Readers (`process_batch`, `lookup`) and the hot path never block on one
/// another or on a writer for longer than the writer actually holds the
/// lock; `add`/`delete`/`flush`/`populate` take the write side, matching
/// §5's requirement that mutators be serialized against themselves and
/// against the data plane.
pub struct ForwardingModule {
    table: RwLock<Table>,
    default_gate: AtomicU32,
    max_gates: u16,
}

impl ForwardingModule {
    /// Reads `size`/`bucket` from `config` (already defaulted/validated by
    /// the caller — see [`TableConfig::default`]), allocates the table,
    /// and seeds `default_gate` with the drop sentinel.
    pub fn init(config: TableConfig, max_gates: u16) -> Result<Self> {
        let table = Table::new(config)?;
        log::debug!(
            "l2_forward module initialized: size={} bucket={} max_gates={}",
            config.size,
            config.bucket,
            max_gates
        );
        Ok(ForwardingModule {
            table: RwLock::new(table),
            default_gate: AtomicU32::new(DROP_GATE.as_u16() as u32),
            max_gates,
        })
    }

    /// Releases the slot array. Consuming `self` makes the release
    /// unconditional and statically prevents further use after teardown.
    pub fn deinit(self) {
        log::debug!("l2_forward module deinitialized");
        drop(self);
    }

    #[inline]
    fn read_default_gate(&self) -> GateId {
        // Single acquire-style read per batch: a concurrent
        // `set_default_gate` is observed atomically at batch boundaries,
        // never torn mid-batch.
        GateId::new(self.default_gate.load(Ordering::Acquire) as u16)
    }

    /// Classifies up to [`MAX_PKT_BURST`] packets. For each packet, reads
    /// the first eight bytes of its head, reduces them to an internal-form
    /// MAC, and writes the looked-up gate (or the default gate on a miss)
    /// to the corresponding slot of `ogates`.
    ///
    /// Stands in for handing `(ogates, batch)` to the external
    /// `run_split` primitive, which lives in the surrounding pipeline
    /// runtime and is out of scope for this crate.
    pub fn process_batch(&self, packet_heads: &[[u8; 8]], ogates: &mut [GateId]) {
        debug_assert_eq!(packet_heads.len(), ogates.len());
        let default_gate = self.read_default_gate();
        let table = self.table.read();
        let n = packet_heads.len().min(ogates.len()).min(MAX_PKT_BURST);
        for i in 0..n {
            let addr = MacAddress::from_packet_head(packet_heads[i]);
            ogates[i] = table.find(addr).unwrap_or(default_gate);
        }
    }

    /// `add` command: parses and inserts each entry, aborting on the
    /// first failure.
    pub fn add(&self, entries: &[(&str, u16)]) -> Result<()> {
        let mut table = self.table.write();
        for (mac_str, gate) in entries {
            let addr = MacAddress::parse(mac_str)?;
            table.add(addr, GateId::new(*gate)).map_err(|e| {
                log::warn!("add({mac_str}) rejected: {e}");
                L2Error::from_table_error(e, mac_str)
            })?;
        }
        Ok(())
    }

    /// `delete` command: removes each entry, aborting on the first miss.
    pub fn delete(&self, addrs: &[&str]) -> Result<()> {
        let mut table = self.table.write();
        for mac_str in addrs {
            let addr = MacAddress::parse(mac_str)?;
            table.delete(addr).map_err(|e| {
                log::warn!("delete({mac_str}) rejected: {e}");
                L2Error::from_table_error(e, mac_str)
            })?;
        }
        Ok(())
    }

    /// `set_default_gate` command. Intentionally does not validate the
    /// gate against `[0, max_gates)` nor reject the drop sentinel (§9
    /// open question, preserved): a caller can deliberately route
    /// everything to `DROP_GATE`.
    pub fn set_default_gate(&self, gate: u16) {
        log::debug!("default gate set to {gate}");
        self.default_gate.store(GateId::new(gate).as_u16() as u32, Ordering::Release);
    }

    /// `lookup` command: returns gates in input order, aborting on the
    /// first unknown MAC.
    pub fn lookup(&self, addrs: &[&str]) -> Result<Vec<GateId>> {
        let table = self.table.read();
        let mut gates = Vec::with_capacity(addrs.len());
        for mac_str in addrs {
            let addr = MacAddress::parse(mac_str)?;
            let gate = table.find(addr).ok_or_else(|| L2Error::not_found(*mac_str))?;
            gates.push(gate);
        }
        Ok(gates)
    }

    /// `populate` command: synthesises `count` sequential entries from
    /// `base`, gate `i mod gate_count`. Per-entry insert failures are
    /// ignored by design (§4.6, §9); the returned count may be short.
    pub fn populate(&self, base: &str, count: usize, gate_count: u16) -> Result<usize> {
        let base_addr = MacAddress::parse(base)?;
        let mut table = self.table.write();
        Ok(table.populate(base_addr, count, gate_count))
    }

    /// Bound on output gates this module instance was configured with.
    pub fn max_gates(&self) -> u16 {
        self.max_gates
    }

    /// Advisory count of occupied slots.
    pub fn entry_count(&self) -> usize {
        self.table.read().count()
    }

    /// Dispatches a [`Command`], the shape an embedding pipeline runtime's
    /// command table would bind each of the five control-plane commands
    /// to (§6's "module registration surface").
    pub fn dispatch(&self, command: Command) -> Result<CommandReply> {
        match command {
            Command::Add(entries) => {
                let refs: Vec<(&str, u16)> =
                    entries.iter().map(|(mac, gate)| (mac.as_str(), *gate)).collect();
                self.add(&refs)?;
                Ok(CommandReply::Ack)
            }
            Command::Delete(addrs) => {
                let refs: Vec<&str> = addrs.iter().map(String::as_str).collect();
                self.delete(&refs)?;
                Ok(CommandReply::Ack)
            }
            Command::SetDefaultGate(gate) => {
                self.set_default_gate(gate);
                Ok(CommandReply::Ack)
            }
            Command::Lookup(addrs) => {
                let refs: Vec<&str> = addrs.iter().map(String::as_str).collect();
                let gates = self.lookup(&refs)?;
                Ok(CommandReply::Gates(gates))
            }
            Command::Populate { base, count, gate_count } => {
                let installed = self.populate(&base, count, gate_count)?;
                Ok(CommandReply::Populated(installed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(size: usize, bucket: usize, max_gates: u16) -> ForwardingModule {
        ForwardingModule::init(TableConfig { size, bucket }, max_gates).unwrap()
    }

    #[test]
    fn default_gate_routes_misses() {
        let m = module(16, 4, 8);
        m.set_default_gate(7);
        let heads = [[0u8; 8]; 3];
        let mut ogates = [GateId::new(0); 3];
        m.process_batch(&heads, &mut ogates);
        assert_eq!(ogates, [GateId::new(7); 3]);
    }

    #[test]
    fn process_batch_prefers_installed_entry_over_default() {
        let m = module(16, 4, 8);
        m.set_default_gate(7);
        m.add(&[("aa:bb:cc:dd:ee:ff", 3)]).unwrap();
        let mut head = [0u8; 8];
        head[..6].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        let heads = [head];
        let mut ogates = [GateId::new(0)];
        m.process_batch(&heads, &mut ogates);
        assert_eq!(ogates, [GateId::new(3)]);
    }

    #[test]
    fn duplicate_add_reports_already_exists_and_keeps_first() {
        let m = module(16, 4, 8);
        let entries = [("aa:bb:cc:dd:ee:ff", 1), ("aa:bb:cc:dd:ee:ff", 2)];
        let err = m.add(&entries).unwrap_err();
        assert!(matches!(err, L2Error::AlreadyExists(_)));
        assert_eq!(m.lookup(&["aa:bb:cc:dd:ee:ff"]).unwrap(), vec![GateId::new(1)]);
    }

    #[test]
    fn populate_command_reports_installed_count() {
        let m = module(16, 4, 8);
        let reply = m
            .dispatch(Command::Populate {
                base: "00:00:00:00:00:00".to_string(),
                count: 5,
                gate_count: 3,
            })
            .unwrap();
        assert_eq!(reply, CommandReply::Populated(5));
    }

    #[test]
    fn lookup_aborts_on_first_unknown_mac() {
        let m = module(16, 4, 8);
        m.add(&[("aa:bb:cc:dd:ee:ff", 1)]).unwrap();
        let err = m.lookup(&["aa:bb:cc:dd:ee:ff", "11:22:33:44:55:66"]).unwrap_err();
        assert!(matches!(err, L2Error::NotFound(_)));
    }

    #[test]
    fn delete_command_then_find_is_gone() {
        let m = module(16, 4, 8);
        m.add(&[("aa:bb:cc:dd:ee:ff", 1)]).unwrap();
        m.delete(&["aa:bb:cc:dd:ee:ff"]).unwrap();
        assert!(matches!(m.lookup(&["aa:bb:cc:dd:ee:ff"]), Err(L2Error::NotFound(_))));
    }
}
