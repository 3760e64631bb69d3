//! # redb-backed Entity Store
//!
//! Durable records for programs, modules, batches, registrations and
//! assessments, using the redb embedded database:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Records are postcard-encoded into one table per entity. Relations are kept
//! in key-only index tables so ownership lookups are range scans, never full
//! table scans.
//!
//! ## Writers
//!
//! redb admits one write transaction at a time; `begin_write` blocks until
//! the previous writer commits or aborts. Check-then-update sequences inside
//! [`RedbStore::write`] therefore never interleave with another writer.

use crate::{
    Assessment, AssessmentId, Batch, BatchId, CertisError, EntityKind, Module, ModuleId, Program,
    ProgramId, Registration, RegistrationId, SubjectId, Target,
};
use redb::backends::InMemoryBackend;
use redb::{
    Database, Key, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, Value, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for programs: ProgramId(u64) -> serialized Program bytes
const PROGRAMS: TableDefinition<u64, &[u8]> = TableDefinition::new("programs");

/// Table for modules: ModuleId(u64) -> serialized Module bytes
const MODULES: TableDefinition<u64, &[u8]> = TableDefinition::new("modules");

/// Table for batches: BatchId(u64) -> serialized Batch bytes
const BATCHES: TableDefinition<u64, &[u8]> = TableDefinition::new("batches");

/// Table for registrations: RegistrationId(u64) -> serialized Registration bytes
const REGISTRATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("registrations");

/// Table for assessments: AssessmentId(u64) -> serialized Assessment bytes
const ASSESSMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("assessments");

/// Table for metadata: key string -> value u64 (id sequences)
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Index: (program_id, batch_id)
const BATCHES_BY_PROGRAM: TableDefinition<(u64, u64), ()> =
    TableDefinition::new("batches_by_program");

/// Index: (program_id, module_id)
const MODULES_BY_PROGRAM: TableDefinition<(u64, u64), ()> =
    TableDefinition::new("modules_by_program");

/// Index: (target tag, target id, registration_id). See [`Target::key`].
const REGISTRATIONS_BY_TARGET: TableDefinition<(u8, u64, u64), ()> =
    TableDefinition::new("registrations_by_target");

/// Index: (subject_id, registration_id)
const REGISTRATIONS_BY_SUBJECT: TableDefinition<(u64, u64), ()> =
    TableDefinition::new("registrations_by_subject");

/// Index: registration_id -> assessment_id (one-to-one)
const ASSESSMENT_BY_REGISTRATION: TableDefinition<u64, u64> =
    TableDefinition::new("assessment_by_registration");

fn storage_err(e: impl std::fmt::Display) -> CertisError {
    CertisError::Storage(e.to_string())
}

fn encode<R: Record>(record: &R) -> Result<Vec<u8>, CertisError> {
    postcard::to_allocvec(record).map_err(|e| CertisError::Serialization(e.to_string()))
}

fn decode<R: Record>(bytes: &[u8]) -> Result<R, CertisError> {
    postcard::from_bytes(bytes).map_err(|e| {
        CertisError::Serialization(format!("corrupt {} record: {}", R::KIND, e))
    })
}

// =============================================================================
// RECORDS
// =============================================================================

/// A persisted entity with its own table.
pub trait Record: Serialize + DeserializeOwned {
    const KIND: EntityKind;
    const TABLE: TableDefinition<'static, u64, &'static [u8]>;

    /// Primary key.
    fn key(&self) -> u64;
}

impl Record for Program {
    const KIND: EntityKind = EntityKind::Program;
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = PROGRAMS;
    fn key(&self) -> u64 {
        self.id.0
    }
}

impl Record for Module {
    const KIND: EntityKind = EntityKind::Module;
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = MODULES;
    fn key(&self) -> u64 {
        self.id.0
    }
}

impl Record for Batch {
    const KIND: EntityKind = EntityKind::Batch;
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = BATCHES;
    fn key(&self) -> u64 {
        self.id.0
    }
}

impl Record for Registration {
    const KIND: EntityKind = EntityKind::Registration;
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = REGISTRATIONS;
    fn key(&self) -> u64 {
        self.id.0
    }
}

impl Record for Assessment {
    const KIND: EntityKind = EntityKind::Assessment;
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = ASSESSMENTS;
    fn key(&self) -> u64 {
        self.id.0
    }
}

fn pair_tails(
    table: &impl ReadableTable<(u64, u64), ()>,
    head: u64,
) -> Result<Vec<u64>, CertisError> {
    let mut tails = Vec::new();
    for entry in table
        .range((head, 0)..=(head, u64::MAX))
        .map_err(storage_err)?
    {
        let (key, _) = entry.map_err(storage_err)?;
        tails.push(key.value().1);
    }
    Ok(tails)
}

// =============================================================================
// READER
// =============================================================================

/// Read access shared by read-only and write transactions.
///
/// A write transaction reads its own uncommitted changes.
pub trait Reader {
    /// Open a table for reading within this transaction.
    fn table<K: Key + 'static, V: Value + 'static>(
        &self,
        definition: TableDefinition<'static, K, V>,
    ) -> Result<impl ReadableTable<K, V> + '_, CertisError>;

    fn get<R: Record>(&self, id: u64) -> Result<Option<R>, CertisError> {
        let table = self.table(R::TABLE)?;
        match table.get(id).map_err(storage_err)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    /// Like [`Reader::get`], but an absent id is `NotFound`.
    fn require<R: Record>(&self, id: u64) -> Result<R, CertisError> {
        self.get(id)?
            .ok_or_else(|| CertisError::not_found(R::KIND, id))
    }

    /// Every record of a kind, in id order.
    fn scan<R: Record>(&self) -> Result<Vec<R>, CertisError> {
        let table = self.table(R::TABLE)?;
        let mut records = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (_, data) = entry.map_err(storage_err)?;
            records.push(decode(data.value())?);
        }
        Ok(records)
    }

    fn count<R: Record>(&self) -> Result<u64, CertisError> {
        self.table(R::TABLE)?.len().map_err(storage_err)
    }

    fn batches_of(&self, program: ProgramId) -> Result<Vec<BatchId>, CertisError> {
        let table = self.table(BATCHES_BY_PROGRAM)?;
        Ok(pair_tails(&table, program.0)?.into_iter().map(BatchId).collect())
    }

    fn modules_of(&self, program: ProgramId) -> Result<Vec<ModuleId>, CertisError> {
        let table = self.table(MODULES_BY_PROGRAM)?;
        Ok(pair_tails(&table, program.0)?.into_iter().map(ModuleId).collect())
    }

    /// Registrations booked on `target`, in id order.
    fn registrations_on(&self, target: Target) -> Result<Vec<RegistrationId>, CertisError> {
        let table = self.table(REGISTRATIONS_BY_TARGET)?;
        let (tag, id) = target.key();
        let mut ids = Vec::new();
        for entry in table
            .range((tag, id, 0)..=(tag, id, u64::MAX))
            .map_err(storage_err)?
        {
            let (key, _) = entry.map_err(storage_err)?;
            ids.push(RegistrationId(key.value().2));
        }
        Ok(ids)
    }

    fn registrations_of(&self, subject: SubjectId) -> Result<Vec<RegistrationId>, CertisError> {
        let table = self.table(REGISTRATIONS_BY_SUBJECT)?;
        Ok(pair_tails(&table, subject.0)?
            .into_iter()
            .map(RegistrationId)
            .collect())
    }

    fn assessment_of(
        &self,
        registration: RegistrationId,
    ) -> Result<Option<AssessmentId>, CertisError> {
        let table = self.table(ASSESSMENT_BY_REGISTRATION)?;
        Ok(table
            .get(registration.0)
            .map_err(storage_err)?
            .map(|v| AssessmentId(v.value())))
    }
}

/// A read-only snapshot.
pub struct ReadTxn {
    tx: ReadTransaction,
}

impl Reader for ReadTxn {
    fn table<K: Key + 'static, V: Value + 'static>(
        &self,
        definition: TableDefinition<'static, K, V>,
    ) -> Result<impl ReadableTable<K, V> + '_, CertisError> {
        self.tx.open_table(definition).map_err(storage_err)
    }
}

// =============================================================================
// WRITE TRANSACTION
// =============================================================================

/// An open write transaction. Only [`RedbStore::write`] hands these out.
pub struct StoreTxn {
    tx: WriteTransaction,
}

impl Reader for StoreTxn {
    fn table<K: Key + 'static, V: Value + 'static>(
        &self,
        definition: TableDefinition<'static, K, V>,
    ) -> Result<impl ReadableTable<K, V> + '_, CertisError> {
        self.tx.open_table(definition).map_err(storage_err)
    }
}

impl StoreTxn {
    /// Insert or overwrite a record.
    pub fn put<R: Record>(&self, record: &R) -> Result<(), CertisError> {
        let bytes = encode(record)?;
        let mut table = self.tx.open_table(R::TABLE).map_err(storage_err)?;
        table
            .insert(record.key(), bytes.as_slice())
            .map_err(storage_err)?;
        Ok(())
    }

    /// Remove a record. Returns whether it existed.
    pub fn remove<R: Record>(&self, id: u64) -> Result<bool, CertisError> {
        let mut table = self.tx.open_table(R::TABLE).map_err(storage_err)?;
        Ok(table.remove(id).map_err(storage_err)?.is_some())
    }

    /// Allocate the next id for `kind`. Ids start at 1 and are never reused.
    pub fn next_id(&self, kind: EntityKind) -> Result<u64, CertisError> {
        let key = format!("next_{}_id", kind.as_str());
        let mut table = self.tx.open_table(METADATA).map_err(storage_err)?;
        let next = table
            .get(key.as_str())
            .map_err(storage_err)?
            .map(|v| v.value())
            .unwrap_or(1);
        table
            .insert(key.as_str(), next.saturating_add(1))
            .map_err(storage_err)?;
        Ok(next)
    }

    fn set_pair(
        &self,
        definition: TableDefinition<'static, (u64, u64), ()>,
        head: u64,
        tail: u64,
        present: bool,
    ) -> Result<(), CertisError> {
        let mut table = self.tx.open_table(definition).map_err(storage_err)?;
        if present {
            table.insert((head, tail), ()).map_err(storage_err)?;
        } else {
            table.remove((head, tail)).map_err(storage_err)?;
        }
        Ok(())
    }

    pub fn link_batch(&self, batch: &Batch) -> Result<(), CertisError> {
        self.set_pair(BATCHES_BY_PROGRAM, batch.program_id.0, batch.id.0, true)
    }

    pub fn unlink_batch(&self, batch: &Batch) -> Result<(), CertisError> {
        self.set_pair(BATCHES_BY_PROGRAM, batch.program_id.0, batch.id.0, false)
    }

    pub fn link_module(&self, module: &Module) -> Result<(), CertisError> {
        self.set_pair(MODULES_BY_PROGRAM, module.program_id.0, module.id.0, true)
    }

    pub fn unlink_module(&self, module: &Module) -> Result<(), CertisError> {
        self.set_pair(MODULES_BY_PROGRAM, module.program_id.0, module.id.0, false)
    }

    /// Index a registration by target and by subject.
    pub fn link_registration(&self, registration: &Registration) -> Result<(), CertisError> {
        let (tag, id) = registration.target.key();
        {
            let mut table = self
                .tx
                .open_table(REGISTRATIONS_BY_TARGET)
                .map_err(storage_err)?;
            table
                .insert((tag, id, registration.id.0), ())
                .map_err(storage_err)?;
        }
        self.set_pair(
            REGISTRATIONS_BY_SUBJECT,
            registration.subject.0,
            registration.id.0,
            true,
        )
    }

    pub fn unlink_registration(&self, registration: &Registration) -> Result<(), CertisError> {
        let (tag, id) = registration.target.key();
        {
            let mut table = self
                .tx
                .open_table(REGISTRATIONS_BY_TARGET)
                .map_err(storage_err)?;
            table
                .remove((tag, id, registration.id.0))
                .map_err(storage_err)?;
        }
        self.set_pair(
            REGISTRATIONS_BY_SUBJECT,
            registration.subject.0,
            registration.id.0,
            false,
        )
    }

    pub fn link_assessment(&self, assessment: &Assessment) -> Result<(), CertisError> {
        let mut table = self
            .tx
            .open_table(ASSESSMENT_BY_REGISTRATION)
            .map_err(storage_err)?;
        table
            .insert(assessment.registration.0, assessment.id.0)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn unlink_assessment(&self, registration: RegistrationId) -> Result<(), CertisError> {
        let mut table = self
            .tx
            .open_table(ASSESSMENT_BY_REGISTRATION)
            .map_err(storage_err)?;
        table.remove(registration.0).map_err(storage_err)?;
        Ok(())
    }
}

// =============================================================================
// STORE
// =============================================================================

/// The redb database handle. Shareable across threads.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CertisError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;
        Self::init(db)
    }

    /// A database that lives and dies with the process.
    pub fn in_memory() -> Result<Self, CertisError> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(storage_err)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self, CertisError> {
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            for table in [PROGRAMS, MODULES, BATCHES, REGISTRATIONS, ASSESSMENTS] {
                write_txn.open_table(table).map_err(storage_err)?;
            }
            write_txn.open_table(METADATA).map_err(storage_err)?;
            write_txn.open_table(BATCHES_BY_PROGRAM).map_err(storage_err)?;
            write_txn.open_table(MODULES_BY_PROGRAM).map_err(storage_err)?;
            write_txn
                .open_table(REGISTRATIONS_BY_TARGET)
                .map_err(storage_err)?;
            write_txn
                .open_table(REGISTRATIONS_BY_SUBJECT)
                .map_err(storage_err)?;
            write_txn
                .open_table(ASSESSMENT_BY_REGISTRATION)
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(Self { db })
    }

    /// Run `f` in a write transaction.
    ///
    /// Commits when `f` returns `Ok`; aborts and returns the error otherwise.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&StoreTxn) -> Result<T, CertisError>,
    ) -> Result<T, CertisError> {
        let txn = StoreTxn {
            tx: self.db.begin_write().map_err(storage_err)?,
        };
        match f(&txn) {
            Ok(value) => {
                txn.tx.commit().map_err(storage_err)?;
                Ok(value)
            }
            Err(e) => {
                // The caller's error wins over a failed abort.
                let _ = txn.tx.abort();
                Err(e)
            }
        }
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&ReadTxn) -> Result<T, CertisError>,
    ) -> Result<T, CertisError> {
        let txn = ReadTxn {
            tx: self.db.begin_read().map_err(storage_err)?,
        };
        f(&txn)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{ProgramKind, ProgramStatus, RegistrationDetails, RegistrationStatus};
    use chrono::Utc;
    use tempfile::tempdir;

    fn program(id: u64) -> Program {
        Program {
            id: ProgramId(id),
            kind: ProgramKind::Internship,
            name: format!("Position {id}"),
            description: String::new(),
            quota: 2,
            registered: 0,
            status: ProgramStatus::Active,
            thumbnail_url: None,
            created_at: Utc::now(),
        }
    }

    fn registration(id: u64, subject: u64, target: Target) -> Registration {
        Registration {
            id: RegistrationId(id),
            subject: SubjectId(subject),
            target,
            status: RegistrationStatus::Pending,
            details: RegistrationDetails::default(),
            submitted_at: Utc::now(),
            admin_note: None,
            processed_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn put_get_remove() {
        let store = RedbStore::in_memory().expect("open");
        store.write(|tx| tx.put(&program(1))).expect("put");

        let loaded: Option<Program> = store.read(|r| r.get(1)).expect("get");
        assert_eq!(loaded.map(|p| p.name), Some("Position 1".to_string()));

        assert!(store.write(|tx| tx.remove::<Program>(1)).expect("remove"));
        assert!(!store.write(|tx| tx.remove::<Program>(1)).expect("remove again"));
        assert!(matches!(
            store.read(|r| r.require::<Program>(1)),
            Err(CertisError::NotFound {
                kind: EntityKind::Program,
                id: 1
            })
        ));
    }

    #[test]
    fn failed_closure_rolls_back() {
        let store = RedbStore::in_memory().expect("open");
        let result: Result<(), _> = store.write(|tx| {
            tx.put(&program(1))?;
            tx.next_id(EntityKind::Program)?;
            Err(CertisError::validation("test", "abort"))
        });
        assert!(result.is_err());

        assert_eq!(store.read(|r| r.count::<Program>()).expect("count"), 0);
        // The sequence bump was rolled back too.
        assert_eq!(
            store.write(|tx| tx.next_id(EntityKind::Program)).expect("id"),
            1
        );
    }

    #[test]
    fn sequences_are_per_kind() {
        let store = RedbStore::in_memory().expect("open");
        let ids = store
            .write(|tx| {
                Ok((
                    tx.next_id(EntityKind::Program)?,
                    tx.next_id(EntityKind::Program)?,
                    tx.next_id(EntityKind::Batch)?,
                ))
            })
            .expect("ids");
        assert_eq!(ids, (1, 2, 1));
    }

    #[test]
    fn registration_indexes() {
        let store = RedbStore::in_memory().expect("open");
        let on_batch = Target::Batch(BatchId(7));
        let on_position = Target::Position(ProgramId(7));

        store
            .write(|tx| {
                for reg in [
                    registration(1, 10, on_batch),
                    registration(2, 11, on_batch),
                    registration(3, 10, on_position),
                ] {
                    tx.put(&reg)?;
                    tx.link_registration(&reg)?;
                }
                Ok(())
            })
            .expect("write");

        store
            .read(|r| {
                assert_eq!(
                    r.registrations_on(on_batch)?,
                    vec![RegistrationId(1), RegistrationId(2)]
                );
                assert_eq!(r.registrations_on(on_position)?, vec![RegistrationId(3)]);
                assert_eq!(
                    r.registrations_of(SubjectId(10))?,
                    vec![RegistrationId(1), RegistrationId(3)]
                );
                Ok(())
            })
            .expect("read");

        store
            .write(|tx| tx.unlink_registration(&registration(1, 10, on_batch)))
            .expect("unlink");
        let remaining = store.read(|r| r.registrations_on(on_batch)).expect("read");
        assert_eq!(remaining, vec![RegistrationId(2)]);
    }

    #[test]
    fn persists_across_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("portal.redb");

        {
            let store = RedbStore::open(&db_path).expect("open");
            store
                .write(|tx| {
                    let id = tx.next_id(EntityKind::Program)?;
                    tx.put(&program(id))
                })
                .expect("write");
        }

        let store = RedbStore::open(&db_path).expect("reopen");
        let programs: Vec<Program> = store.read(|r| r.scan()).expect("scan");
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].id, ProgramId(1));
        assert_eq!(
            store.write(|tx| tx.next_id(EntityKind::Program)).expect("id"),
            2
        );
    }
}
