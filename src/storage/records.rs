use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::Entity;
use super::tables::SEQUENCES;

impl Database {
    // ========================================================================
    // Generic record operations
    // ========================================================================

    /// Allocate the next id for `E`, store the record under it and return it.
    pub fn insert<E: Entity>(&self, mut record: E) -> Result<E, DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut sequences = write_txn.open_table(SEQUENCES)?;
            let last = sequences.get(E::NAME)?.map(|v| v.value()).unwrap_or(0);
            let id = last + 1;
            sequences.insert(E::NAME, id)?;

            record.assign_id(id);
            let data = rmp_serde::to_vec_named(&record)?;
            let mut table = write_txn.open_table(E::TABLE)?;
            table.insert(id, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(record)
    }

    /// Get a record by id
    pub fn get<E: Entity>(&self, id: u64) -> Result<Option<E>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(E::TABLE)?;

        let record = match table.get(id)? {
            Some(data) => Some(rmp_serde::from_slice(data.value())?),
            None => None,
        };
        Ok(record)
    }

    /// Check whether a record with this id exists
    pub fn exists<E: Entity>(&self, id: u64) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(E::TABLE)?;
        let found = table.get(id)?.is_some();
        Ok(found)
    }

    /// All records of `E`, ordered by id
    pub fn list<E: Entity>(&self) -> Result<Vec<E>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(E::TABLE)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let record: E = rmp_serde::from_slice(value.value())?;
            records.push(record);
        }

        Ok(records)
    }

    /// Apply `change` to the stored record and bump its `updated_at`.
    /// Returns `None` when no record has this id.
    pub fn update<E, F>(&self, id: u64, change: F) -> Result<Option<E>, DatabaseError>
    where
        E: Entity,
        F: FnOnce(&mut E),
    {
        let write_txn = self.begin_write()?;

        let updated = {
            let mut table = write_txn.open_table(E::TABLE)?;
            let existing: Option<E> = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };

            match existing {
                Some(mut record) => {
                    change(&mut record);
                    record.touch(chrono::Utc::now());
                    let serialized = rmp_serde::to_vec_named(&record)?;
                    table.insert(id, serialized.as_slice())?;
                    Some(record)
                }
                None => None,
            }
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete a record by id. Returns whether a row was removed.
    pub fn delete<E: Entity>(&self, id: u64) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(E::TABLE)?;
            let removed = table.remove(id)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(deleted)
    }
}
