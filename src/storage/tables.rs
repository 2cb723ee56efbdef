use redb::TableDefinition;

/// Superadmin accounts: id -> Superadmin (msgpack)
pub const SUPERADMINS: TableDefinition<u64, &[u8]> = TableDefinition::new("superadmins");

/// Admin (secretary) accounts: id -> Admin (msgpack)
pub const ADMINS: TableDefinition<u64, &[u8]> = TableDefinition::new("admins");

/// Divisions: id -> Division (msgpack)
pub const DIVISIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("divisions");

/// Tasks: id -> Task (msgpack)
pub const TASKS: TableDefinition<u64, &[u8]> = TableDefinition::new("tasks");

/// Uploaded task documents: id -> DocumentRecord (msgpack)
pub const DOCUMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("documentpaths");

/// Task history entries: id -> HistoryEntry (msgpack)
pub const HISTORIQUES: TableDefinition<u64, &[u8]> = TableDefinition::new("historiques");

/// Id allocation: entity name -> last issued id
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
