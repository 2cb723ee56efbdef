use chrono::{DateTime, Utc};
use redb::TableDefinition;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::tables::*;

/// A row type persisted in its own redb table, keyed by a sequence-allocated id.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Singular name, used for id sequences and log fields.
    const NAME: &'static str;
    const TABLE: TableDefinition<'static, u64, &'static [u8]>;

    fn id(&self) -> u64;
    fn assign_id(&mut self, id: u64);
    fn touch(&mut self, now: DateTime<Utc>);
}

/// A record that owns exactly one blob in the object store.
pub trait Attachment: Entity {
    /// Object store directory new blobs are written under.
    const DIRECTORY: &'static str;
    /// Name of the upload field in requests and validation errors.
    const FILE_FIELD: &'static str;

    fn stored_path(&self) -> &str;
    fn set_stored_path(&mut self, key: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuperadminRole {
    Governeur,
    SecretaireGeneral,
}

impl SuperadminRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "governeur" => Some(SuperadminRole::Governeur),
            "secretaire_general" => Some(SuperadminRole::SecretaireGeneral),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Superadmin {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub role: SuperadminRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub superadmin_id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Division {
    pub id: u64,
    pub division_nom: String,
    pub division_responsable: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub division_id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An uploaded document attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: u64,
    pub task_id: u64,
    /// Object store key of the uploaded file
    pub document_path: String,
    #[serde(default)]
    pub hist_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A dated revision of a task, with the document describing the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub task_id: u64,
    pub description: String,
    pub change_date: DateTime<Utc>,
    /// Object store key of the uploaded file
    pub dochistorique_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Superadmin {
    const NAME: &'static str = "superadmin";
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = SUPERADMINS;

    fn id(&self) -> u64 {
        self.id
    }
    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for Admin {
    const NAME: &'static str = "admin";
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = ADMINS;

    fn id(&self) -> u64 {
        self.id
    }
    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for Division {
    const NAME: &'static str = "division";
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = DIVISIONS;

    fn id(&self) -> u64 {
        self.id
    }
    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for Task {
    const NAME: &'static str = "task";
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = TASKS;

    fn id(&self) -> u64 {
        self.id
    }
    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for DocumentRecord {
    const NAME: &'static str = "document";
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = DOCUMENTS;

    fn id(&self) -> u64 {
        self.id
    }
    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Attachment for DocumentRecord {
    const DIRECTORY: &'static str = "uploads";
    const FILE_FIELD: &'static str = "document_path";

    fn stored_path(&self) -> &str {
        &self.document_path
    }
    fn set_stored_path(&mut self, key: String) {
        self.document_path = key;
    }
}

impl Entity for HistoryEntry {
    const NAME: &'static str = "historique";
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = HISTORIQUES;

    fn id(&self) -> u64 {
        self.id
    }
    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Attachment for HistoryEntry {
    const DIRECTORY: &'static str = "historiques";
    const FILE_FIELD: &'static str = "dochistorique_path";

    fn stored_path(&self) -> &str {
        &self.dochistorique_path
    }
    fn set_stored_path(&mut self, key: String) {
        self.dochistorique_path = key;
    }
}
