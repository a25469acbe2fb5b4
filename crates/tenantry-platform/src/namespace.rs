//! Tenant namespaces: one isolated SQLite database per tenant.
//!
//! A namespace is named `sdp_<tenant name>` and lives at
//! `<root>/<namespace>.db`. Opening it applies any pending migrations, and
//! every write here is idempotent so a provisioning run can be repeated.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use tenantry_core::MessageChannel;
use tenantry_core::error::{Result, TenantryError};

use crate::network::{AssetSpec, WalletSpec};

pub const SCHEMA_PREFIX: &str = "sdp_";

/// Longest namespace name accepted, prefix included.
pub const MAX_SCHEMA_NAME_LEN: usize = 63;

/// Namespace name for a tenant.
pub fn schema_name_for(tenant_name: &str) -> String {
    format!("{SCHEMA_PREFIX}{tenant_name}")
}

/// Ordered, append-only migrations applied to every tenant namespace.
const MIGRATIONS: &[(&str, &str)] = &[
    ("2024-01-10.0-initial-organizations", "
        CREATE TABLE organizations (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            name TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now'))
        );
    "),
    ("2024-01-10.1-assets-wallets", "
        CREATE TABLE assets (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            issuer TEXT NOT NULL DEFAULT '',
            created_at TEXT DEFAULT (datetime('now')),
            UNIQUE(code, issuer)
        );
        CREATE TABLE wallets (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            homepage TEXT NOT NULL,
            deep_link_schema TEXT NOT NULL,
            sep_10_client_domain TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now'))
        );
        CREATE TABLE wallets_assets (
            wallet_id TEXT NOT NULL REFERENCES wallets(id),
            asset_id TEXT NOT NULL REFERENCES assets(id),
            PRIMARY KEY (wallet_id, asset_id)
        );
    "),
    ("2024-01-10.2-auth-users", "
        CREATE TABLE auth_users (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            encrypted_password TEXT NOT NULL,
            roles TEXT NOT NULL DEFAULT '',
            is_owner INTEGER NOT NULL DEFAULT 0,
            created_at TEXT DEFAULT (datetime('now'))
        );
    "),
    ("2024-01-10.3-messages", "
        CREATE TABLE messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            channel TEXT NOT NULL,
            recipient TEXT NOT NULL,
            title TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now'))
        );
    "),
];

/// Owner account details supplied at provisioning time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOwner {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// A user row inside a tenant namespace.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TenantUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub is_owner: bool,
}

/// Locates and opens tenant namespaces under a root directory.
#[derive(Debug, Clone)]
pub struct NamespaceStore {
    root: PathBuf,
}

impl NamespaceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, schema_name: &str) -> PathBuf {
        self.root.join(format!("{schema_name}.db"))
    }

    pub fn exists(&self, schema_name: &str) -> bool {
        self.path_for(schema_name).exists()
    }

    /// Create the namespace if needed and bring its migrations up to date.
    pub fn ensure_namespace(&self, schema_name: &str) -> Result<TenantDb> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(schema_name);
        let conn = Connection::open(&path)
            .map_err(|e| TenantryError::database(format!("open namespace {schema_name}: {e}")))?;
        let db = TenantDb { conn, schema_name: schema_name.into() };
        let applied = db.migrate()?;
        if applied > 0 {
            tracing::info!(namespace = schema_name, applied, "namespace migrations applied");
        }
        Ok(db)
    }

    /// Open an existing namespace.
    pub fn open(&self, schema_name: &str) -> Result<TenantDb> {
        if !self.exists(schema_name) {
            return Err(TenantryError::database(format!("namespace {schema_name} does not exist")));
        }
        self.ensure_namespace(schema_name)
    }
}

/// An open tenant namespace.
pub struct TenantDb {
    conn: Connection,
    schema_name: String,
}

impl TenantDb {
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Apply pending migrations; returns how many ran.
    fn migrate(&self) -> Result<usize> {
        self.conn.execute_batch("
            CREATE TABLE IF NOT EXISTS sdp_migrations (
                id TEXT PRIMARY KEY,
                applied_at TEXT DEFAULT (datetime('now'))
            );
        ").map_err(|e| TenantryError::Migration(format!("{}: {e}", self.schema_name)))?;

        let mut applied = 0;
        for (id, sql) in MIGRATIONS {
            let done: bool = self.conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sdp_migrations WHERE id=?1)", params![id], |r| r.get(0),
            ).map_err(|e| TenantryError::Migration(format!("{id}: {e}")))?;
            if done {
                continue;
            }

            let tx = self.conn.unchecked_transaction()
                .map_err(|e| TenantryError::Migration(format!("{id}: {e}")))?;
            tx.execute_batch(sql)
                .map_err(|e| TenantryError::Migration(format!("{id}: {e}")))?;
            tx.execute("INSERT INTO sdp_migrations (id) VALUES (?1)", params![id])
                .map_err(|e| TenantryError::Migration(format!("{id}: {e}")))?;
            tx.commit().map_err(|e| TenantryError::Migration(format!("{id}: {e}")))?;
            applied += 1;
        }
        Ok(applied)
    }

    pub fn applied_migrations(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM sdp_migrations ORDER BY id")
            .map_err(|e| TenantryError::database(format!("Prepare: {e}")))?;
        let ids = stmt.query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| TenantryError::database(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TenantryError::database(format!("Read migration: {e}")))?;
        Ok(ids)
    }

    /// Tables in this namespace, sorted by name.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
        ).map_err(|e| TenantryError::database(format!("Prepare: {e}")))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| TenantryError::database(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TenantryError::database(format!("Read table: {e}")))?;
        Ok(names)
    }

    // ── Organization ────────────────────────────────────

    pub fn set_organization_name(&self, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO organizations (id, name) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, updated_at = datetime('now')",
            params![name],
        ).map_err(|e| TenantryError::database(format!("Set organization: {e}")))?;
        Ok(())
    }

    pub fn organization_name(&self) -> Result<Option<String>> {
        self.conn.query_row("SELECT name FROM organizations WHERE id = 1", [], |r| r.get(0))
            .optional()
            .map_err(|e| TenantryError::database(format!("Get organization: {e}")))
    }

    // ── Reference data ────────────────────────────────────

    /// Insert assets that are not present yet; returns how many were new.
    pub fn seed_assets(&self, assets: &[AssetSpec]) -> Result<usize> {
        let mut inserted = 0;
        for asset in assets {
            inserted += self.conn.execute(
                "INSERT OR IGNORE INTO assets (id, code, issuer) VALUES (?1, ?2, ?3)",
                params![uuid::Uuid::new_v4().to_string(), asset.code, asset.issuer],
            ).map_err(|e| TenantryError::database(format!("Seed asset {asset}: {e}")))?;
        }
        Ok(inserted)
    }

    /// Insert wallets that are not present yet and link them to their assets.
    pub fn seed_wallets(&self, wallets: &[WalletSpec]) -> Result<usize> {
        let mut inserted = 0;
        for wallet in wallets {
            inserted += self.conn.execute(
                "INSERT OR IGNORE INTO wallets (id, name, homepage, deep_link_schema, sep_10_client_domain) VALUES (?1,?2,?3,?4,?5)",
                params![
                    uuid::Uuid::new_v4().to_string(), wallet.name, wallet.homepage,
                    wallet.deep_link_schema, wallet.sep_10_client_domain
                ],
            ).map_err(|e| TenantryError::database(format!("Seed wallet {}: {e}", wallet.name)))?;

            for code in wallet.assets {
                self.conn.execute(
                    "INSERT OR IGNORE INTO wallets_assets (wallet_id, asset_id)
                     SELECT w.id, a.id FROM wallets w, assets a WHERE w.name = ?1 AND a.code = ?2",
                    params![wallet.name, code],
                ).map_err(|e| TenantryError::database(format!("Link wallet {} to {code}: {e}", wallet.name)))?;
            }
        }
        Ok(inserted)
    }

    /// Registered assets as `CODE:ISSUER`, sorted.
    pub fn list_assets(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT code || ':' || issuer FROM assets ORDER BY code, issuer")
            .map_err(|e| TenantryError::database(format!("Prepare: {e}")))?;
        let assets = stmt.query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| TenantryError::database(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TenantryError::database(format!("Read asset: {e}")))?;
        Ok(assets)
    }

    /// Registered wallet names, sorted.
    pub fn list_wallets(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM wallets ORDER BY name")
            .map_err(|e| TenantryError::database(format!("Prepare: {e}")))?;
        let wallets = stmt.query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| TenantryError::database(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TenantryError::database(format!("Read wallet: {e}")))?;
        Ok(wallets)
    }

    pub fn wallet_assets(&self, wallet_name: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.code FROM wallets_assets wa
             JOIN wallets w ON w.id = wa.wallet_id
             JOIN assets a ON a.id = wa.asset_id
             WHERE w.name = ?1 ORDER BY a.code"
        ).map_err(|e| TenantryError::database(format!("Prepare: {e}")))?;
        let codes = stmt.query_map(params![wallet_name], |row| row.get::<_, String>(0))
            .map_err(|e| TenantryError::database(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TenantryError::database(format!("Read wallet asset: {e}")))?;
        Ok(codes)
    }

    // ── Users ────────────────────────────────────

    /// Create the tenant owner, or return the existing owner with that email.
    /// A namespace has one owner: a different email is rejected.
    pub fn create_owner(&self, owner: &NewOwner, password_hash: &str) -> Result<TenantUser> {
        if let Some(existing) = self.get_owner()? {
            if existing.email != owner.email {
                return Err(TenantryError::validation(format!(
                    "namespace {} already has owner {}, not {}",
                    self.schema_name, existing.email, owner.email
                )));
            }
            tracing::debug!(namespace = %self.schema_name, email = %owner.email, "owner already exists");
            return Ok(existing);
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO auth_users (id, first_name, last_name, email, encrypted_password, roles, is_owner)
             VALUES (?1,?2,?3,?4,?5,'owner',1)",
            params![id, owner.first_name, owner.last_name, owner.email, password_hash],
        ).map_err(|e| TenantryError::database(format!("Create owner: {e}")))?;

        self.get_user_by_email(&owner.email)?
            .ok_or_else(|| TenantryError::database(format!("owner {} missing after insert", owner.email)))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<TenantUser>> {
        self.conn.query_row(
            "SELECT id, first_name, last_name, email, roles, is_owner FROM auth_users WHERE email=?1",
            params![email],
            row_to_user,
        ).optional()
            .map_err(|e| TenantryError::database(format!("Get user: {e}")))
    }

    pub fn get_owner(&self) -> Result<Option<TenantUser>> {
        self.conn.query_row(
            "SELECT id, first_name, last_name, email, roles, is_owner FROM auth_users
             WHERE is_owner=1 ORDER BY rowid LIMIT 1",
            [],
            row_to_user,
        ).optional()
            .map_err(|e| TenantryError::database(format!("Get owner: {e}")))
    }

    // ── Messages ────────────────────────────────────

    pub fn record_message(&self, channel: MessageChannel, recipient: &str, title: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO messages (channel, recipient, title) VALUES (?1,?2,?3)",
            params![channel.as_str(), recipient, title],
        ).map_err(|e| TenantryError::database(format!("Record message: {e}")))?;
        Ok(())
    }

    /// Sent messages as `(channel, recipient, title)`, oldest first.
    pub fn list_messages(&self) -> Result<Vec<(String, String, String)>> {
        let mut stmt = self.conn.prepare("SELECT channel, recipient, title FROM messages ORDER BY id")
            .map_err(|e| TenantryError::database(format!("Prepare: {e}")))?;
        let messages = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(|e| TenantryError::database(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TenantryError::database(format!("Read message: {e}")))?;
        Ok(messages)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<TenantUser> {
    Ok(TenantUser {
        id: row.get(0)?, first_name: row.get(1)?, last_name: row.get(2)?, email: row.get(3)?,
        roles: row.get::<_, String>(4)?.split(',').filter(|r| !r.is_empty()).map(String::from).collect(),
        is_owner: row.get::<_, i32>(5)? != 0,
    })
}
