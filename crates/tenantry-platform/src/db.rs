//! Tenant directory: SQLite store of tenant records and the audit log.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use tenantry_core::MessengerType;
use tenantry_core::error::{Result, TenantryError};

use crate::ledger::DistributionAccount;
use crate::namespace::schema_name_for;
use crate::network::Network;

/// Lifecycle state of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Provisioning,
    Active,
    Deactivated,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Active => "active",
            Self::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = TenantryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "provisioning" => Ok(Self::Provisioning),
            "active" => Ok(Self::Active),
            "deactivated" => Ok(Self::Deactivated),
            other => Err(TenantryError::validation(format!("unknown tenant status {other:?}"))),
        }
    }
}

impl ToSql for TenantStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TenantStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|_| FromSqlError::InvalidType)
    }
}

/// Tenant record.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub status: TenantStatus,
    /// Isolated storage namespace, derived from `name`.
    pub schema_name: String,
    pub organization_name: String,
    pub network: Option<Network>,
    pub distribution_account: Option<String>,
    pub bootstrap_amount: Option<i64>,
    pub ui_base_url: Option<String>,
    pub email_sender_type: Option<String>,
    pub sms_sender_type: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Settings that may change after a tenant is created. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct TenantConfigUpdate {
    pub ui_base_url: Option<String>,
    pub email_sender_type: Option<MessengerType>,
    pub sms_sender_type: Option<MessengerType>,
}

/// Audit log entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub event_type: String,
    pub actor_type: String,
    pub actor_id: String,
    pub details: Option<String>,
    pub created_at: String,
}

const TENANT_COLUMNS: &str = "id,name,status,schema_name,organization_name,network,distribution_account,bootstrap_amount,ui_base_url,email_sender_type,sms_sender_type,created_at,updated_at";

fn tenant_from_row(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: row.get(0)?, name: row.get(1)?, status: row.get(2)?, schema_name: row.get(3)?,
        organization_name: row.get(4)?, network: row.get(5)?, distribution_account: row.get(6)?,
        bootstrap_amount: row.get(7)?, ui_base_url: row.get(8)?, email_sender_type: row.get(9)?,
        sms_sender_type: row.get(10)?, created_at: row.get(11)?, updated_at: row.get(12)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
}

/// Platform database manager.
///
/// The connection is locked per statement (or per short transaction) and
/// never held across an await point by callers.
pub struct PlatformDb {
    conn: Mutex<Connection>,
}

impl PlatformDb {
    /// Open or create the platform database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| TenantryError::database(format!("DB open error: {e}")))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TenantryError::database(format!("DB open error: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        self.conn().execute_batch("
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                status TEXT NOT NULL DEFAULT 'provisioning',
                schema_name TEXT NOT NULL,
                organization_name TEXT NOT NULL,
                network TEXT,
                distribution_account TEXT,
                bootstrap_amount INTEGER,
                ui_base_url TEXT,
                email_sender_type TEXT,
                sms_sender_type TEXT,
                created_at TEXT DEFAULT (datetime('now')),
                updated_at TEXT DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                actor_type TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                details TEXT,
                created_at TEXT DEFAULT (datetime('now'))
            );
        ").map_err(|e| TenantryError::database(format!("Migration error: {e}")))?;
        Ok(())
    }

    // ── Tenant CRUD ────────────────────────────────────

    /// Insert a new tenant in `provisioning` status.
    ///
    /// The unique index on `name` is the only guard against provisioning the
    /// same tenant twice; a conflict surfaces as [`TenantryError::DuplicateTenant`].
    pub fn add_tenant(&self, name: &str, organization_name: &str) -> Result<Tenant> {
        let id = uuid::Uuid::new_v4().to_string();
        let schema_name = schema_name_for(name);

        let mut conn = self.conn();
        let tx = conn.transaction()
            .map_err(|e| TenantryError::database(format!("Begin: {e}")))?;

        match tx.execute(
            "INSERT INTO tenants (id, name, status, schema_name, organization_name) VALUES (?1,?2,?3,?4,?5)",
            params![id, name, TenantStatus::Provisioning, schema_name, organization_name],
        ) {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(TenantryError::DuplicateTenant(name.into())),
            Err(e) => return Err(TenantryError::database(format!("Insert tenant: {e}"))),
        }

        tx.execute(
            "INSERT INTO audit_log (event_type, actor_type, actor_id, details) VALUES ('tenant_created','system',?1,?2)",
            params![id, format!("name={name}")],
        ).map_err(|e| TenantryError::database(format!("Log event: {e}")))?;

        let tenant = tx.query_row(
            &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id=?1"),
            params![id],
            tenant_from_row,
        ).map_err(|e| TenantryError::database(format!("Get tenant: {e}")))?;

        tx.commit().map_err(|e| TenantryError::database(format!("Commit: {e}")))?;
        Ok(tenant)
    }

    /// Get a tenant by ID.
    pub fn get_tenant(&self, id: &str) -> Result<Tenant> {
        self.conn().query_row(
            &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id=?1"),
            params![id],
            tenant_from_row,
        ).optional()
            .map_err(|e| TenantryError::database(format!("Get tenant: {e}")))?
            .ok_or_else(|| TenantryError::database(format!("tenant {id} not found")))
    }

    pub fn get_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>> {
        self.conn().query_row(
            &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE name=?1"),
            params![name],
            tenant_from_row,
        ).optional()
            .map_err(|e| TenantryError::database(format!("Get tenant by name: {e}")))
    }

    /// List all tenants, oldest first.
    pub fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            &format!("SELECT {TENANT_COLUMNS} FROM tenants ORDER BY created_at, name")
        ).map_err(|e| TenantryError::database(format!("Prepare: {e}")))?;

        let tenants = stmt.query_map([], tenant_from_row)
            .map_err(|e| TenantryError::database(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TenantryError::database(format!("Read tenant: {e}")))?;
        Ok(tenants)
    }

    /// Update tenant status and record the transition.
    pub fn update_tenant_status(&self, id: &str, status: TenantStatus) -> Result<Tenant> {
        {
            let conn = self.conn();
            let changed = conn.execute(
                "UPDATE tenants SET status=?1, updated_at=datetime('now') WHERE id=?2",
                params![status, id],
            ).map_err(|e| TenantryError::database(format!("Update status: {e}")))?;
            if changed == 0 {
                return Err(TenantryError::database(format!("tenant {id} not found")));
            }
            conn.execute(
                "INSERT INTO audit_log (event_type, actor_type, actor_id, details) VALUES ('tenant_status_changed','system',?1,?2)",
                params![id, format!("status={status}")],
            ).map_err(|e| TenantryError::database(format!("Log event: {e}")))?;
        }
        self.get_tenant(id)
    }

    /// Record the ledger account a tenant disburses from.
    pub fn set_distribution_account(&self, id: &str, account: &DistributionAccount) -> Result<Tenant> {
        let changed = self.conn().execute(
            "UPDATE tenants SET distribution_account=?1, network=?2, bootstrap_amount=?3, updated_at=datetime('now') WHERE id=?4",
            params![account.address, account.network, account.bootstrap_amount, id],
        ).map_err(|e| TenantryError::database(format!("Set distribution account: {e}")))?;
        if changed == 0 {
            return Err(TenantryError::database(format!("tenant {id} not found")));
        }
        self.get_tenant(id)
    }

    pub fn update_tenant_config(&self, id: &str, update: &TenantConfigUpdate) -> Result<Tenant> {
        let changed = self.conn().execute(
            "UPDATE tenants SET
               ui_base_url = COALESCE(?1, ui_base_url),
               email_sender_type = COALESCE(?2, email_sender_type),
               sms_sender_type = COALESCE(?3, sms_sender_type),
               updated_at = datetime('now')
             WHERE id=?4",
            params![
                update.ui_base_url,
                update.email_sender_type.map(|t| t.as_str()),
                update.sms_sender_type.map(|t| t.as_str()),
                id
            ],
        ).map_err(|e| TenantryError::database(format!("Update tenant config: {e}")))?;
        if changed == 0 {
            return Err(TenantryError::database(format!("tenant {id} not found")));
        }
        self.get_tenant(id)
    }

    // ── Audit Log ────────────────────────────────────

    /// Log an audit event.
    pub fn log_event(&self, event_type: &str, actor_type: &str, actor_id: &str, details: Option<&str>) -> Result<()> {
        self.conn().execute(
            "INSERT INTO audit_log (event_type, actor_type, actor_id, details) VALUES (?1,?2,?3,?4)",
            params![event_type, actor_type, actor_id, details],
        ).map_err(|e| TenantryError::database(format!("Log event: {e}")))?;
        Ok(())
    }

    /// Get recent audit entries, most recent first.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id,event_type,actor_type,actor_id,details,created_at FROM audit_log ORDER BY id DESC LIMIT ?1"
        ).map_err(|e| TenantryError::database(format!("Prepare: {e}")))?;

        let entries = stmt.query_map(params![limit as i64], |row| Ok(AuditEntry {
            id: row.get(0)?, event_type: row.get(1)?, actor_type: row.get(2)?,
            actor_id: row.get(3)?, details: row.get(4)?, created_at: row.get(5)?,
        })).map_err(|e| TenantryError::database(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TenantryError::database(format!("Read event: {e}")))?;
        Ok(entries)
    }
}
