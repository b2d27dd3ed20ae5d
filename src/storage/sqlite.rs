// ABOUTME: SQLite storage backend for clients, consents, users, and issued token records
// ABOUTME: Creates its schema on connect and replaces clients transactionally on upsert
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # `SQLite` storage
//!
//! List-valued client columns (scopes, redirect URIs, grant types) are
//! stored as JSON arrays in `TEXT` columns.

use async_trait::async_trait;
use oauth_labs_core::errors::StorageError;
use oauth_labs_core::models::{AccessTokenRecord, Client, Consent, RefreshTokenRecord};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, warn};

use super::{
    AccessTokenRepository, ClientRepository, ConsentRepository, RefreshTokenRepository,
    StorageResult, UserDirectory,
};

/// `SQLite`-backed repositories
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open the database and create missing tables
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let in_memory = database_url.contains(":memory:");

        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if !in_memory
            && database_url.starts_with("sqlite:")
            && !database_url.contains('?')
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        // Every connection to `:memory:` opens a separate database
        let max_connections = if in_memory { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&connection_options)
            .await
            .map_err(|e| StorageError::backend("connect", e))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the database pool
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Create tables and indexes
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_clients (
                id TEXT PRIMARY KEY,
                secret_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                client_uri TEXT,
                logo_uri TEXT,
                contacts TEXT NOT NULL DEFAULT '[]',
                scope TEXT NOT NULL,
                redirect_uris TEXT NOT NULL,
                token_endpoint_auth_method TEXT NOT NULL,
                grant_types TEXT NOT NULL,
                response_types TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_consents (
                user_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, client_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_users (
                id TEXT PRIMARY KEY,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_access_tokens (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                data TEXT NOT NULL,
                revoked BOOLEAN NOT NULL DEFAULT false,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_refresh_tokens (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                data TEXT NOT NULL,
                revoked BOOLEAN NOT NULL DEFAULT false,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_access_tokens_pair ON oauth_access_tokens(client_id, user_id)",
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_pair ON oauth_refresh_tokens(client_id, user_id)",
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        debug!("SQLite schema ready");
        Ok(())
    }
}

fn encode_list(entity: &'static str, values: &[String]) -> StorageResult<String> {
    serde_json::to_string(values).map_err(|source| StorageError::Serialization { entity, source })
}

fn decode_list(entity: &'static str, raw: &str) -> StorageResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|source| StorageError::Serialization { entity, source })
}

fn row_to_client(row: &SqliteRow) -> StorageResult<Client> {
    Ok(Client {
        id: row.try_get("id")?,
        secret_hash: row.try_get("secret_hash")?,
        name: row.try_get("name")?,
        client_uri: row.try_get("client_uri")?,
        logo_uri: row.try_get("logo_uri")?,
        contacts: decode_list("client contacts", row.try_get("contacts")?)?,
        scope: decode_list("client scope", row.try_get("scope")?)?,
        redirect_uris: decode_list("client redirect_uris", row.try_get("redirect_uris")?)?,
        token_endpoint_auth_method: row.try_get("token_endpoint_auth_method")?,
        grant_types: decode_list("client grant_types", row.try_get("grant_types")?)?,
        response_types: decode_list("client response_types", row.try_get("response_types")?)?,
        created_at: row.try_get("created_at")?,
    })
}

const CLIENT_COLUMNS: &str = "id, secret_hash, name, client_uri, logo_uri, contacts, scope, \
     redirect_uris, token_endpoint_auth_method, grant_types, response_types, created_at";

#[async_trait]
impl ClientRepository for SqliteStore {
    async fn get(&self, id: &str) -> StorageResult<Option<Client>> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM oauth_clients WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_client).transpose()
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM oauth_clients WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn upsert(&self, client: &Client) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM oauth_clients WHERE id = ?1")
            .bind(&client.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(&format!(
            "INSERT INTO oauth_clients ({CLIENT_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ))
        .bind(&client.id)
        .bind(&client.secret_hash)
        .bind(&client.name)
        .bind(&client.client_uri)
        .bind(&client.logo_uri)
        .bind(encode_list("client contacts", &client.contacts)?)
        .bind(encode_list("client scope", &client.scope)?)
        .bind(encode_list("client redirect_uris", &client.redirect_uris)?)
        .bind(&client.token_endpoint_auth_method)
        .bind(encode_list("client grant_types", &client.grant_types)?)
        .bind(encode_list("client response_types", &client.response_types)?)
        .bind(client.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<Client>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM oauth_clients ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_client).collect()
    }
}

#[async_trait]
impl ConsentRepository for SqliteStore {
    async fn create(&self, consent: &Consent) -> StorageResult<()> {
        sqlx::query("INSERT OR IGNORE INTO oauth_consents (user_id, client_id) VALUES (?1, ?2)")
            .bind(&consent.user_id)
            .bind(&consent.client_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, consent: &Consent) -> StorageResult<()> {
        sqlx::query("DELETE FROM oauth_consents WHERE user_id = ?1 AND client_id = ?2")
            .bind(&consent.user_id)
            .bind(&consent.client_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn exists(&self, consent: &Consent) -> StorageResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM oauth_consents WHERE user_id = ?1 AND client_id = ?2",
        )
        .bind(&consent.user_id)
        .bind(&consent.client_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn list_for_user(&self, user_id: &str) -> StorageResult<Vec<String>> {
        let clients: Vec<String> = sqlx::query_scalar(
            "SELECT client_id FROM oauth_consents WHERE user_id = ?1 ORDER BY client_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn exists(&self, user_id: &str) -> StorageResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM oauth_users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn add(&self, user_id: &str) -> StorageResult<()> {
        sqlx::query("INSERT OR IGNORE INTO oauth_users (id) VALUES (?1)")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AccessTokenRepository for SqliteStore {
    async fn create(&self, record: &AccessTokenRecord) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO oauth_access_tokens (id, client_id, user_id, data, revoked) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&record.id)
        .bind(&record.client_id)
        .bind(&record.user_id)
        .bind(&record.data)
        .bind(record.revoked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM oauth_access_tokens WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn is_revoked(&self, id: &str) -> bool {
        let revoked: Result<Option<bool>, sqlx::Error> =
            sqlx::query_scalar("SELECT revoked FROM oauth_access_tokens WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;

        match revoked {
            Ok(flag) => flag.unwrap_or(true),
            Err(e) => {
                warn!(token_id = %id, error = %e, "Revocation lookup failed, treating token as revoked");
                true
            }
        }
    }

    async fn revoke_all(&self, client_id: &str, user_id: &str) -> StorageResult<()> {
        sqlx::query(
            "UPDATE oauth_access_tokens SET revoked = true WHERE client_id = ?1 AND user_id = ?2",
        )
        .bind(client_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_all(&self, client_id: &str, user_id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM oauth_access_tokens WHERE client_id = ?1 AND user_id = ?2")
            .bind(client_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenRepository for SqliteStore {
    async fn create(&self, record: &RefreshTokenRecord) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO oauth_refresh_tokens (id, client_id, user_id, data, revoked) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&record.id)
        .bind(&record.client_id)
        .bind(&record.user_id)
        .bind(&record.data)
        .bind(record.revoked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> StorageResult<Option<RefreshTokenRecord>> {
        let row = sqlx::query(
            "SELECT id, client_id, user_id, data, revoked FROM oauth_refresh_tokens WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> StorageResult<RefreshTokenRecord> {
            Ok(RefreshTokenRecord {
                id: row.try_get("id")?,
                client_id: row.try_get("client_id")?,
                user_id: row.try_get("user_id")?,
                data: row.try_get("data")?,
                revoked: row.try_get("revoked")?,
            })
        })
        .transpose()
    }

    async fn revoke(&self, id: &str) -> StorageResult<()> {
        sqlx::query("UPDATE oauth_refresh_tokens SET revoked = true WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_all(&self, client_id: &str, user_id: &str) -> StorageResult<()> {
        sqlx::query(
            "UPDATE oauth_refresh_tokens SET revoked = true WHERE client_id = ?1 AND user_id = ?2",
        )
        .bind(client_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_client(id: &str) -> Client {
        Client {
            id: id.to_owned(),
            secret_hash: "$argon2id$stub".to_owned(),
            name: "Sample".to_owned(),
            client_uri: None,
            logo_uri: Some("https://example.com/logo.png".to_owned()),
            contacts: vec![],
            scope: vec!["read:profile".to_owned()],
            redirect_uris: vec!["https://example.com/cb".to_owned()],
            token_endpoint_auth_method: "client_secret_basic".to_owned(),
            grant_types: vec!["authorization_code".to_owned()],
            response_types: vec!["code".to_owned()],
            created_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_client_upsert_replaces_row() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let mut client = sample_client("client-1");
        store.upsert(&client).await.unwrap();

        client.scope.push("write:profile".to_owned());
        store.upsert(&client).await.unwrap();

        let loaded = ClientRepository::get(&store, "client-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, client);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_token_revocation() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let record = RefreshTokenRecord {
            id: "rt-1".to_owned(),
            client_id: "client-1".to_owned(),
            user_id: "alice".to_owned(),
            data: "abcd".to_owned(),
            revoked: false,
        };
        RefreshTokenRepository::create(&store, &record).await.unwrap();
        RefreshTokenRepository::revoke_all(&store, "client-1", "alice")
            .await
            .unwrap();

        let loaded = RefreshTokenRepository::get(&store, "rt-1")
            .await
            .unwrap()
            .unwrap();
        assert!(loaded.revoked);
    }

    #[tokio::test]
    async fn test_unknown_access_token_counts_as_revoked() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        assert!(store.is_revoked("missing").await);
    }
}
