//! Connection descriptors and the name-based connection lookup.
//!
//! These are supplied by the management layer; the adapters only read them.

use serde::{Deserialize, Serialize};

/// Credentials for an RFC endpoint (application server logon).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfcConnection {
    pub name: String,
    /// Application server host.
    pub ashost: String,
    /// System number, e.g. `"00"`.
    pub sysnr: String,
    /// Logon client, e.g. `"100"`.
    pub client: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "EN".to_string()
}

/// Credentials for a relational database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbConnection {
    pub name: String,
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

fn default_db_port() -> u16 {
    5432
}

/// Name-keyed lookup over the connections the operator has configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRegistry {
    #[serde(default)]
    pub rfc: Vec<RfcConnection>,
    #[serde(default)]
    pub db: Vec<DbConnection>,
}

impl ConnectionRegistry {
    pub fn find_rfc(&self, name: &str) -> Option<&RfcConnection> {
        self.rfc.iter().find(|c| c.name == name)
    }

    pub fn find_db(&self, name: &str) -> Option<&DbConnection> {
        self.db.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_applied_when_fields_are_missing() {
        let rfc: RfcConnection = serde_json::from_value(json!({
            "name": "dev",
            "ashost": "10.0.0.1",
            "sysnr": "00",
            "client": "100",
            "user": "RFC_USER",
            "password": "secret"
        }))
        .unwrap();
        assert_eq!(rfc.language, "EN");

        let db: DbConnection = serde_json::from_value(json!({
            "name": "warehouse",
            "host": "localhost",
            "database": "dw",
            "user": "etl",
            "password": "pw"
        }))
        .unwrap();
        assert_eq!(db.port, 5432);
    }

    #[test]
    fn registry_finds_connections_by_name() {
        let registry: ConnectionRegistry = serde_json::from_value(json!({
            "db": [{
                "name": "warehouse",
                "host": "localhost",
                "database": "dw",
                "user": "etl",
                "password": "pw"
            }]
        }))
        .unwrap();

        assert!(registry.find_db("warehouse").is_some());
        assert!(registry.find_db("missing").is_none());
        assert!(registry.find_rfc("warehouse").is_none());
    }
}
