//! Interface bundle: the JSON document the CLI runs from.
//!
//! A bundle carries everything a run needs that the engine does not own:
//! interface definitions, the RFC/SQL catalog, and the named connections.
//!
//! ```json
//! {
//!   "interfaces":   [ { "id": "...", "name": "...", "steps": [...] } ],
//!   "rpcFunctions": [ ... ],
//!   "sqlQueries":   [ ... ],
//!   "connections":  { "rfc": [ ... ], "db": [ ... ] }
//! }
//! ```

use std::path::Path;

use adapters::ConnectionRegistry;
use anyhow::{anyhow, bail, Context};
use engine::{Catalog, Connections, InterfaceDefinition};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,
    #[serde(flatten)]
    pub catalog: Catalog,
    #[serde(default)]
    pub connections: ConnectionRegistry,
}

impl Bundle {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read bundle {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid bundle {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Find an interface by ID, falling back to its display name.
    pub fn interface(&self, key: &str) -> anyhow::Result<&InterfaceDefinition> {
        self.interfaces
            .iter()
            .find(|i| i.id == key)
            .or_else(|| self.interfaces.iter().find(|i| i.name == key))
            .ok_or_else(|| anyhow!("no interface with id or name '{key}' in bundle"))
    }

    /// Pick the connections for a run.
    ///
    /// A named connection must exist. Without a name, the only configured
    /// connection of that kind is used; with zero or several, none is.
    pub fn select_connections(&self, rfc: Option<&str>, db: Option<&str>) -> anyhow::Result<Connections> {
        let registry = &self.connections;

        let rfc = match rfc {
            Some(name) => match registry.find_rfc(name) {
                Some(c) => Some(c.clone()),
                None => bail!("no RFC connection named '{name}'"),
            },
            None => sole(&registry.rfc),
        };
        let db = match db {
            Some(name) => match registry.find_db(name) {
                Some(c) => Some(c.clone()),
                None => bail!("no database connection named '{name}'"),
            },
            None => sole(&registry.db),
        };

        Ok(Connections { rfc, db })
    }
}

fn sole<T: Clone>(items: &[T]) -> Option<T> {
    match items {
        [only] => Some(only.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"{
        "interfaces": [{
            "id": "i1",
            "name": "customer-sync",
            "steps": [
                { "id": "s1", "type": "rpc", "name": "Read", "referenceId": "f1", "order": 1,
                  "parameters": { "CUST": "C1" } },
                { "id": "s2", "type": "sql", "name": "Orders", "referenceId": "q1", "order": 2,
                  "parameters": { "custId": "1.CUSTOMER_ID" } }
            ]
        }],
        "rpcFunctions": [{ "id": "f1", "name": "Customer", "functionName": "Z_GET_CUSTOMER" }],
        "sqlQueries": [{ "id": "q1", "name": "Orders", "sqlText": "SELECT * FROM orders WHERE cust = :custId" }],
        "connections": {
            "rfc": [{ "name": "dev", "ashost": "sap", "sysnr": "00", "client": "100", "user": "u", "password": "p" }],
            "db": [
                { "name": "dw", "host": "db1", "database": "dw", "user": "u", "password": "p" },
                { "name": "ods", "host": "db2", "database": "ods", "user": "u", "password": "p" }
            ]
        }
    }"#;

    #[test]
    fn parses_all_sections() {
        let bundle = Bundle::parse(BUNDLE).unwrap();
        assert_eq!(bundle.interfaces.len(), 1);
        assert_eq!(bundle.interfaces[0].steps.len(), 2);
        assert!(bundle.catalog.find_rpc("f1").is_some());
        assert!(bundle.catalog.find_sql("q1").is_some());
        assert_eq!(bundle.connections.db.len(), 2);
    }

    #[test]
    fn interface_lookup_by_id_or_name() {
        let bundle = Bundle::parse(BUNDLE).unwrap();
        assert_eq!(bundle.interface("i1").unwrap().name, "customer-sync");
        assert_eq!(bundle.interface("customer-sync").unwrap().id, "i1");
        assert!(bundle.interface("nope").is_err());
    }

    #[test]
    fn sole_connection_is_picked_implicitly() {
        let bundle = Bundle::parse(BUNDLE).unwrap();
        let connections = bundle.select_connections(None, None).unwrap();

        assert_eq!(connections.rfc.map(|c| c.name), Some("dev".to_string()));
        // two databases configured, none chosen
        assert!(connections.db.is_none());
    }

    #[test]
    fn named_connections_must_exist() {
        let bundle = Bundle::parse(BUNDLE).unwrap();
        let connections = bundle.select_connections(None, Some("ods")).unwrap();
        assert_eq!(connections.db.map(|c| c.host), Some("db2".to_string()));

        let err = bundle.select_connections(Some("prod"), None).unwrap_err();
        assert!(err.to_string().contains("prod"));
    }

    #[test]
    fn empty_document_is_an_empty_bundle() {
        let bundle = Bundle::parse("{}").unwrap();
        assert!(bundle.interfaces.is_empty());
        assert!(bundle.catalog.rpc_functions.is_empty());
    }
}
