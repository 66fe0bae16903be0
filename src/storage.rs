use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::node::ProxyNode;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS latency_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    node_id TEXT NOT NULL,
    name TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    offline INTEGER NOT NULL,
    checked_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

/// Open (and if needed create) the latency history database.
pub fn open(path: &str) -> Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("cannot open database {path}"))?;
    conn.execute_batch(SCHEMA)
        .context("cannot prepare latency_history table")?;
    Ok(conn)
}

/// Append one probe result. Timestamping is left to sqlite.
pub fn record_probe(conn: &Connection, node: &ProxyNode) -> Result<()> {
    conn.execute(
        "INSERT INTO latency_history (node_id, name, latency_ms, offline) VALUES (?1, ?2, ?3, ?4)",
        params![node.id, node.name, node.latency_ms as i64, node.offline],
    )
    .with_context(|| format!("cannot record probe for node {}", node.id))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probed_node() -> ProxyNode {
        ProxyNode {
            id: "cfg034a29".to_string(),
            name: "HK01".to_string(),
            host: "1.2.3.4".to_string(),
            port: "8388".to_string(),
            latency_ms: 120,
            offline: false,
        }
    }

    #[test]
    fn probes_are_recorded() {
        let conn = open(":memory:").unwrap();
        record_probe(&conn, &probed_node()).unwrap();
        record_probe(&conn, &probed_node()).unwrap();

        let count: i64 = conn
            .query_row("SELECT count(*) FROM latency_history", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let (node_id, latency, offline): (String, i64, bool) = conn
            .query_row(
                "SELECT node_id, latency_ms, offline FROM latency_history LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(node_id, "cfg034a29");
        assert_eq!(latency, 120);
        assert!(!offline);
    }

    #[test]
    fn open_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latency.db");
        let conn = open(path.to_str().unwrap()).unwrap();
        drop(conn);
        assert!(path.exists());
    }
}
