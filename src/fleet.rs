use anyhow::{bail, Context, Result};
use log::warn;
use serde::Deserialize;
use std::fs;
use tokio::process::Command;

/// One server from the inventory file. Field names follow the inventory's
/// JSON convention.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub host_name: String,
    pub port: String,
    pub user_name: String,
    pub identity_file: String,
}

impl HostEntry {
    fn matches_tags(&self, tags: &[&str]) -> bool {
        tags.iter().any(|t| self.tags.iter().any(|own| own == t))
    }

    async fn run(&self, command: &str) -> Result<String> {
        let output = Command::new("ssh")
            .arg("-i")
            .arg(&self.identity_file)
            .arg(format!("{}@{}", self.user_name, self.host_name))
            .arg("-p")
            .arg(&self.port)
            .arg(command)
            .output()
            .await
            .with_context(|| format!("cannot run ssh for {}", self.name))?;

        if !output.status.success() {
            warn!("command failed on {} with {}", self.name, output.status);
        }
        if !output.stderr.is_empty() {
            bail!("{}", String::from_utf8_lossy(&output.stderr).trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Runs a shell command against every inventory host matching the
/// requested tags, over ssh.
pub struct Fleet {
    hosts: Vec<HostEntry>,
}

impl Fleet {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("cannot read inventory {path}"))?;
        let hosts =
            serde_json::from_slice(&raw).with_context(|| format!("cannot parse inventory {path}"))?;
        Ok(Self { hosts })
    }

    /// Execute `command` on every host matching any of `tags`. An empty
    /// tag list matches all hosts. Outputs are collected in inventory
    /// order; a command exiting non-zero is logged and tolerated, while
    /// anything written to stderr aborts the sweep.
    pub async fn execute(&self, command: &str, tags: &[&str]) -> Result<Vec<String>> {
        let mut outputs = Vec::new();
        for host in &self.hosts {
            if !tags.is_empty() && !host.matches_tags(tags) {
                continue;
            }
            outputs.push(host.run(command).await?);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVENTORY: &str = r#"[
        {
            "name": "gateway",
            "tags": ["edge", "prod"],
            "hostName": "10.0.0.1",
            "port": "22",
            "userName": "ops",
            "identityFile": "/home/ops/.ssh/id_ed25519"
        },
        {
            "name": "builder",
            "hostName": "10.0.0.2",
            "port": "2222",
            "userName": "ci",
            "identityFile": "/home/ci/.ssh/id_ed25519"
        }
    ]"#;

    #[test]
    fn inventory_decodes_with_optional_fields() {
        let hosts: Vec<HostEntry> = serde_json::from_str(INVENTORY).unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].name, "gateway");
        assert_eq!(hosts[0].tags, vec!["edge", "prod"]);
        assert_eq!(hosts[1].tags, Vec::<String>::new());
        assert_eq!(hosts[1].port, "2222");
    }

    #[test]
    fn tag_filter_matches_any_overlap() {
        let hosts: Vec<HostEntry> = serde_json::from_str(INVENTORY).unwrap();
        assert!(hosts[0].matches_tags(&["prod"]));
        assert!(hosts[0].matches_tags(&["staging", "edge"]));
        assert!(!hosts[0].matches_tags(&["staging"]));
        assert!(!hosts[1].matches_tags(&["prod"]));
    }

    #[test]
    fn inventory_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        fs::write(&path, INVENTORY).unwrap();
        let fleet = Fleet::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(fleet.hosts.len(), 2);
    }
}
