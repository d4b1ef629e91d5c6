//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::io::Write;
use std::path::Path;

use crate::name::ApplicationName;

/// One line of the persistent registration-state file: the DIF an IPC
/// Process is a member of, its kernel-assigned IPCP id, and its name.
///
/// The on-disk format is plain text, one record per line:
/// `<dif_name> <ipcp_id> <ipcp_name>`, where `<ipcp_name>` is the
/// application name's canonical `|`-separated encoding (so it can itself
/// contain spaces without ambiguity). This intentionally avoids a KV-store
/// dependency: the format is flat and line-oriented by design.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PersistedIpcp {
    pub dif_name: String,
    pub ipcp_id: u16,
    pub ipcp_name: ApplicationName,
}

#[derive(Debug)]
pub enum PersistError {
    Io(std::io::Error),
    MalformedLine(usize, String),
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistError::Io(error) => write!(f, "I/O error: {error}"),
            PersistError::MalformedLine(lineno, line) => {
                write!(f, "malformed entry at line {lineno}: {line:?}")
            }
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Io(error) => Some(error),
            PersistError::MalformedLine(..) => None,
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(error: std::io::Error) -> PersistError {
        PersistError::Io(error)
    }
}

/// Loads the persistent state file, returning an empty list if it doesn't
/// exist yet (first boot).
pub fn load(path: &Path) -> Result<Vec<PersistedIpcp>, PersistError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.splitn(3, ' ');
        let (Some(dif_name), Some(ipcp_id), Some(ipcp_name)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(PersistError::MalformedLine(
                lineno + 1,
                line.to_owned(),
            ));
        };
        let ipcp_id = ipcp_id.parse::<u16>().map_err(|_| {
            PersistError::MalformedLine(lineno + 1, line.to_owned())
        })?;
        let ipcp_name = ApplicationName::from_canonical_string(ipcp_name)
            .map_err(|_| {
                PersistError::MalformedLine(lineno + 1, line.to_owned())
            })?;
        entries.push(PersistedIpcp {
            dif_name: dif_name.to_owned(),
            ipcp_id,
            ipcp_name,
        });
    }
    Ok(entries)
}

/// Atomically rewrites the persistent state file (write to a temp file in
/// the same directory, then rename over the original).
pub fn save(
    path: &Path,
    entries: &[PersistedIpcp],
) -> Result<(), PersistError> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        for entry in entries {
            writeln!(
                file,
                "{} {} {}",
                entry.dif_name,
                entry.ipcp_id,
                entry.ipcp_name.to_canonical_string()
            )?;
        }
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_file() {
        let dir = std::env::temp_dir().join(format!(
            "rina-persist-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state");

        let entries = vec![
            PersistedIpcp {
                dif_name: "normal.dif".to_owned(),
                ipcp_id: 1,
                ipcp_name: ApplicationName::apn("rina.apps.echo"),
            },
            PersistedIpcp {
                dif_name: "shim.dif".to_owned(),
                ipcp_id: 2,
                ipcp_name: ApplicationName::new("rina.apps.echo", "1", "", ""),
            },
        ];
        save(&path, &entries).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(entries, loaded);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let path = Path::new("/nonexistent/rina-state-file-does-not-exist");
        assert_eq!(load(path).unwrap(), Vec::new());
    }
}
