//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::{Deserialize, Serialize};

/// An application name: the four-tuple that identifies an application
/// instance within a DIF (process name, process instance, entity name,
/// entity instance).
///
/// Only `apn` is mandatory; the other three components are optional and
/// compare/hash as empty strings when absent, matching how the RIB and
/// DFT treat a bare process name as addressing "any instance".
#[derive(
    Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
pub struct ApplicationName {
    pub apn: String,
    pub api: String,
    pub aen: String,
    pub aei: String,
}

impl ApplicationName {
    pub fn new(
        apn: impl Into<String>,
        api: impl Into<String>,
        aen: impl Into<String>,
        aei: impl Into<String>,
    ) -> ApplicationName {
        ApplicationName {
            apn: apn.into(),
            api: api.into(),
            aen: aen.into(),
            aei: aei.into(),
        }
    }

    pub fn apn(apn: impl Into<String>) -> ApplicationName {
        ApplicationName::new(apn, "", "", "")
    }

    /// Renders the canonical `apn|api|aen|aei` form used on the wire and in
    /// the admin socket and persistent-state protocols. Pipe characters and
    /// backslashes within a component are backslash-escaped so the format
    /// round-trips through [`ApplicationName::from_canonical_string`].
    pub fn to_canonical_string(&self) -> String {
        [&self.apn, &self.api, &self.aen, &self.aei]
            .iter()
            .map(|s| escape(s))
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn from_canonical_string(s: &str) -> Result<ApplicationName, NameError> {
        let fields = split_unescaped(s);
        if fields.len() != 4 {
            return Err(NameError::WrongFieldCount(fields.len()));
        }
        Ok(ApplicationName {
            apn: fields[0].clone(),
            api: fields[1].clone(),
            aen: fields[2].clone(),
            aei: fields[3].clone(),
        })
    }
}

impl std::fmt::Display for ApplicationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameError {
    WrongFieldCount(usize),
}

impl std::fmt::Display for NameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameError::WrongFieldCount(n) => {
                write!(f, "expected 4 '|'-separated fields, found {n}")
            }
        }
    }
}

impl std::error::Error for NameError {}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '|' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn split_unescaped(s: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '|' => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_canonical_string() {
        let name = ApplicationName::new("rina.apps.echo", "1", "mgmt", "");
        let encoded = name.to_canonical_string();
        let decoded = ApplicationName::from_canonical_string(&encoded).unwrap();
        assert_eq!(name, decoded);
    }

    #[test]
    fn round_trips_with_pipe_in_component() {
        let name = ApplicationName::new("weird|name", "a\\b", "", "");
        let encoded = name.to_canonical_string();
        let decoded = ApplicationName::from_canonical_string(&encoded).unwrap();
        assert_eq!(name, decoded);
    }

    #[test]
    fn bare_apn_fills_empty_components() {
        let name = ApplicationName::apn("rina.apps.echo");
        assert_eq!(name.api, "");
        assert_eq!(name.aen, "");
        assert_eq!(name.aei, "");
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        assert!(ApplicationName::from_canonical_string("a|b|c").is_err());
    }
}
