// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::guid::Guid;

pub const READ_BIT: u8 = 4;
pub const WRITE_BIT: u8 = 2;
pub const EXECUTE_BIT: u8 = 1;

/// Which permission triplet applies to an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionClass {
    Owner,
    Group,
    Other,
}

/// Unix-like octal permission string, for example `"755"`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permissions([u8; 3]);

impl Permissions {
    pub const fn new(owner: u8, group: u8, other: u8) -> Self {
        Self([owner & 7, group & 7, other & 7])
    }

    pub fn bits(&self, class: PermissionClass) -> u8 {
        match class {
            PermissionClass::Owner => self.0[0],
            PermissionClass::Group => self.0[1],
            PermissionClass::Other => self.0[2],
        }
    }

    pub fn allows(&self, class: PermissionClass, bit: u8) -> bool {
        self.bits(class) & bit == bit
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::new(7, 5, 5)
    }
}

impl FromStr for Permissions {
    type Err = PermissionsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        // Leading zero (e.g. "0644") is tolerated.
        let digits = if value.len() == 4 && value.starts_with('0') {
            &value[1..]
        } else {
            value
        };

        if digits.len() != 3 {
            return Err(PermissionsError::InvalidLength(value.to_string()));
        }

        let mut out = [0u8; 3];
        for (index, c) in digits.chars().enumerate() {
            out[index] = c
                .to_digit(8)
                .ok_or_else(|| PermissionsError::InvalidDigit(value.to_string()))?
                as u8;
        }

        Ok(Self(out))
    }
}

impl TryFrom<String> for Permissions {
    type Error = PermissionsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permissions> for String {
    fn from(value: Permissions) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.0[0], self.0[1], self.0[2])
    }
}

impl fmt::Debug for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Permissions").field(&self.to_string()).finish()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PermissionsError {
    #[error("permission string '{0}' must have three octal digits")]
    InvalidLength(String),

    #[error("permission string '{0}' contains a non-octal digit")]
    InvalidDigit(String),
}

/// Content identity of a file as registered in the catalogue.
///
/// Size and checksum are authoritative once a replica exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIdentity {
    pub guid: Guid,
    pub size: u64,
    /// Hex-encoded MD5 checksum, `None` if it was never computed.
    pub md5: Option<String>,
    pub owner: String,
    pub gowner: String,
    pub perm: Permissions,
    /// Unix timestamp in seconds.
    pub ctime: u64,
    /// Unix timestamp in seconds after which the file must not be read anymore.
    pub expire_time: Option<u64>,
}

impl FileIdentity {
    pub fn new(guid: Guid, size: u64, md5: Option<&str>, owner: &str, gowner: &str) -> Self {
        Self {
            guid,
            size,
            md5: md5.map(|value| value.to_lowercase()),
            owner: owner.to_string(),
            gowner: gowner.to_string(),
            perm: Permissions::default(),
            ctime: 0,
            expire_time: None,
        }
    }

    pub fn with_perm(mut self, perm: Permissions) -> Self {
        self.perm = perm;
        self
    }

    pub fn with_expire_time(mut self, expire_time: u64) -> Self {
        self.expire_time = Some(expire_time);
        self
    }

    pub fn is_expired(&self, now: u64) -> bool {
        matches!(self.expire_time, Some(expire_time) if expire_time <= now)
    }

    /// Returns `true` if the checksum is set and looks like a hex-encoded MD5 digest.
    pub fn has_valid_md5(&self) -> bool {
        match &self.md5 {
            Some(md5) => md5.len() == 32 && hex::decode(md5).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::guid::Guid;

    use super::{FileIdentity, PermissionClass, Permissions, PermissionsError, READ_BIT, WRITE_BIT};

    #[test]
    fn parse_permissions() {
        let perm: Permissions = "640".parse().unwrap();
        assert!(perm.allows(PermissionClass::Owner, READ_BIT | WRITE_BIT));
        assert!(perm.allows(PermissionClass::Group, READ_BIT));
        assert!(!perm.allows(PermissionClass::Group, WRITE_BIT));
        assert!(!perm.allows(PermissionClass::Other, READ_BIT));
        assert_eq!(perm.to_string(), "640");

        assert_eq!("0755".parse::<Permissions>().unwrap().to_string(), "755");
    }

    #[test]
    fn invalid_permissions() {
        assert!(matches!(
            "64".parse::<Permissions>(),
            Err(PermissionsError::InvalidLength(_))
        ));
        assert!(matches!(
            "689".parse::<Permissions>(),
            Err(PermissionsError::InvalidDigit(_))
        ));
    }

    #[test]
    fn expiry() {
        let file = FileIdentity::new(Guid::new(), 10, None, "alice", "alice").with_expire_time(100);
        assert!(!file.is_expired(99));
        assert!(file.is_expired(100));
    }

    #[test]
    fn md5_validation() {
        let file = FileIdentity::new(
            Guid::new(),
            10,
            Some("D41D8CD98F00B204E9800998ECF8427E"),
            "alice",
            "alice",
        );
        assert_eq!(file.md5.as_deref(), Some("d41d8cd98f00b204e9800998ecf8427e"));
        assert!(file.has_valid_md5());

        let file = FileIdentity::new(Guid::new(), 10, Some("abc123"), "alice", "alice");
        assert!(!file.has_valid_md5());
    }
}
