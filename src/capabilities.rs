use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

// WebDAV entry points by protocol generation. Servers advertising OAuth2 or
// SAML SSO get dedicated endpoints regardless of version.
pub const WEBDAV_PATH_1_2: &str = "/webdav/tkjcloud.php";
pub const WEBDAV_PATH_2_0: &str = "/files/webdav.php";
pub const WEBDAV_PATH_4_0: &str = "/remote.php/webdav";
pub const WEBDAV_PATH_9_0: &str = "/remote.php/dav";
pub const ODAV_PATH: &str = "/remote.php/odav";
const SAML_SSO_PATH: &str = "/remote.php/webdav";

pub const STATUS_PATH: &str = "/status.php";

/// Parsed server version, ordered by (major, minor, micro).
///
/// Version strings come from the account store and may be missing or
/// garbled; both cases fall back to [`ServerVersion::MINIMUM_SUPPORTED`]
/// rather than failing, so capability checks always have a version to work
/// with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

impl ServerVersion {
    /// Oldest server generation the library still talks to.
    pub const MINIMUM_SUPPORTED: ServerVersion = ServerVersion::new(10, 0, 0);

    const VERSION_8_1: ServerVersion = ServerVersion::new(8, 1, 0);
    const VERSION_11: ServerVersion = ServerVersion::new(11, 0, 0);

    const VERSION_1_2: ServerVersion = ServerVersion::new(1, 2, 0);
    const VERSION_2: ServerVersion = ServerVersion::new(2, 0, 0);
    const VERSION_4: ServerVersion = ServerVersion::new(4, 0, 0);
    const VERSION_9: ServerVersion = ServerVersion::new(9, 0, 0);

    pub const fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
        }
    }

    /// Parses `"major.minor.micro"`; missing trailing components default to
    /// zero, anything unparsable yields `None`.
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = version.trim().splitn(3, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        let micro = match parts.next() {
            // Builds like "10.0.2.1" or "9.1.0beta" are not expected from
            // the status endpoint; treat them as unparsable.
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        Some(Self::new(major, minor, micro))
    }

    /// Parses a stored version string, falling back to the minimum
    /// supported version when the string is absent or malformed.
    pub fn parse_or_minimum(version: Option<&str>) -> Self {
        version
            .and_then(Self::parse)
            .unwrap_or(Self::MINIMUM_SUPPORTED)
    }

    /// Servers older than 8.1 reject a reserved character set in file and
    /// folder names; newer ones accept everything but the path separator.
    pub fn has_forbidden_filename_chars(&self) -> bool {
        *self < Self::VERSION_8_1
    }

    /// Whether the server expects credentials on the first request instead
    /// of answering a challenge. Drives session-strategy dispatch.
    pub fn prefers_preemptive_auth(&self) -> bool {
        *self >= Self::VERSION_11
    }
}

impl PartialOrd for ServerVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServerVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.micro).cmp(&(other.major, other.minor, other.micro))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

/// Resolves the WebDAV entry path for a server.
///
/// OAuth2 support wins outright; SAML SSO wins next; otherwise the highest
/// version tier at or below the server version applies. Versions below the
/// oldest tier have no known endpoint.
pub fn resolve_webdav_path(
    version: ServerVersion,
    supports_oauth2: bool,
    supports_saml_sso: bool,
) -> Option<&'static str> {
    if supports_oauth2 {
        return Some(ODAV_PATH);
    }
    if supports_saml_sso {
        return Some(SAML_SSO_PATH);
    }

    if version >= ServerVersion::VERSION_9 {
        Some(WEBDAV_PATH_9_0)
    } else if version >= ServerVersion::VERSION_4 {
        Some(WEBDAV_PATH_4_0)
    } else if version >= ServerVersion::VERSION_2 {
        Some(WEBDAV_PATH_2_0)
    } else if version >= ServerVersion::VERSION_1_2 {
        Some(WEBDAV_PATH_1_2)
    } else {
        None
    }
}
