//! Session origin derivation and device description.

use std::fmt;

use serde::Serialize;

use crate::hash;

/// Derived identity of one browser on one machine for one user.
///
/// The key digests (user, remote address, user agent); the same user in the
/// same browser on the same machine always lands on the same key, and any
/// other browser or machine lands elsewhere. The raw values ride along so a
/// stored record can describe itself when a conflict has to be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    key: String,
    remote_addr: String,
    user_agent: String,
}

impl Origin {
    /// Derive the origin of a request.
    pub fn derive(user_id: &str, remote_addr: &str, user_agent: &str) -> Self {
        Self {
            key: hash::digest_parts([user_id, remote_addr, user_agent]),
            remote_addr: remote_addr.to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    /// The derived session key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Parsed user-agent summary for human-readable session messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub browser: &'static str,
    pub os: &'static str,
    pub device: &'static str,
}

impl fmt::Display for DeviceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} ({})", self.browser, self.os, self.device)
    }
}

/// Describe a user agent string as browser, OS, and device class.
///
/// Token order matters: Edge and Opera advertise "Chrome", Chrome
/// advertises "Safari", iOS advertises "Mac OS X", Android advertises
/// "Linux". The more specific token is tested first in each table.
pub fn describe_user_agent(user_agent: &str) -> DeviceSummary {
    let ua = user_agent.to_lowercase();

    let browser = if ua.contains("edg/") || ua.contains("edge/") {
        "Edge"
    } else if ua.contains("opr/") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("firefox/") || ua.contains("fxios/") {
        "Firefox"
    } else if ua.contains("chrome/") || ua.contains("crios/") {
        "Chrome"
    } else if ua.contains("safari/") {
        "Safari"
    } else {
        "an unrecognized browser"
    };

    let os = if ua.contains("windows") {
        "Windows"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ios") {
        "iOS"
    } else if ua.contains("mac os") || ua.contains("macintosh") {
        "macOS"
    } else if ua.contains("linux") || ua.contains("x11") {
        "Linux"
    } else {
        "an unrecognized OS"
    };

    let device = if ua.contains("ipad") || ua.contains("tablet") {
        "tablet"
    } else if ua.contains("android") && !ua.contains("mobile") {
        // Android tablets drop the Mobile token
        "tablet"
    } else if ua.contains("mobile") || ua.contains("iphone") {
        "mobile"
    } else {
        "desktop"
    };

    DeviceSummary {
        browser,
        os,
        device,
    }
}
