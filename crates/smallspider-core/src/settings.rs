//! Application settings.
//!
//! [`Settings`] holds everything the binary needs to boot: logging, the bind
//! address, how the admin site presents itself, the accounts to seed and an
//! optional fixture file. Every field has a default so a missing config file
//! still produces a runnable server.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Presentation and routing options for the admin site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSettings {
    /// The URL namespace used when reversing names (`namespace:app_model_change`).
    pub namespace: String,
    /// Path prefix the admin router is mounted under.
    pub url_prefix: String,
    /// Text shown at the top of every admin page.
    pub site_header: String,
    /// Text used in the browser title.
    pub site_title: String,
    /// Heading of the admin index.
    pub index_title: String,
    /// Default page size for change lists.
    pub list_per_page: usize,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            namespace: "cus_admin".to_string(),
            url_prefix: "/admin".to_string(),
            site_header: "SmallSpider".to_string(),
            site_title: "SmallSpider管理后台".to_string(),
            index_title: "首页".to_string(),
            list_per_page: 100,
        }
    }
}

/// An account created at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSeed {
    /// Login name.
    pub username: String,
    /// Plain-text password, hashed before it is stored.
    pub password: String,
    /// Whether the account may use the admin.
    #[serde(default = "default_true")]
    pub is_staff: bool,
    /// Whether the account bypasses permission checks.
    #[serde(default)]
    pub is_superuser: bool,
}

const fn default_true() -> bool {
    true
}

/// The complete set of application settings.
///
/// # Examples
///
/// ```
/// use smallspider_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.admin.namespace, "cus_admin");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The tracing filter directive (e.g. "info", "smallspider_admin=debug").
    pub log_level: String,
    /// The socket address the HTTP server binds to.
    pub bind_addr: String,
    /// Admin site options.
    pub admin: AdminSettings,
    /// Accounts created at startup.
    pub users: Vec<UserSeed>,
    /// Optional JSON fixture loaded into the store at startup.
    pub fixture: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            bind_addr: "127.0.0.1:8000".to_string(),
            admin: AdminSettings::default(),
            users: Vec::new(),
            fixture: None,
        }
    }
}

impl Settings {
    /// Parses [`bind_addr`](Self::bind_addr) into a socket address.
    pub fn socket_addr(&self) -> crate::SpiderResult<SocketAddr> {
        self.bind_addr.parse().map_err(|e| {
            crate::SpiderError::Configuration(format!(
                "invalid bind_addr '{}': {e}",
                self.bind_addr
            ))
        })
    }
}
