//! Diagnostic messages produced by configuration checks.
//!
//! Checks never fail hard; they return [`CheckMessage`]s which the caller
//! prints and, when any is serious, turns into a non-zero exit.

use std::fmt;

use crate::settings::Settings;

/// Severity level for a check message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckLevel {
    /// Informational message.
    Info = 1,
    /// A potential problem.
    Warning = 2,
    /// A definite problem that should be fixed.
    Error = 3,
}

impl fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// A diagnostic message produced by a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckMessage {
    /// The severity level.
    pub level: CheckLevel,
    /// The human-readable message describing the issue.
    pub msg: String,
    /// An optional hint on how to fix the issue.
    pub hint: Option<String>,
    /// The object (model admin, setting) the issue relates to.
    pub obj: Option<String>,
    /// A unique identifier for this check message (e.g. "admin.E108").
    pub id: Option<String>,
}

impl CheckMessage {
    /// Creates a new `CheckMessage`.
    pub fn new(
        level: CheckLevel,
        msg: impl Into<String>,
        hint: Option<&str>,
        obj: Option<&str>,
        id: Option<&str>,
    ) -> Self {
        Self {
            level,
            msg: msg.into(),
            hint: hint.map(String::from),
            obj: obj.map(String::from),
            id: id.map(String::from),
        }
    }

    /// Creates a warning-level message.
    pub fn warning(msg: impl Into<String>, obj: Option<&str>, id: Option<&str>) -> Self {
        Self::new(CheckLevel::Warning, msg, None, obj, id)
    }

    /// Creates an error-level message.
    pub fn error(msg: impl Into<String>, obj: Option<&str>, id: Option<&str>) -> Self {
        Self::new(CheckLevel::Error, msg, None, obj, id)
    }

    /// Attaches a hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Returns `true` if this is an error.
    pub fn is_serious(&self) -> bool {
        self.level >= CheckLevel::Error
    }
}

impl fmt::Display for CheckMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref obj) = self.obj {
            write!(f, "{obj}: ")?;
        }
        if let Some(ref id) = self.id {
            write!(f, "({id}) ")?;
        }
        write!(f, "{}: {}", self.level, self.msg)?;
        if let Some(ref hint) = self.hint {
            write!(f, "\n\tHINT: {hint}")?;
        }
        Ok(())
    }
}

/// Checks the settings the server is about to boot with.
pub fn check_settings(settings: &Settings) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    if let Err(e) = settings.socket_addr() {
        messages.push(CheckMessage::error(e.to_string(), Some("bind_addr"), Some("settings.E001")));
    }

    if !settings.admin.url_prefix.starts_with('/') {
        messages.push(
            CheckMessage::error(
                format!("The admin URL prefix '{}' is not absolute.", settings.admin.url_prefix),
                Some("admin.url_prefix"),
                Some("settings.E002"),
            )
            .with_hint("Start the prefix with '/', e.g. '/admin'."),
        );
    }

    if settings.admin.list_per_page == 0 {
        messages.push(CheckMessage::error(
            "list_per_page must be at least 1.",
            Some("admin.list_per_page"),
            Some("settings.E003"),
        ));
    }

    if settings.admin.namespace.is_empty() || settings.admin.namespace.contains(':') {
        messages.push(CheckMessage::error(
            format!("'{}' is not a valid URL namespace.", settings.admin.namespace),
            Some("admin.namespace"),
            Some("settings.E004"),
        ));
    }

    if !settings.users.iter().any(|u| u.is_staff) {
        messages.push(
            CheckMessage::warning(
                "No staff account is seeded.",
                Some("users"),
                Some("settings.W001"),
            )
            .with_hint("Add a [[users]] entry so someone can log in to the admin."),
        );
    }

    for user in settings.users.iter().filter(|u| u.password.is_empty()) {
        messages.push(CheckMessage::warning(
            format!("User '{}' has an empty password.", user.username),
            Some("users"),
            Some("settings.W002"),
        ));
    }

    messages
}
