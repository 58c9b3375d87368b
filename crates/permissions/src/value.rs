//! Permission values and the table layout they are stored in.

use core::fmt;
use grantview_core::schema::{Column, Table};
use grantview_core::{DataType, Value};

/// Table name of the permission table.
pub const PERMISSION_TABLE: &str = "permission";

/// Builds the schema of the permission table.
///
/// Column names double as the sort key paths, see [`SortKey`](crate::SortKey).
pub fn permission_table() -> Table {
    Table::new(
        PERMISSION_TABLE,
        vec![
            Column::new("path", DataType::String),
            Column::new("userId", DataType::String),
            Column::new("accessLevel", DataType::Int32),
            Column::new("updatedAt", DataType::DateTime),
        ],
    )
}

/// Access a user has been granted to a path.
///
/// Levels are ordered: each one implies every lower one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AccessLevel {
    #[default]
    None,
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    /// Decodes the stored representation.
    pub fn from_i32(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(AccessLevel::None),
            1 => Some(AccessLevel::Read),
            2 => Some(AccessLevel::Write),
            3 => Some(AccessLevel::Admin),
            _ => None,
        }
    }

    /// Returns the stored representation.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            AccessLevel::None => "none",
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Admin => "admin",
        }
    }

    #[inline]
    pub fn may_read(self) -> bool {
        self >= AccessLevel::Read
    }

    #[inline]
    pub fn may_write(self) -> bool {
        self >= AccessLevel::Write
    }

    /// Whether the holder may change other users' permissions.
    #[inline]
    pub fn may_manage(self) -> bool {
        self >= AccessLevel::Admin
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One permission: the access a user has to a path.
///
/// Values are built fresh on every read and compare structurally.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PermissionValue {
    path: String,
    user_id: String,
    access_level: AccessLevel,
    /// Milliseconds since the Unix epoch
    updated_at: i64,
}

impl PermissionValue {
    pub fn new(
        path: impl Into<String>,
        user_id: impl Into<String>,
        access_level: AccessLevel,
        updated_at: i64,
    ) -> Self {
        Self {
            path: path.into(),
            user_id: user_id.into(),
            access_level,
            updated_at,
        }
    }

    /// Server path of the realm the permission applies to.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Identity of the user the permission applies to.
    #[inline]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[inline]
    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    /// Last update time, in milliseconds since the Unix epoch.
    #[inline]
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn may_read(&self) -> bool {
        self.access_level.may_read()
    }

    pub fn may_write(&self) -> bool {
        self.access_level.may_write()
    }

    pub fn may_manage(&self) -> bool {
        self.access_level.may_manage()
    }

    /// Row values in [`permission_table`] column order.
    pub fn to_values(&self) -> Vec<Value> {
        vec![
            Value::String(self.path.clone()),
            Value::String(self.user_id.clone()),
            Value::Int32(self.access_level.as_i32()),
            Value::DateTime(self.updated_at),
        ]
    }
}

impl fmt::Display for PermissionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Permission {{ path: {:?}, userId: {:?}, accessLevel: {}, updatedAt: {} }}",
            self.path, self.user_id, self.access_level, self.updated_at
        )
    }
}
