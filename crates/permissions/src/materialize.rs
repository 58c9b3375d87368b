//! Turning engine rows into permission values.

use crate::error::{translate, translate_row_access, Error, Result};
use crate::value::{AccessLevel, PermissionValue};
use grantview_core::schema::Table;
use grantview_core::{Row, Value};
use grantview_engine::ResultHandle;

/// Column positions of the permission attributes in a result schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Materializer {
    path: usize,
    user_id: usize,
    access_level: usize,
    updated_at: usize,
}

impl Materializer {
    /// Locates the permission columns in `schema`.
    pub fn for_schema(schema: &Table) -> Result<Self> {
        let index = |name: &str| {
            schema
                .require_column(name)
                .map(|column| column.index())
                .map_err(translate)
        };
        Ok(Self {
            path: index("path")?,
            user_id: index("userId")?,
            access_level: index("accessLevel")?,
            updated_at: index("updatedAt")?,
        })
    }

    /// Reads the row at `index` and builds its value.
    pub fn materialize(&self, handle: &dyn ResultHandle, index: usize) -> Result<PermissionValue> {
        let row = handle.row_at(index).map_err(translate_row_access)?;
        self.from_row(&row)
    }

    /// Builds a value from a row. Fails rather than defaulting a cell.
    pub fn from_row(&self, row: &Row) -> Result<PermissionValue> {
        let path = string_cell(row, self.path, "path")?;
        let user_id = string_cell(row, self.user_id, "userId")?;
        let raw_level = row
            .get(self.access_level)
            .and_then(|cell| {
                cell.as_i32()
                    .or_else(|| cell.as_i64().map(|raw| i32::try_from(raw).unwrap_or(-1)))
            })
            .ok_or_else(|| bad_cell(row, "accessLevel"))?;
        let access_level = AccessLevel::from_i32(raw_level).ok_or_else(|| {
            Error::generic(format!(
                "Row {} has unknown access level {}",
                row.id(),
                raw_level
            ))
        })?;
        let updated_at = row
            .get(self.updated_at)
            .and_then(|cell| cell.as_datetime().or_else(|| cell.as_i64()))
            .ok_or_else(|| bad_cell(row, "updatedAt"))?;
        Ok(PermissionValue::new(path, user_id, access_level, updated_at))
    }
}

fn string_cell(row: &Row, index: usize, name: &str) -> Result<String> {
    row.get(index)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| bad_cell(row, name))
}

fn bad_cell(row: &Row, name: &str) -> Error {
    Error::generic(format!("Row {} has no valid {}", row.id(), name))
}

/// Materializes the element at `index` of `handle`.
///
/// Resolves the column layout on every call; views cache a [`Materializer`]
/// instead.
pub fn materialize(handle: &dyn ResultHandle, index: usize) -> Result<PermissionValue> {
    Materializer::for_schema(&handle.schema())?.materialize(handle, index)
}
