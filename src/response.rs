//! Response envelope shared by every command:
//! `{"success": true, "data": ...}` or `{"success": false, "message": "..."}`.

use crate::error::{EngineError, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
pub struct Response<T: Serialize> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Response<T> {
    pub fn ok(data: T) -> Self {
        Response {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Response {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }

    /// Writes the envelope as a single JSON line.
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}

impl Response<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Response {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

impl From<&EngineError> for Response<()> {
    fn from(err: &EngineError) -> Self {
        Response::failure(err.to_string())
    }
}

/// Writes `rows` as CSV with a header taken from the row type.
pub fn write_csv_rows<W: Write, T: Serialize>(rows: &[T], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
