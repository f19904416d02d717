//! Command implementations for each file format

pub mod mdl;
pub mod vtx;
pub mod vvd;

use anyhow::Result;

/// Print any serializable value as pretty JSON
#[cfg(feature = "json")]
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(not(feature = "json"))]
pub fn print_json<T: ?Sized>(_value: &T) -> Result<()> {
    anyhow::bail!("studio-rs was built without the `json` feature")
}
