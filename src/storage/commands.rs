use crate::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Write one command per line, UTF-8, `\n` terminated. Nothing is run.
pub fn write_commands(path: &Path, commands: &[String]) -> Result<(), Error> {
    let mut out = BufWriter::new(File::create(path)?);
    for command in commands {
        out.write_all(command.as_bytes())?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    info!("{} commands written to: {}", commands.len(), path.display());
    Ok(())
}
