use crate::cluster::Dfs;
use crate::error::{ClientError, Result};
use std::io::Write;
use std::path::Path;
use taskprobe_core::{constants::files, errors::ConfigError};

pub const INPUT_CORPUS: &str = "every attempt writes scratch files under the node local roots\n\
killed and failed attempts must leave nothing behind\n";

/// Clears the job's input and output directories, then writes a fresh
/// world-writable input directory holding `repeat` copies of the corpus.
pub fn prepare_text_input(
    dfs: &dyn Dfs,
    input_dir: &Path,
    output_dir: &Path,
    repeat: u64,
) -> Result<()> {
    dfs.delete(input_dir, true)?;
    dfs.delete(output_dir, true)?;

    if !dfs.mkdirs(input_dir)? {
        return Err(ClientError::Config(ConfigError::General(format!(
            "Failed to create the input directory: {}",
            input_dir.display()
        ))));
    }
    dfs.set_permission(input_dir, 0o777)?;

    let data_path = input_dir.join(files::INPUT_DATA);
    let mut file = dfs.create(&data_path)?;
    for _ in 0..repeat {
        file.write_all(INPUT_CORPUS.as_bytes())
            .map_err(|e| ClientError::Config(ConfigError::Io(e)))?;
    }
    file.flush()
        .map_err(|e| ClientError::Config(ConfigError::Io(e)))?;

    tracing::info!(
        "Prepared input {} ({} copies of the corpus)",
        data_path.display(),
        repeat
    );
    Ok(())
}
