//! Generation run over the compiled-in field table.

use crate::{
    Error, Result,
    codegen::{self, Options},
    params::{FIELDS, FieldDescriptor, FieldParams},
};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Subdirectory of the output root that receives the generated modules.
pub const OUTPUT_DIR: &str = "intpoly";

/// Inputs of a generation run.
#[derive(Clone, Debug)]
pub struct Config {
    /// File whose contents open every generated module.
    pub header_path: PathBuf,

    /// Directory under which `intpoly/` is created.
    pub output_root: PathBuf,

    /// Routine-size limit, see [`Options::split_threshold`].
    pub split_threshold: Option<usize>,
}

impl Config {
    /// Create a new [`Config`] with the default split threshold.
    pub fn new(header_path: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            header_path: header_path.into(),
            output_root: output_root.into(),
            split_threshold: Options::default().split_threshold,
        }
    }
}

/// Write one module per entry of [`FIELDS`], returning the paths written.
///
/// Stops at the first failure. Files written before it are left in place.
pub fn run(config: &Config) -> Result<Vec<PathBuf>> {
    run_fields(config, FIELDS)
}

/// [`run`] over an explicit list of fields.
pub fn run_fields(config: &Config, fields: &[FieldDescriptor]) -> Result<Vec<PathBuf>> {
    let header = fs::read_to_string(&config.header_path)
        .map_err(|e| Error::io(&config.header_path, e))?;
    let options = Options {
        header,
        split_threshold: config.split_threshold,
        ..Options::default()
    };

    let dir = config.output_root.join(OUTPUT_DIR);
    fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

    let mut written = Vec::with_capacity(fields.len());
    for desc in fields {
        let params = FieldParams::from_descriptor(desc)?;
        let path = dir.join(format!("{}.rs", params.module()));
        write_file(&path, &codegen::generate(&params, &options))?;
        tracing::info!(field = params.name(), path = %path.display(), "wrote module");
        written.push(path);
    }
    Ok(written)
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|e| Error::io(path, e))
}
