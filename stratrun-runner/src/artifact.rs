//! Run artifacts: the rendered strategy file a child process is launched on.

use std::io::Write;
use std::path::{Path, PathBuf};

use stratrun_core::DiagnosticSink;
use tempfile::TempPath;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to write artifact in '{dir}': {source}")]
    Write {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact '{0}' does not exist")]
    Missing(PathBuf),
}

/// A file handed to the launcher. Temporary artifacts are deleted when the
/// run releases them (or on drop); caller-owned files are never touched.
#[derive(Debug)]
pub struct RunArtifact {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl RunArtifact {
    /// Write `source` to a uniquely named `stratrun-*.<extension>` file in `dir`.
    pub fn from_source(dir: &Path, extension: &str, source: &str) -> Result<Self, ArtifactError> {
        let write_err = |source| ArtifactError::Write {
            dir: dir.to_path_buf(),
            source,
        };
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension.trim_start_matches('.'))
        };
        let mut file = tempfile::Builder::new()
            .prefix("stratrun-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(write_err)?;
        file.write_all(source.as_bytes()).map_err(write_err)?;
        file.flush().map_err(write_err)?;

        let temp = file.into_temp_path();
        Ok(Self {
            path: temp.to_path_buf(),
            temp: Some(temp),
        })
    }

    /// Wrap a caller-owned file.
    pub fn existing(path: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let path = path.into();
        if !path.is_file() {
            return Err(ArtifactError::Missing(path));
        }
        Ok(Self { path, temp: None })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// Finish with the artifact. A temporary file is deleted unless `keep`
    /// is set; failures go to the sink. Returns the path if the file remains.
    pub fn release(self, keep: bool, sink: &dyn DiagnosticSink) -> Option<PathBuf> {
        let Some(temp) = self.temp else {
            return Some(self.path);
        };
        if keep {
            return match temp.keep() {
                Ok(path) => {
                    sink.info(format!("kept artifact {}", path.display()));
                    Some(path)
                }
                Err(err) => {
                    sink.warn(format!("failed to keep artifact {}: {}", self.path.display(), err.error));
                    None
                }
            };
        }
        match temp.close() {
            Ok(()) => None,
            Err(err) => {
                sink.warn(format!("failed to remove artifact {}: {err}", self.path.display()));
                None
            }
        }
    }
}
