use std::fs;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CollabFuture, Inpainter};
use crate::error::CoreError;

/// Runs an external inpainting model over the whole batch directory.
///
/// `{indir}` and `{outdir}` in the arguments are replaced with the input and
/// output directories.
#[derive(Debug, Clone)]
pub struct CommandInpainter {
    program: String,
    args: Vec<String>,
}

impl CommandInpainter {
    /// `None` when `command` is empty.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn expand_args(&self, input_dir: &Path, output_dir: &Path) -> Vec<String> {
        let indir = input_dir.display().to_string();
        let outdir = output_dir.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{indir}", &indir).replace("{outdir}", &outdir))
            .collect()
    }
}

impl Inpainter for CommandInpainter {
    fn inpaint<'a>(&'a self, input_dir: &'a Path, output_dir: &'a Path) -> CollabFuture<'a, ()> {
        Box::pin(async move {
            fs::create_dir_all(output_dir).map_err(CoreError::collaborator)?;
            let args = self.expand_args(input_dir, output_dir);
            debug!("running inpainter: {} {}", self.program, args.join(" "));
            let output = Command::new(&self.program)
                .args(&args)
                .output()
                .await
                .map_err(|err| {
                    CoreError::collaborator(format!("failed to run {}: {}", self.program, err))
                })?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(CoreError::collaborator(format!(
                    "{} failed: {}",
                    self.program,
                    stderr.trim()
                )));
            }
            Ok(())
        })
    }
}

/// Passes source images through untouched, under the inpainter's output names.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyInpainter;

impl Inpainter for CopyInpainter {
    fn inpaint<'a>(&'a self, input_dir: &'a Path, output_dir: &'a Path) -> CollabFuture<'a, ()> {
        Box::pin(async move {
            warn!("no inpainting command configured; text will be drawn over the source pages");
            copy_sources(input_dir, output_dir).map_err(CoreError::collaborator)
        })
    }
}

fn copy_sources(input_dir: &Path, output_dir: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(input_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let source = entry.path().join(format!("{}.png", name));
        if !source.is_file() {
            continue;
        }
        let target_dir = output_dir.join(&name);
        fs::create_dir_all(&target_dir)?;
        fs::copy(&source, target_dir.join(format!("{}_mask.png", name)))?;
    }
    Ok(())
}
