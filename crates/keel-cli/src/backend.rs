//! Container backend driving the `docker` command line (or a compatible one
//! such as `podman`).

use std::{
    ffi::OsStr,
    io::Write,
    path::Path,
    process::{Command, Output, Stdio},
};

use keel_registry::{BackendError, CompilerBackend};
use tracing::{debug, trace};

/// Images built from a context directory copy it verbatim onto an empty root.
const SCRATCH_DOCKERFILE: &str = "FROM scratch\nCOPY . /\n";

pub struct DockerBackend {
    binary: String,
}

impl DockerBackend {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.binary);
        command.args(args);
        trace!(command = ?command, "running container command");
        command
    }

    fn run(
        &self,
        operation: &'static str,
        image: &str,
        mut command: Command,
        stdin: Option<&str>,
    ) -> Result<Output, BackendError> {
        let io_error = |source| {
            BackendError::Io {
                action: format!("running {} to {operation} {image}", self.binary),
                source,
            }
        };

        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        if stdin.is_some() {
            command.stdin(Stdio::piped());
        }
        let mut child = command.spawn().map_err(io_error)?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).map_err(io_error)?;
        }
        let output = child.wait_with_output().map_err(io_error)?;

        if !output.status.success() {
            return Err(BackendError::Failed {
                operation,
                image: image.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl CompilerBackend for DockerBackend {
    fn image_available(&self, image: &str) -> bool {
        let available = self
            .command(["manifest", "inspect", image])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success());
        debug!(image, available, "checked image availability");
        available
    }

    fn build_image(&self, image: &str, context_dir: &Path) -> Result<(), BackendError> {
        let mut command = self.command(["build", "--quiet", "--tag", image, "--file", "-"]);
        command.arg(context_dir);
        self.run("build", image, command, Some(SCRATCH_DOCKERFILE))?;
        Ok(())
    }

    fn push(&self, image: &str) -> Result<(), BackendError> {
        self.run("push", image, self.command(["push", image]), None)?;
        Ok(())
    }

    fn download_image(&self, image: &str) -> Result<(), BackendError> {
        self.run("pull", image, self.command(["pull", image]), None)?;
        Ok(())
    }

    fn extract_rootfs(&self, image: &str, destination: &Path) -> Result<(), BackendError> {
        // Scratch images have no entrypoint, any command will do for `create`.
        let output = self.run(
            "extract",
            image,
            self.command(["create", image, "keel"]),
            None,
        )?;
        let container = String::from_utf8_lossy(&output.stdout).trim().to_string();

        let mut copy = self.command(["cp"]);
        copy.arg(format!("{container}:/."))
            .arg(destination);
        let copied = self.run("extract", image, copy, None);

        let removed = self.run("extract", image, self.command(["rm", container.as_str()]), None);
        copied?;
        removed?;
        Ok(())
    }
}
