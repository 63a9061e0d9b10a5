use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use rupa_core::config::ToolPaths;
use rupa_core::error::{RupaError, RupaResult};
use rupa_core::transform::Action;
use tokio::process::Command;

/// Upper bound for a single external tool run.
const TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// One external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<OsString>,
    /// Non-zero exit code that still counts as success (qpdf warnings).
    pub warning_code: Option<i32>,
}

impl ToolInvocation {
    fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            warning_code: None,
        }
    }

    fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn path(self, path: &Path) -> Self {
        self.arg(path.as_os_str().to_owned())
    }
}

pub fn action_invocation(
    tools: &ToolPaths,
    action: Action,
    input: &Path,
    output: &Path,
) -> ToolInvocation {
    match action {
        Action::ToJpg | Action::ToPng | Action::ToWebp => {
            ToolInvocation::new(&tools.magick).path(input).path(output)
        }
        Action::CompressImage => ToolInvocation::new(&tools.magick)
            .path(input)
            .arg("-resize")
            .arg("70%")
            .arg("-quality")
            .arg("15")
            .path(output),
        Action::CompressPdf => {
            let mut out_flag = OsString::from("-sOutputFile=");
            out_flag.push(output.as_os_str());
            ToolInvocation::new(&tools.ghostscript)
                .arg("-sDEVICE=pdfwrite")
                .arg("-dCompatibilityLevel=1.4")
                .arg("-dPDFSETTINGS=/ebook")
                .arg("-dNOPAUSE")
                .arg("-dQUIET")
                .arg("-dBATCH")
                .arg(out_flag)
                .path(input)
        }
        Action::ExtractAudio => ToolInvocation::new(&tools.ffmpeg)
            .arg("-y")
            .arg("-i")
            .path(input)
            .arg("-vn")
            .arg("-acodec")
            .arg("libmp3lame")
            .arg("-q:a")
            .arg("2")
            .path(output),
        Action::Zip => ToolInvocation::new(&tools.zip)
            .arg("-j")
            .arg("-q")
            .path(output)
            .path(input),
    }
}

/// Concatenates `inputs` into `output` in the given order.
pub fn merge_invocation(tools: &ToolPaths, inputs: &[impl AsRef<Path>], output: &Path) -> ToolInvocation {
    let mut invocation = ToolInvocation::new(&tools.qpdf).arg("--empty").arg("--pages");
    for input in inputs {
        invocation = invocation.path(input.as_ref());
    }
    let mut invocation = invocation.arg("--").path(output);
    invocation.warning_code = Some(3);
    invocation
}

pub async fn run_tool(invocation: &ToolInvocation) -> RupaResult<()> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(TOOL_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(RupaError::TransformFailed(format!(
                "failed to run {}: {}",
                invocation.program, e
            )));
        }
        Err(_) => {
            return Err(RupaError::TransformFailed(format!(
                "{} timed out after {:?}",
                invocation.program, TOOL_TIMEOUT
            )));
        }
    };

    let accepted = output.status.success()
        || (invocation.warning_code.is_some() && output.status.code() == invocation.warning_code);
    if !accepted {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RupaError::TransformFailed(format!(
            "{} exited with {}: {}",
            invocation.program,
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}
