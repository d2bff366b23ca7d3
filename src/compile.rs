use log::{debug, info};
use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DETAIL_LINES: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("'{tool}' was not found on PATH")]
    ToolMissing { tool: String },
    #[error("'{tool}' failed ({status}):\n{details}")]
    Failed {
        tool: String,
        status: String,
        details: String,
    },
    #[error("'{tool}' did not finish within {seconds}s")]
    Timeout { tool: String, seconds: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Runs `pdflatex` on `tex` in a scratch directory and copies the PDF to
/// `output`.
pub fn compile_pdf(tex: &str, output: &Path, timeout: Duration) -> Result<(), CompileError> {
    let dir = tempfile::tempdir()?;
    let pdf = build_pdf(tex, dir.path(), timeout)?;
    std::fs::copy(&pdf, output)?;
    info!("wrote {}", output.display());
    Ok(())
}

/// Compiles to PDF, then rasterizes it with ImageMagick's `convert`.
pub fn compile_png(tex: &str, output: &Path, timeout: Duration) -> Result<(), CompileError> {
    let dir = tempfile::tempdir()?;
    let pdf = build_pdf(tex, dir.path(), timeout)?;
    let png = dir.path().join("diagram.png");
    run_tool(
        "convert",
        &[
            OsStr::new("-density"),
            OsStr::new("300"),
            pdf.as_os_str(),
            OsStr::new("-quality"),
            OsStr::new("90"),
            png.as_os_str(),
        ],
        dir.path(),
        timeout,
    )?;
    std::fs::copy(&png, output)?;
    info!("wrote {}", output.display());
    Ok(())
}

fn build_pdf(tex: &str, dir: &Path, timeout: Duration) -> Result<std::path::PathBuf, CompileError> {
    let source = dir.join("diagram.tex");
    std::fs::write(&source, tex)?;
    run_tool(
        "pdflatex",
        &[
            OsStr::new("-interaction=nonstopmode"),
            OsStr::new("-output-directory"),
            dir.as_os_str(),
            source.as_os_str(),
        ],
        dir,
        timeout,
    )?;
    let pdf = dir.join("diagram.pdf");
    if !pdf.exists() {
        return Err(CompileError::Failed {
            tool: "pdflatex".to_string(),
            status: "no output".to_string(),
            details: tool_details(dir, "pdflatex"),
        });
    }
    Ok(pdf)
}

/// Spawns `tool` with its output captured to a file in `dir`, polling for
/// completion until `timeout` elapses.
fn run_tool(
    tool: &str,
    args: &[&OsStr],
    dir: &Path,
    timeout: Duration,
) -> Result<(), CompileError> {
    let log = File::create(dir.join(format!("{tool}.out")))?;
    let mut child = Command::new(tool)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone()?))
        .stderr(Stdio::from(log))
        .spawn()
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                CompileError::ToolMissing {
                    tool: tool.to_string(),
                }
            } else {
                CompileError::Io(err)
            }
        })?;
    debug!("spawned {tool}");

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CompileError::Timeout {
                tool: tool.to_string(),
                seconds: timeout.as_secs(),
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    };
    check_status(tool, status, dir)
}

fn check_status(tool: &str, status: ExitStatus, dir: &Path) -> Result<(), CompileError> {
    if status.success() {
        return Ok(());
    }
    Err(CompileError::Failed {
        tool: tool.to_string(),
        status: status.to_string(),
        details: tool_details(dir, tool),
    })
}

/// LaTeX error lines (`! ...`) when present, otherwise the output tail.
fn tool_details(dir: &Path, tool: &str) -> String {
    let Ok(text) = std::fs::read_to_string(dir.join(format!("{tool}.out"))) else {
        return String::new();
    };
    let errors: Vec<&str> = text.lines().filter(|line| line.starts_with('!')).collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(DETAIL_LINES);
    lines[start..].join("\n")
}
