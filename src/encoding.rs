use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Result};

#[cfg(feature = "sidecar_ffmpeg")]
use anyhow::Context;

/// Compiles a finished `frame_%d.png` sequence into a video with one
/// ffmpeg invocation. The frames must all exist before this is called;
/// on failure they are left in place.
pub struct VideoEncoder {
    frame_rate: u32,
}

impl VideoEncoder {
    pub fn new(frame_rate: u32) -> Self {
        Self { frame_rate }
    }

    pub fn encode(&self, pattern: &Path, output: &Path) -> Result<()> {
        let ffmpeg = resolve_ffmpeg()?;
        let args = encode_args(self.frame_rate, pattern, output);

        let result = Command::new(&ffmpeg)
            .args(args.iter().map(String::as_str))
            .output()
            .map_err(|error| {
                if error.kind() == ErrorKind::NotFound {
                    anyhow!(
                        "ffmpeg executable not found (resolved_path={}). Install ffmpeg or build with `--features sidecar_ffmpeg`.",
                        ffmpeg.display()
                    )
                } else {
                    anyhow!(
                        "failed to run ffmpeg (resolved_path={}, args='{}'): {error}",
                        ffmpeg.display(),
                        args.join(" ")
                    )
                }
            })?;

        if !result.status.success() {
            let stderr_tail = last_n_chars(&String::from_utf8_lossy(&result.stderr), 500);
            return Err(anyhow!(
                "ffmpeg failed with status {} (args='{}', stderr_tail='{}')",
                result.status,
                args.join(" "),
                stderr_tail
            ));
        }
        Ok(())
    }
}

fn encode_args(frame_rate: u32, pattern: &Path, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-framerate".to_owned(),
        frame_rate.to_string(),
        "-start_number".to_owned(),
        "0".to_owned(),
        "-i".to_owned(),
        pattern.to_string_lossy().into_owned(),
        "-c:v".to_owned(),
        "libx264".to_owned(),
        "-pix_fmt".to_owned(),
        "yuv420p".to_owned(),
        "-an".to_owned(),
        output.to_string_lossy().into_owned(),
    ]
}

#[cfg(not(feature = "sidecar_ffmpeg"))]
fn resolve_ffmpeg() -> Result<PathBuf> {
    Ok(PathBuf::from("ffmpeg"))
}

#[cfg(feature = "sidecar_ffmpeg")]
fn resolve_ffmpeg() -> Result<PathBuf> {
    let path = ffmpeg_sidecar::paths::ffmpeg_path();
    if !path.exists() {
        ffmpeg_sidecar::download::auto_download()
            .context("failed to auto-download ffmpeg sidecar binary")?;
    }
    Ok(path)
}

fn last_n_chars(s: &str, max_chars: usize) -> String {
    let chars = s.chars().collect::<Vec<_>>();
    let start = chars.len().saturating_sub(max_chars);
    chars[start..].iter().collect::<String>().trim().to_owned()
}
