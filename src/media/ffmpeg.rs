use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use serde::Deserialize;
use tracing::debug;

use super::{Frame, MediaError, PixelLayout, VideoOpener, VideoSource};

/// Opens videos by probing them with `ffprobe`; frames are decoded with `ffmpeg`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegOpener;

impl VideoOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, MediaError> {
        Ok(Box::new(FfmpegSource::open(path)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub frame_count: i64,
}

pub struct FfmpegSource {
    path: PathBuf,
    info: StreamInfo,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        let open_err = |reason: String| MediaError::Open {
            path: path.display().to_string(),
            reason,
        };

        let output = Command::new("ffprobe")
            .args(["-v", "error", "-select_streams", "v:0"])
            .arg("-show_entries")
            .arg(
                "stream=width,height,nb_frames,avg_frame_rate,duration\
                 :stream_side_data=rotation:stream_tags=rotate:format=duration",
            )
            .args(["-of", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| open_err(format!("failed to spawn ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(open_err(format!("ffprobe exited with {}: {}", output.status, stderr.trim())));
        }

        let info = parse_probe_output(&output.stdout).map_err(open_err)?;
        debug!("Probed {:?}: {:?}", path, info);

        Ok(Self {
            path: path.to_path_buf(),
            info,
        })
    }
}

impl VideoSource for FfmpegSource {
    fn reported_frame_count(&self) -> i64 {
        self.info.frame_count
    }

    fn read_frame(&mut self, index: u64) -> Result<Frame, MediaError> {
        let decode_err = |reason: String| MediaError::Decode { index, reason };

        // select=eq(n,i) picks the i-th decoded frame; rgb24 keeps the layout fixed.
        // ffmpeg applies display rotation itself, so width/height are the display size.
        let child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin"])
            .arg("-i")
            .arg(&self.path)
            .arg("-vf")
            .arg(format!("select=eq(n\\,{})", index))
            .args(["-vsync", "0", "-frames:v", "1"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| decode_err(format!("failed to spawn ffmpeg: {}", e)))?;
        let mut child = ChildGuard(child);

        let mut stdout = child
            .0
            .stdout
            .take()
            .ok_or_else(|| decode_err("failed to open ffmpeg stdout".to_string()))?;

        let frame_len = self.info.width as usize * self.info.height as usize * 3;
        let mut data = vec![0u8; frame_len];
        stdout
            .read_exact(&mut data)
            .map_err(|e| decode_err(format!("ffmpeg produced no complete frame: {}", e)))?;
        drop(stdout);

        let status = child
            .0
            .wait()
            .map_err(|e| decode_err(format!("failed to wait on ffmpeg: {}", e)))?;
        if !status.success() {
            return Err(decode_err(format!("ffmpeg exited with {}", status)));
        }

        Ok(Frame {
            index,
            width: self.info.width,
            height: self.info.height,
            layout: PixelLayout::Rgb,
            data,
        })
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        debug!("Released video source {:?}", self.path);
    }
}

/// Kills and reaps the decoder process on every exit path.
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            let _ = self.0.kill();
        }
        let _ = self.0.wait();
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    tags: Option<ProbeTags>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Display rotation in degrees, from the display matrix or the legacy `rotate` tag.
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse().ok())
            })
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parses `ffprobe -of json` output into display dimensions and a frame count.
///
/// Streams rotated by a quarter turn report their coded size; ffmpeg
/// autorotates on decode, so width and height are swapped here to match.
///
/// `nb_frames` is missing or `N/A` for many containers (Matroska in
/// particular); the count is then estimated from duration and frame rate,
/// and falls back to zero.
pub fn parse_probe_output(raw: &[u8]) -> Result<StreamInfo, String> {
    let probe: ProbeOutput =
        serde_json::from_slice(raw).map_err(|e| format!("unreadable ffprobe output: {}", e))?;

    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream found".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no dimensions".to_string()),
    };
    let (width, height) = if is_quarter_turn(stream.rotation()) {
        (height, width)
    } else {
        (width, height)
    };

    let counted = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<i64>().ok());

    let frame_count = match counted {
        Some(n) => n,
        None => {
            let fps = stream.avg_frame_rate.as_deref().and_then(parse_rate);
            let duration = stream
                .duration
                .as_deref()
                .and_then(parse_seconds)
                .or_else(|| probe.format.and_then(|f| f.duration).as_deref().and_then(parse_seconds));
            match (fps, duration) {
                (Some(fps), Some(secs)) => (fps * secs).round() as i64,
                _ => 0,
            }
        }
    };

    Ok(StreamInfo {
        width,
        height,
        frame_count,
    })
}

fn is_quarter_turn(degrees: f64) -> bool {
    (degrees.round() as i64).rem_euclid(180) == 90
}

fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/').unwrap_or((rate, "1"));
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

fn parse_seconds(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|s| s.is_finite() && *s > 0.0)
}
