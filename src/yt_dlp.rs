use std::{collections::HashMap, path::PathBuf, time::Duration};

use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::extractor::{ByteStream, ExtractError, Extractor, SourceFormat, VideoInfo};

/// Extractor backed by the `yt-dlp` executable.
///
/// Metadata comes from `yt-dlp --dump-json`; the media itself is fetched from
/// the direct URL yt-dlp resolved, so bytes flow through this process without
/// touching disk.
pub struct YtDlp {
    binary_path: PathBuf,
    client: reqwest::Client,
}

impl YtDlp {
    pub fn new(binary_path: PathBuf, connect_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            binary_path,
            client,
        })
    }

    async fn get_json(&self, link: &str) -> Result<JsonDump, ExtractError> {
        let output = Command::new(&self.binary_path)
            .arg("--skip-download")
            .arg("--dump-json")
            .arg("--no-playlist")
            .arg("--no-warnings")
            // links starting with '-' must never be read as options
            .arg("--")
            .arg(link)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp exited with {} for {link}", output.status);
            return Err(classify_failure(&stderr));
        }

        let dump = serde_json::from_slice::<JsonDump>(&output.stdout)?;
        Ok(dump)
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, ExtractError> {
        debug!("fetching info for {url}");
        let info = VideoInfo::from(self.get_json(url).await?);
        info!("{} formats available for {url}", info.formats.len());
        Ok(info)
    }

    async fn open_stream(
        &self,
        url: &str,
        format: &SourceFormat,
    ) -> Result<ByteStream, ExtractError> {
        info!("opening format {} of {url}", format.itag);
        let mut request = self.client.get(&format.url);
        for (name, value) in &format.http_headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status));
        }

        Ok(Box::pin(response.bytes_stream().map_err(ExtractError::from)))
    }
}

/// Maps the last line yt-dlp printed on stderr to an error kind.
fn classify_failure(stderr: &str) -> ExtractError {
    let message = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("yt-dlp exited without a message")
        .to_string();
    let lower = message.to_ascii_lowercase();

    if [
        "unsupported url",
        "is not a valid url",
        "video unavailable",
        "private video",
        "http error 404",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
    {
        ExtractError::NotFound(message)
    } else if [
        "unable to download",
        "timed out",
        "connection",
        "name or service not known",
        "temporary failure in name resolution",
        "network is unreachable",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
    {
        ExtractError::Network(message)
    } else {
        ExtractError::Extraction(message)
    }
}

impl From<JsonDump> for VideoInfo {
    fn from(value: JsonDump) -> Self {
        let formats = value
            .formats
            .into_iter()
            .filter_map(|format| {
                let itag = format.format_id.parse::<u32>().ok()?;
                // manifests and storyboards cannot be relayed as a single file
                if !matches!(format.protocol.as_deref(), None | Some("https") | Some("http")) {
                    return None;
                }
                let url = format.url?;

                let has_video = has_codec(format.vcodec.as_deref());
                let has_audio = has_codec(format.acodec.as_deref());
                let quality_label = if has_video {
                    format
                        .format_note
                        .filter(|note| !note.is_empty())
                        .or_else(|| format.height.map(|height| format!("{height}p")))
                } else {
                    None
                };
                let resolution = format
                    .resolution
                    .filter(|resolution| resolution != "audio only");
                let mime_type = mime_type(
                    format.ext.as_deref(),
                    has_video,
                    [format.vcodec.as_deref(), format.acodec.as_deref()],
                );

                Some(SourceFormat {
                    itag,
                    quality_label,
                    has_audio,
                    has_video,
                    resolution,
                    mime_type,
                    container: format.ext,
                    url,
                    http_headers: format.http_headers.unwrap_or_default(),
                })
            })
            .collect();

        Self {
            title: value.title,
            formats,
        }
    }
}

fn has_codec(codec: Option<&str>) -> bool {
    matches!(codec, Some(value) if value != "none")
}

fn mime_type(ext: Option<&str>, has_video: bool, codecs: [Option<&str>; 2]) -> String {
    let subtype = match ext {
        Some("m4a") => "mp4",
        Some("mp3") => "mpeg",
        Some(ext) => ext,
        None => "mp4",
    };
    let family = if has_video { "video" } else { "audio" };
    let codecs: Vec<&str> = codecs.into_iter().flatten().filter(|c| *c != "none").collect();

    if codecs.is_empty() {
        format!("{family}/{subtype}")
    } else {
        format!("{family}/{subtype}; codecs=\"{}\"", codecs.join(", "))
    }
}

#[derive(Deserialize)]
struct JsonDump {
    title: String,
    #[serde(default)]
    formats: Vec<JsonFormat>,
}

#[derive(Deserialize)]
struct JsonFormat {
    format_id: String,
    url: Option<String>,
    ext: Option<String>,
    protocol: Option<String>,
    acodec: Option<String>,
    vcodec: Option<String>,
    format_note: Option<String>,
    height: Option<u32>,
    resolution: Option<String>,
    http_headers: Option<HashMap<String, String>>,
}
