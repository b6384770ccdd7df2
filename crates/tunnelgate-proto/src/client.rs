//! Client display and media capabilities

use crate::request::{RequestError, TunnelRequest};

/// Optimal screen width used when the client does not declare one
pub const DEFAULT_WIDTH: u32 = 1024;

/// Optimal screen height used when the client does not declare one
pub const DEFAULT_HEIGHT: u32 = 768;

/// Optimal resolution (DPI) used when the client does not declare one
pub const DEFAULT_RESOLUTION: u32 = 96;

/// Capabilities declared by the client when requesting a tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDisplayInfo {
    /// Optimal screen width in pixels
    pub optimal_width: u32,
    /// Optimal screen height in pixels
    pub optimal_height: u32,
    /// Optimal resolution in DPI
    pub optimal_resolution: u32,
    /// Supported audio mimetypes, as given by the client
    pub audio_mimetypes: Vec<String>,
    /// Supported video mimetypes, as given by the client
    pub video_mimetypes: Vec<String>,
}

impl ClientDisplayInfo {
    /// Build client info from the optional `width`, `height`, `dpi`, `audio`
    /// and `video` request parameters
    ///
    /// Mimetypes are appended verbatim; no syntax checks happen here.
    pub fn from_request(request: &TunnelRequest) -> Result<Self, RequestError> {
        let mut info = ClientDisplayInfo::default();

        if let Some(width) = request.integer_parameter("width")? {
            info.optimal_width = width;
        }

        if let Some(height) = request.integer_parameter("height")? {
            info.optimal_height = height;
        }

        if let Some(dpi) = request.integer_parameter("dpi")? {
            info.optimal_resolution = dpi;
        }

        if let Some(audio) = request.parameter_values("audio") {
            info.audio_mimetypes.extend(audio.iter().cloned());
        }

        if let Some(video) = request.parameter_values("video") {
            info.video_mimetypes.extend(video.iter().cloned());
        }

        Ok(info)
    }
}

impl Default for ClientDisplayInfo {
    fn default() -> Self {
        Self {
            optimal_width: DEFAULT_WIDTH,
            optimal_height: DEFAULT_HEIGHT,
            optimal_resolution: DEFAULT_RESOLUTION,
            audio_mimetypes: Vec::new(),
            video_mimetypes: Vec::new(),
        }
    }
}
