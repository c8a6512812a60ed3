/// Identity of one elementary track handled by the engine.
///
/// Each track type gets its own segment loader; the primary loader is the
/// timeline-crossing authority for the presentation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TrackType {
    /// Muxed or video-led main track.
    Primary,
    /// Demuxed alternate audio (audio group renditions).
    AlternateAudio,
    /// Segmented subtitle/caption track.
    Subtitle,
}

impl TrackType {
    /// Whether this track may author timestamp offsets for a timeline.
    pub fn is_timeline_authority(self) -> bool {
        matches!(self, Self::Primary)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::AlternateAudio => "audio",
            Self::Subtitle => "subtitle",
        }
    }
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
