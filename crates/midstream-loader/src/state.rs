/// Segment-loader lifecycle.
///
/// `Init → Ready ⇄ Waiting → Appending → Ready`, with `SwitchingMedia` /
/// `WaitingOnTimeline` for rendition and timeline transitions and a terminal
/// `Disposed`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoaderState {
    /// No playlist yet, or paused before the first pick.
    Init,
    /// Idle; the monitor loop may pick a next request.
    Ready,
    /// A network request is in flight.
    Waiting,
    /// Payload processed; waiting for the sink to acknowledge the append.
    Appending,
    /// Mid-flight rendition retarget; the previous request is being wound
    /// down.
    SwitchingMedia,
    /// Holding a cross-timeline pick until the authority begins crossing.
    WaitingOnTimeline,
    /// Terminal.
    Disposed,
}

impl LoaderState {
    pub fn is_disposed(self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Whether the monitor loop may start a new request from this state.
    pub fn can_pick(self) -> bool {
        matches!(self, Self::Ready | Self::WaitingOnTimeline)
    }
}

impl std::fmt::Display for LoaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Ready => "ready",
            Self::Waiting => "waiting",
            Self::Appending => "appending",
            Self::SwitchingMedia => "switching-media",
            Self::WaitingOnTimeline => "waiting-on-timeline",
            Self::Disposed => "disposed",
        };
        f.write_str(s)
    }
}
