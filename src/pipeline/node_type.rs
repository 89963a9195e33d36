//! Node kind enumeration for graph construction.
//!
//! Graph descriptions name node kinds as strings; they are resolved to a
//! [`NodeKind`] once, when the graph is installed.

use crate::pipeline::queue::InboxPolicy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kinds of nodes a graph may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    // Sources
    BroadbandSource,
    SpikeSource,

    // Processing
    SpectralFilter,
    SpikeDetector,
    SpikeBinner,

    // Transport
    StreamIn,
    StreamOut,

    // Sinks
    OpticalStimulation,
    DiskWriter,
    Application,
}

impl NodeKind {
    /// Name used in graph descriptions.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::BroadbandSource => "broadband_source",
            NodeKind::SpikeSource => "spike_source",
            NodeKind::SpectralFilter => "spectral_filter",
            NodeKind::SpikeDetector => "spike_detector",
            NodeKind::SpikeBinner => "spike_binner",
            NodeKind::StreamIn => "stream_in",
            NodeKind::StreamOut => "stream_out",
            NodeKind::OpticalStimulation => "optical_stimulation",
            NodeKind::DiskWriter => "disk_writer",
            NodeKind::Application => "application",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            NodeKind::BroadbandSource => "Broadband Source",
            NodeKind::SpikeSource => "Spike Source",
            NodeKind::SpectralFilter => "Spectral Filter",
            NodeKind::SpikeDetector => "Spike Detector",
            NodeKind::SpikeBinner => "Spike Binner",
            NodeKind::StreamIn => "Stream In",
            NodeKind::StreamOut => "Stream Out",
            NodeKind::OpticalStimulation => "Optical Stimulation",
            NodeKind::DiskWriter => "Disk Writer",
            NodeKind::Application => "Application",
        }
    }

    pub fn all() -> &'static [NodeKind] {
        &[
            NodeKind::BroadbandSource,
            NodeKind::SpikeSource,
            NodeKind::SpectralFilter,
            NodeKind::SpikeDetector,
            NodeKind::SpikeBinner,
            NodeKind::StreamIn,
            NodeKind::StreamOut,
            NodeKind::OpticalStimulation,
            NodeKind::DiskWriter,
            NodeKind::Application,
        ]
    }

    pub fn is_source(&self) -> bool {
        matches!(
            self,
            NodeKind::BroadbandSource | NodeKind::SpikeSource | NodeKind::StreamIn
        )
    }

    pub fn is_sink(&self) -> bool {
        matches!(
            self,
            NodeKind::StreamOut
                | NodeKind::OpticalStimulation
                | NodeKind::DiskWriter
                | NodeKind::Application
        )
    }

    /// Whether this kind owns a socket once configured.
    pub fn is_transport(&self) -> bool {
        matches!(self, NodeKind::StreamIn | NodeKind::StreamOut)
    }

    /// Back-pressure behaviour of this kind's input queue.
    pub fn inbox_policy(&self) -> InboxPolicy {
        match self {
            NodeKind::Application => InboxPolicy::DropOldest,
            _ => InboxPolicy::Block,
        }
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        NodeKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown node kind '{}'", s))
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for kind in NodeKind::all() {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), *kind);
        }
        assert_eq!("Stream-Out".parse::<NodeKind>().unwrap(), NodeKind::StreamOut);
        assert!("flux_capacitor".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        for kind in NodeKind::all() {
            assert_eq!(
                serde_json::to_string(kind).unwrap(),
                format!("\"{}\"", kind.as_str())
            );
        }
    }

    #[test]
    fn test_application_inbox_drops_oldest() {
        assert_eq!(NodeKind::Application.inbox_policy(), InboxPolicy::DropOldest);
        assert_eq!(NodeKind::StreamOut.inbox_policy(), InboxPolicy::Block);
    }
}
