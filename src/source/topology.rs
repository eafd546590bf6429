use crate::{
    engine::{Caps, ElementRef, Engine, PropertyValue},
    foundation::error::MixResult,
};

/// Encoding of the RTP stream fed to a live-push source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// VP8 over RTP.
    Vp8,
    /// VP9 over RTP.
    Vp9,
    /// H.264 over RTP.
    H264,
    /// Let the engine pick a depayloader and decoder once the stream is examined.
    Auto,
}

impl Codec {
    fn rtp_caps(self) -> Caps {
        let caps = Caps::new("application/x-rtp").field("media", "video");
        match self {
            Codec::Vp8 => caps.field("encoding-name", "VP8"),
            Codec::Vp9 => caps.field("encoding-name", "VP9"),
            Codec::H264 => caps.field("encoding-name", "H264"),
            Codec::Auto => caps,
        }
    }

    /// `(depayloader, decoder)` factories, `None` for [`Codec::Auto`].
    fn fixed_chain(self) -> Option<(&'static str, &'static str)> {
        match self {
            Codec::Vp8 => Some(("rtpvp8depay", "vp8dec")),
            Codec::Vp9 => Some(("rtpvp9depay", "vp9dec")),
            Codec::H264 => Some(("rtph264depay", "avdec_h264")),
            Codec::Auto => None,
        }
    }
}

/// Source variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum SourceKind {
    /// Any raw video producer followed by the framing box.
    Raw,
    /// Test pattern generator.
    Test,
    /// Encoded RTP frames pushed by the caller.
    LivePush(Codec),
    /// RTSP camera or generic URI; output pads appear once the stream is examined.
    Network,
    /// Caller-provided producer element.
    FromElement,
}

/// Caps a dynamic pad must carry to complete a deferred edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PadFilter {
    /// Media-type prefix.
    pub(crate) prefix: &'static str,
    /// Required value of the caps `media` field.
    pub(crate) media: Option<&'static str>,
}

impl PadFilter {
    pub(crate) fn accepts(&self, caps: &Caps) -> bool {
        caps.media_type().starts_with(self.prefix)
            && self.media.is_none_or(|media| caps.get("media") == Some(media))
    }
}

/// RTP carrying video; an RTSP session also exposes audio RTP pads.
pub(crate) const RTP_VIDEO: PadFilter = PadFilter {
    prefix: "application/x-rtp",
    media: Some("video"),
};
pub(crate) const DECODED_VIDEO: PadFilter = PadFilter {
    prefix: "video/",
    media: None,
};

pub(crate) struct Node {
    pub(crate) element: ElementRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Edge {
    pub(crate) from: usize,
    pub(crate) to: usize,
    /// Set for edges that can only be made once `from` exposes a matching pad.
    pub(crate) deferred: Option<PadFilter>,
}

/// Fixed internal sub-graph of one source, as data.
///
/// Nodes are listed upstream first; the last node is always the framing `videobox`.
pub(crate) struct Topology {
    pub(crate) kind: SourceKind,
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    /// Node receiving buffers from [`crate::MediaSource::push`].
    pub(crate) entry: usize,
    /// Node whose `caps` property carries the picture size.
    pub(crate) size: usize,
    pub(crate) framing: usize,
}

impl Topology {
    pub(crate) fn has_deferred(&self) -> bool {
        self.edges.iter().any(|e| e.deferred.is_some())
    }

    /// Static upstream neighbour of the framing node.
    pub(crate) fn framing_predecessor(&self) -> Option<&ElementRef> {
        self.edges
            .iter()
            .find(|e| e.to == self.framing && e.deferred.is_none())
            .map(|e| &self.nodes[e.from].element)
    }

    pub(crate) fn element(&self, idx: usize) -> &ElementRef {
        &self.nodes[idx].element
    }

    pub(crate) fn raw(engine: &dyn Engine, id: u64, factory: &str) -> MixResult<Self> {
        let mut b = Builder::new(engine, id);
        let source = b.node("source", factory, &[])?;
        let framing = b.node("box", "videobox", &[])?;
        b.link(source, framing);
        Ok(b.finish(SourceKind::Raw, source, source, framing))
    }

    pub(crate) fn test(engine: &dyn Engine, id: u64, pattern: Option<i32>) -> MixResult<Self> {
        let mut b = Builder::new(engine, id);
        let props: Vec<(&str, PropertyValue)> = pattern
            .map(|p| ("pattern", PropertyValue::from(p)))
            .into_iter()
            .collect();
        let source = b.node("source", "videotestsrc", &props)?;
        let filter = b.node("videofilter", "capsfilter", &[])?;
        let queue = b.node("queue", "queue", &[])?;
        let framing = b.node("box", "videobox", &[])?;
        b.link(source, filter);
        b.link(filter, queue);
        b.link(queue, framing);
        Ok(b.finish(SourceKind::Test, source, filter, framing))
    }

    pub(crate) fn from_element(engine: &dyn Engine, id: u64, element: ElementRef) -> MixResult<Self> {
        let mut b = Builder::new(engine, id);
        let source = b.adopt(element);
        let filter = b.node("videofilter", "capsfilter", &[])?;
        let framing = b.node("box", "videobox", &[])?;
        b.link(source, filter);
        b.link(filter, framing);
        Ok(b.finish(SourceKind::FromElement, source, filter, framing))
    }

    pub(crate) fn live_push(engine: &dyn Engine, id: u64, codec: Codec) -> MixResult<Self> {
        let mut b = Builder::new(engine, id);
        let source = b.node(
            "source",
            "appsrc",
            &[
                // GST_FORMAT_TIME
                ("format", PropertyValue::from(3)),
                ("is-live", PropertyValue::from(true)),
                ("do-timestamp", PropertyValue::from(true)),
            ],
        )?;
        let input = b.node(
            "inputfilter",
            "capsfilter",
            &[("caps", PropertyValue::from(codec.rtp_caps()))],
        )?;
        b.link(source, input);

        let decoded = match codec.fixed_chain() {
            Some((depay_factory, decoder_factory)) => {
                let depay = b.node("depay", depay_factory, &[])?;
                let decoder = b.node("decoder", decoder_factory, &[])?;
                b.link(input, depay);
                b.link(depay, decoder);
                decoder
            }
            None => {
                let decodebin = b.node("decodebin", "decodebin", &[])?;
                b.link(input, decodebin);
                decodebin
            }
        };

        let scale = b.node("videoscale", "videoscale", &[])?;
        if codec.fixed_chain().is_some() {
            b.link(decoded, scale);
        } else {
            b.defer(decoded, scale, DECODED_VIDEO);
        }
        let filter = b.scaled_tail(scale, true)?;
        let framing = b.nodes.len() - 1;
        Ok(b.finish(SourceKind::LivePush(codec), source, filter, framing))
    }

    pub(crate) fn rtsp(engine: &dyn Engine, id: u64, location: &str, latency_ms: u32) -> MixResult<Self> {
        let mut b = Builder::new(engine, id);
        let source = b.node(
            "source",
            "rtspsrc",
            &[
                ("location", PropertyValue::from(location)),
                ("latency", PropertyValue::from(latency_ms)),
            ],
        )?;
        let decodebin = b.node("decodebin", "decodebin", &[])?;
        let scale = b.node("videoscale", "videoscale", &[])?;
        b.defer(source, decodebin, RTP_VIDEO);
        b.defer(decodebin, scale, DECODED_VIDEO);
        let filter = b.scaled_tail(scale, true)?;
        let framing = b.nodes.len() - 1;
        Ok(b.finish(SourceKind::Network, source, filter, framing))
    }

    pub(crate) fn uri(engine: &dyn Engine, id: u64, uri: &str) -> MixResult<Self> {
        let mut b = Builder::new(engine, id);
        let source = b.node("source", "uridecodebin", &[("uri", PropertyValue::from(uri))])?;
        let scale = b.node("videoscale", "videoscale", &[])?;
        b.defer(source, scale, DECODED_VIDEO);
        let filter = b.scaled_tail(scale, false)?;
        let framing = b.nodes.len() - 1;
        Ok(b.finish(SourceKind::Network, source, filter, framing))
    }
}

struct Builder<'a> {
    engine: &'a dyn Engine,
    id: u64,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl<'a> Builder<'a> {
    fn new(engine: &'a dyn Engine, id: u64) -> Self {
        Self {
            engine,
            id,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    fn node(
        &mut self,
        role: &str,
        factory: &str,
        props: &[(&str, PropertyValue)],
    ) -> MixResult<usize> {
        let element = self
            .engine
            .make_element(factory, &format!("{role}_{}", self.id))?;
        for (name, value) in props {
            element.set_property(name, value.clone());
        }
        Ok(self.adopt(element))
    }

    fn adopt(&mut self, element: ElementRef) -> usize {
        self.nodes.push(Node { element });
        self.nodes.len() - 1
    }

    fn link(&mut self, from: usize, to: usize) {
        self.edges.push(Edge {
            from,
            to,
            deferred: None,
        });
    }

    fn defer(&mut self, from: usize, to: usize, filter: PadFilter) {
        self.edges.push(Edge {
            from,
            to,
            deferred: Some(filter),
        });
    }

    /// `scale → videofilter [→ timeoverlay] → queue → box`; returns the size filter index.
    fn scaled_tail(&mut self, scale: usize, overlay: bool) -> MixResult<usize> {
        let filter = self.node("videofilter", "capsfilter", &[])?;
        self.link(scale, filter);
        let mut last = filter;
        if overlay {
            let time = self.node("timeoverlay", "timeoverlay", &[])?;
            self.link(last, time);
            last = time;
        }
        let queue = self.node("queue", "queue", &[])?;
        let framing = self.node("box", "videobox", &[])?;
        self.link(last, queue);
        self.link(queue, framing);
        Ok(filter)
    }

    fn finish(self, kind: SourceKind, entry: usize, size: usize, framing: usize) -> Topology {
        Topology {
            kind,
            nodes: self.nodes,
            edges: self.edges,
            entry,
            size,
            framing,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/topology.rs"]
mod tests;
