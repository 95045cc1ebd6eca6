use std::fmt;

use crate::core::{ContainerKind, Path, Result, Segment, Value};

/// Receives mutation reports from a child container.
///
/// Implemented by the record funnel and by every [`Link`], so a report from a
/// deeply nested wrapper gains one path step per owner on its way up.
pub trait ChildUpdateSink {
    fn notify_child_update(&mut self, path: Path, value: Value) -> Result<()>;
}

/// Non-owning upward edge from a wrapper to its owner.
///
/// Remembers the segment under which the wrapped container was reached and
/// the container's kind, which is what the owner needs to extend a path.
pub struct Link<'a> {
    upstream: &'a mut (dyn ChildUpdateSink + 'a),
    segment: Segment,
    kind: ContainerKind,
}

impl<'a> Link<'a> {
    pub(crate) fn new(
        upstream: &'a mut (dyn ChildUpdateSink + 'a),
        segment: Segment,
        kind: ContainerKind,
    ) -> Self {
        Self {
            upstream,
            segment,
            kind,
        }
    }

    /// Reports a write to `segment` inside the linked container.
    pub(crate) fn report(&mut self, segment: Segment, value: Value) -> Result<()> {
        if segment.is_reserved() {
            return Ok(());
        }
        self.notify_child_update(Path::leaf(segment), value)
    }

    /// Reports the linked container itself replaced by `value`.
    pub(crate) fn report_replaced(&mut self, value: Value) -> Result<()> {
        self.upstream
            .notify_child_update(Path::leaf(self.segment.clone()), value)
    }
}

impl ChildUpdateSink for Link<'_> {
    fn notify_child_update(&mut self, path: Path, value: Value) -> Result<()> {
        self.upstream
            .notify_child_update(path.extend(self.kind, self.segment.clone()), value)
    }
}

impl fmt::Debug for Link<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("segment", &self.segment)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Sink that collects reports in memory; handy for driving wrappers directly.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub reports: Vec<(Path, Value)>,
}

impl ChildUpdateSink for RecordingSink {
    fn notify_child_update(&mut self, path: Path, value: Value) -> Result<()> {
        self.reports.push((path, value));
        Ok(())
    }
}
