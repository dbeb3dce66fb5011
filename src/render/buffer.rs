//! Double-buffered store of the painted dynamic region.

use crate::runtime::content::ContentSource;

/// `previous` holds exactly what was last written for the dynamic region;
/// `current` is scratch space for the next paint. The two exchange roles
/// after every paint instead of copying.
#[derive(Debug, Default)]
pub struct RenderBuffers {
    current: Vec<u8>,
    previous: Vec<u8>,
}

impl RenderBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild `current` from `source`. Returns `false` when there is no
    /// active producer; `current` is then left empty.
    pub fn fill(&mut self, source: &mut ContentSource) -> bool {
        self.current.clear();
        source.render_into(&mut self.current)
    }

    pub fn current(&self) -> &[u8] {
        &self.current
    }

    /// Bytes of the last successful paint.
    pub fn previous(&self) -> &[u8] {
        &self.previous
    }

    /// Promote `current` to `previous` after it has been written.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
    }

    /// Drop both buffers and their allocations.
    pub fn release(&mut self) {
        self.current = Vec::new();
        self.previous = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::RenderBuffers;
    use crate::runtime::content::ContentSource;

    #[test]
    fn swap_moves_current_into_previous_without_copying() {
        let mut buffers = RenderBuffers::new();
        let mut source = ContentSource::line(|| "first".to_string());
        assert!(buffers.fill(&mut source));
        let ptr = buffers.current().as_ptr();
        buffers.swap();
        assert_eq!(buffers.previous(), b"first\n");
        assert_eq!(buffers.previous().as_ptr(), ptr);
        assert!(buffers.current().is_empty());
    }

    #[test]
    fn fill_without_source_clears_scratch_and_keeps_previous() {
        let mut buffers = RenderBuffers::new();
        let mut source = ContentSource::raw(|| b"abc".to_vec());
        buffers.fill(&mut source);
        buffers.swap();
        buffers.fill(&mut source);

        let mut none = ContentSource::None;
        assert!(!buffers.fill(&mut none));
        assert!(buffers.current().is_empty());
        assert_eq!(buffers.previous(), b"abc");
    }

    #[test]
    fn release_empties_both_roles() {
        let mut buffers = RenderBuffers::new();
        let mut source = ContentSource::line(|| "x".to_string());
        buffers.fill(&mut source);
        buffers.swap();
        buffers.fill(&mut source);
        buffers.release();
        assert!(buffers.current().is_empty());
        assert!(buffers.previous().is_empty());
    }
}
