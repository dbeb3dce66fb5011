//! Pluggable producers of the dynamic region's content.

use std::fmt;

type LinesFn = dyn FnMut() -> Vec<String> + Send;
type LineFn = dyn FnMut() -> String + Send;
type RawFn = dyn FnMut() -> Vec<u8> + Send;

/// Exactly one content producer is active at a time; installing a new one
/// replaces the previous one.
#[derive(Default)]
pub enum ContentSource {
    /// Nothing to render: ticks are no-ops.
    #[default]
    None,
    /// Multi-line content; a newline is appended to every line.
    Lines(Box<LinesFn>),
    /// Single line; a newline is appended.
    Line(Box<LineFn>),
    /// Written verbatim, no newline injected.
    Raw(Box<RawFn>),
}

impl ContentSource {
    pub fn lines<F>(f: F) -> Self
    where
        F: FnMut() -> Vec<String> + Send + 'static,
    {
        Self::Lines(Box::new(f))
    }

    pub fn line<F>(f: F) -> Self
    where
        F: FnMut() -> String + Send + 'static,
    {
        Self::Line(Box::new(f))
    }

    pub fn raw<F>(f: F) -> Self
    where
        F: FnMut() -> Vec<u8> + Send + 'static,
    {
        Self::Raw(Box::new(f))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ContentSource::None)
    }

    /// Pull fresh content and append its normalised bytes to `buf`.
    ///
    /// Returns `false` (leaving `buf` untouched) when no producer is set.
    pub fn render_into(&mut self, buf: &mut Vec<u8>) -> bool {
        match self {
            ContentSource::None => return false,
            ContentSource::Lines(f) => {
                for line in f() {
                    buf.extend_from_slice(line.as_bytes());
                    buf.push(b'\n');
                }
            }
            ContentSource::Line(f) => {
                buf.extend_from_slice(f().as_bytes());
                buf.push(b'\n');
            }
            ContentSource::Raw(f) => buf.extend_from_slice(&f()),
        }
        true
    }
}

impl fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentSource::None => "None",
            ContentSource::Lines(_) => "Lines",
            ContentSource::Line(_) => "Line",
            ContentSource::Raw(_) => "Raw",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::ContentSource;

    fn render(source: &mut ContentSource) -> Option<Vec<u8>> {
        let mut buf = Vec::new();
        source.render_into(&mut buf).then_some(buf)
    }

    #[test]
    fn lines_get_one_newline_each() {
        let mut source =
            ContentSource::lines(|| vec!["a".to_string(), String::new(), "c".to_string()]);
        assert_eq!(render(&mut source).unwrap(), b"a\n\nc\n");
    }

    #[test]
    fn single_line_is_newline_terminated() {
        let mut source = ContentSource::line(|| "status".to_string());
        assert_eq!(render(&mut source).unwrap(), b"status\n");
    }

    #[test]
    fn raw_is_written_verbatim() {
        let mut source = ContentSource::raw(|| b"42".to_vec());
        assert_eq!(render(&mut source).unwrap(), b"42");
    }

    #[test]
    fn none_renders_nothing() {
        let mut source = ContentSource::default();
        assert!(source.is_none());
        assert!(render(&mut source).is_none());
    }

    #[test]
    fn producers_are_called_on_every_render() {
        let mut counter = 0;
        let mut source = ContentSource::line(move || {
            counter += 1;
            counter.to_string()
        });
        assert_eq!(render(&mut source).unwrap(), b"1\n");
        assert_eq!(render(&mut source).unwrap(), b"2\n");
    }
}
