//! Escape sequence recognition on raw byte buffers.
//!
//! Sequences are zero-width on screen; the eraser skips them so styled
//! content does not inflate the wrap-aware line count.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsiCodeKind {
    Csi,
    Osc,
    Apc,
    Dcs,
    Ss3,
}

/// Kind and byte length of the escape sequence starting at `pos`, if any.
///
/// Unterminated sequences are not recognised and return `None`.
pub fn extract_ansi_code(bytes: &[u8], pos: usize) -> Option<(AnsiCodeKind, usize)> {
    if pos + 1 >= bytes.len() || bytes[pos] != 0x1b {
        return None;
    }

    match bytes[pos + 1] {
        b'[' => extract_csi(bytes, pos).map(|len| (AnsiCodeKind::Csi, len)),
        b']' => extract_string_terminated(bytes, pos).map(|len| (AnsiCodeKind::Osc, len)),
        b'_' => extract_string_terminated(bytes, pos).map(|len| (AnsiCodeKind::Apc, len)),
        b'P' => extract_string_terminated(bytes, pos).map(|len| (AnsiCodeKind::Dcs, len)),
        b'O' if pos + 2 < bytes.len() && bytes[pos + 2].is_ascii_graphic() => {
            Some((AnsiCodeKind::Ss3, 3))
        }
        _ => None,
    }
}

/// Byte length of the escape sequence starting at `pos`, if any.
pub fn ansi_sequence_len(bytes: &[u8], pos: usize) -> Option<usize> {
    extract_ansi_code(bytes, pos).map(|(_, len)| len)
}

fn extract_csi(bytes: &[u8], pos: usize) -> Option<usize> {
    let mut idx = pos + 2;
    while idx < bytes.len() {
        if (0x40..=0x7e).contains(&bytes[idx]) {
            return Some(idx + 1 - pos);
        }
        idx += 1;
    }
    None
}

fn extract_string_terminated(bytes: &[u8], pos: usize) -> Option<usize> {
    let mut idx = pos + 2;
    while idx < bytes.len() {
        if bytes[idx] == 0x07 {
            return Some(idx + 1 - pos);
        }
        if bytes[idx] == 0x1b && idx + 1 < bytes.len() && bytes[idx + 1] == b'\\' {
            return Some(idx + 2 - pos);
        }
        idx += 1;
    }
    None
}
