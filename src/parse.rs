// parse.rs - The input parse area

/// The source buffer the outer interpreter and parsing words read from.
/// A single held slot allows one level of save and restore, used when a
/// source file is executed in the middle of an interpretation.
#[derive(Debug, Default)]
pub struct ParseArea {
    area: Vec<u8>,
    index: usize,

    saved_area: Vec<u8>,
    saved_index: usize,
}

impl ParseArea {
    pub fn new() -> ParseArea {
        ParseArea::default()
    }

    /// Reset the cursor and replace the contents.
    pub fn fill(&mut self, bytes: &[u8]) {
        self.index = 0;
        self.area.clear();
        self.area.extend_from_slice(bytes);
    }

    pub fn save(&mut self) {
        self.saved_area = std::mem::take(&mut self.area);
        self.saved_index = self.index;
        self.index = 0;
    }

    pub fn restore(&mut self) {
        self.area = std::mem::take(&mut self.saved_area);
        self.index = self.saved_index;
        self.saved_index = 0;
    }

    /// Skip leading whitespace, then collect bytes up to the delimiter.
    /// A space delimiter matches any whitespace; any other delimiter is an
    /// exact byte match with optional backslash escaping. The delimiter is
    /// consumed but not returned.
    pub fn word(&mut self, delimiter: u8, escape: bool) -> Vec<u8> {
        let mut start = self.index;
        while start < self.area.len() && is_whitespace(self.area[start]) {
            start += 1;
        }

        let mut end = start;
        let mut escape_next = false;
        while end < self.area.len() {
            let c = self.area[end];
            if delimiter == b' ' {
                if is_whitespace(c) {
                    break;
                }
            } else {
                if c == delimiter && !(escape && escape_next) {
                    break;
                }
                escape_next = !escape_next && c == b'\\';
            }
            end += 1;
        }

        let name = self.area[start..end].to_vec();
        self.index = end + 1;
        name
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\r' | b'\n' | b'\t')
}
