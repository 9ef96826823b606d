use std::fmt;

/// Line lengths of a piece of text, measured in UTF-16 code units.
///
/// Source map columns count UTF-16 code units, so this is what mapping
/// ranges are clamped against.
#[derive(Clone, PartialEq, Eq)]
pub struct LineLengths {
    lengths: Vec<u32>,
}

impl LineLengths {
    /// Splits `text` on `\r\n`, `\r` and `\n`.
    pub fn new(text: &str) -> LineLengths {
        let mut lengths = vec![];
        let mut current = 0u32;
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    lengths.push(current);
                    current = 0;
                }
                '\n' => {
                    lengths.push(current);
                    current = 0;
                }
                c => current += c.len_utf16() as u32,
            }
        }
        lengths.push(current);
        LineLengths { lengths: lengths }
    }

    pub fn line_count(&self) -> usize {
        self.lengths.len()
    }

    /// Length of a line.  Lines past the end of the text are empty.
    pub fn line_len(&self, line: u32) -> u32 {
        self.lengths.get(line as usize).cloned().unwrap_or(0)
    }

    pub fn longest_line(&self) -> u32 {
        self.lengths.iter().cloned().max().unwrap_or(0)
    }
}

impl fmt::Debug for LineLengths {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LineLengths")
            .field("lines", &self.lengths.len())
            .finish()
    }
}


#[test]
fn test_line_endings() {
    let lines = LineLengths::new("abc\r\nde\rf\n\nghij");
    assert_eq!(lines.line_count(), 5);
    assert_eq!(lines.line_len(0), 3);
    assert_eq!(lines.line_len(1), 2);
    assert_eq!(lines.line_len(2), 1);
    assert_eq!(lines.line_len(3), 0);
    assert_eq!(lines.line_len(4), 4);
    assert_eq!(lines.line_len(5), 0);
    assert_eq!(lines.longest_line(), 4);
}

#[test]
fn test_utf16_lengths() {
    // one astral character is a surrogate pair, é is a single unit
    let lines = LineLengths::new("\u{1F600}x\né");
    assert_eq!(lines.line_len(0), 3);
    assert_eq!(lines.line_len(1), 1);
}
