//! ASCII viewer used by the `view` methods of PC and KSP objects.

use std::fmt;

/// Text sink with PETSc-style tab indentation (two spaces per tab).
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    buf: String,
    tab: usize,
}

impl Viewer {
    pub fn ascii() -> Self {
        Self::default()
    }

    /// Append `text`, indenting every line at the current tab level.
    pub fn printf_ascii(&mut self, text: &str) {
        for line in text.lines() {
            self.buf.push_str(&"  ".repeat(self.tab));
            self.buf.push_str(line);
            self.buf.push('\n');
        }
    }

    pub fn push_tab(&mut self) {
        self.tab += 1;
    }

    pub fn pop_tab(&mut self) {
        self.tab = self.tab.saturating_sub(1);
    }

    pub fn tab(&self) -> usize {
        self.tab
    }

    pub fn set_tab(&mut self, tab: usize) {
        self.tab = tab;
    }

    pub fn contents(&self) -> &str {
        &self.buf
    }
}

impl fmt::Display for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buf)
    }
}
