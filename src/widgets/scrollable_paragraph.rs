// src/widgets/scrollable_paragraph.rs
use unicode_width::UnicodeWidthStr;

/// Scroll state for a wrapped paragraph (the show-notes pane). The pane
/// reports its inner size each frame via `set_dimensions`, which lets
/// scrolling stop at the last page instead of running past the content.
#[derive(Debug, Default, Clone)]
pub struct ScrollableParagraphState {
    pub content: String,
    pub scroll_offset: u16,
    width: u16,
    height: u16,
}

impl ScrollableParagraphState {
    pub fn set_content(&mut self, content: String) {
        self.content = content;
        // Reset scroll when content changes
        self.scroll_offset = 0;
    }

    pub fn set_dimensions(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    pub fn scroll_up(&mut self, amount: u16) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
    }

    pub fn scroll_down(&mut self, amount: u16) {
        self.scroll_offset = self.scroll_offset.saturating_add(amount).min(self.max_scroll());
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.page_size());
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.page_size());
    }

    fn page_size(&self) -> u16 {
        self.height.max(1)
    }

    /// Estimate of wrapped content lines minus one visible page.
    fn max_scroll(&self) -> u16 {
        if self.width == 0 || self.height == 0 {
            return u16::MAX;
        }
        let width = self.width as usize;
        let wrapped_lines: usize = self
            .content
            .lines()
            .map(|line| (UnicodeWidthStr::width(line).max(1)).div_ceil(width))
            .sum();
        (wrapped_lines.saturating_sub(self.height as usize)).min(u16::MAX as usize) as u16
    }
}
