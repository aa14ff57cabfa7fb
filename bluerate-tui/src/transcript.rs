use ratatui::style::Style;

/// Oldest lines are dropped past this many.
const MAX_LINES: usize = 2_000;

#[derive(Clone)]
pub struct TranscriptLine {
    pub text: String,
    pub style: Style,
}

/// Append-only scrollback shown in the left column.
#[derive(Clone, Default)]
pub struct Transcript {
    lines: Vec<TranscriptLine>,
}

impl Transcript {
    pub fn push(&mut self, text: impl Into<String>, style: Style) {
        self.lines.push(TranscriptLine {
            text: text.into(),
            style,
        });
        if self.lines.len() > MAX_LINES {
            let excess = self.lines.len() - MAX_LINES;
            self.lines.drain(..excess);
        }
    }

    pub fn blank(&mut self) {
        self.push(String::new(), Style::default());
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }
}
