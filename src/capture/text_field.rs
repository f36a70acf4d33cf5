/// The task's text field: value plus caret/selection in character offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextField {
    value: String,
    selection_start: usize,
    selection_end: usize,
    disabled: bool,
}

impl TextField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Replace the value and put the caret at the end.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        let end = self.value.chars().count();
        self.selection_start = end;
        self.selection_end = end;
    }

    pub fn select(&mut self, start: usize, end: usize) {
        let len = self.value.chars().count();
        let start = start.min(len);
        self.selection_start = start;
        self.selection_end = end.clamp(start, len);
    }

    pub fn caret(&self) -> usize {
        self.selection_end
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn disable_with(&mut self, message: &str) {
        self.set_value(message);
        self.disabled = true;
    }

    /// Replace the selection with `text`; the caret lands after it.
    pub fn insert_at_caret(&mut self, text: &str) {
        let start = byte_offset(&self.value, self.selection_start);
        let end = byte_offset(&self.value, self.selection_end);
        self.value.replace_range(start..end, text);

        let caret = self.selection_start + text.chars().count();
        self.selection_start = caret;
        self.selection_end = caret;
    }
}

fn byte_offset(value: &str, char_offset: usize) -> usize {
    value
        .char_indices()
        .nth(char_offset)
        .map(|(idx, _)| idx)
        .unwrap_or(value.len())
}
