//! Output buffer stack
//!
//! Everything a script prints lands in the innermost open buffer, or in the
//! result text when no buffer is open.

/// Result text plus the stack of open buffers
#[derive(Debug, Default)]
pub struct OutputBuffers {
    result: String,
    stack: Vec<String>,
}

impl OutputBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the active sink
    pub fn write(&mut self, text: &str) {
        match self.stack.last_mut() {
            Some(buffer) => buffer.push_str(text),
            None => self.result.push_str(text),
        }
    }

    /// `ob_start`
    pub fn push(&mut self) {
        self.stack.push(String::new());
    }

    /// Number of open buffers
    pub fn level(&self) -> usize {
        self.stack.len()
    }

    /// Content of the innermost buffer
    pub fn contents(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    /// Empty the innermost buffer in place; `false` when none is open
    pub fn clean(&mut self) -> bool {
        match self.stack.last_mut() {
            Some(buffer) => {
                buffer.clear();
                true
            }
            None => false,
        }
    }

    /// Move the innermost buffer's content one level down
    pub fn flush(&mut self) -> bool {
        let Some(content) = self.stack.last_mut().map(std::mem::take) else {
            return false;
        };
        let below = self.stack.len() - 1;
        match below.checked_sub(1) {
            Some(index) => self.stack[index].push_str(&content),
            None => self.result.push_str(&content),
        }
        true
    }

    /// Close the innermost buffer, discarding its content
    pub fn pop(&mut self) -> Option<String> {
        self.stack.pop()
    }

    /// Flush then close the innermost buffer
    pub fn end_flush(&mut self) -> bool {
        if !self.flush() {
            return false;
        }
        self.stack.pop();
        true
    }

    /// Flush every open buffer down to the result
    pub fn flush_all(&mut self) {
        while self.end_flush() {}
    }

    /// Text that has left every buffer so far
    pub fn result(&self) -> &str {
        &self.result
    }

    /// Flush everything and hand out the accumulated result
    pub fn take_result(&mut self) -> String {
        self.flush_all();
        std::mem::take(&mut self.result)
    }
}
