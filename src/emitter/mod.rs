pub mod headers;

#[cfg(test)]
mod tests;

use std::collections::HashSet;

pub use self::headers::HeaderKey;

/// Multi-target text collector for the generated translation unit.
///
/// Emission is directed at regions: the header set, the `globals` buffer
/// (struct definitions, prototypes, the global pointer table, finished
/// functions), and, while a function is being assembled, its isolated
/// signature / prologue / body / epilogue frame. `finalize_function` flattens
/// a frame into `globals`; `finalize` flattens everything into the output
/// string.
pub struct Emitter {
    globals: String,
    headers: HashSet<HeaderKey>,
    frames: Vec<FunctionFrame>,
    indent: usize,
    finalized: bool,
}

struct FunctionFrame {
    signature: String,
    prologue: String,
    body: String,
    epilogue: String,
    once: HashSet<String>,
    in_body: bool,
}

impl FunctionFrame {
    fn new() -> Self {
        Self {
            signature: String::new(),
            prologue: String::new(),
            body: String::new(),
            epilogue: String::new(),
            once: HashSet::new(),
            in_body: false,
        }
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            globals: String::new(),
            headers: HashSet::new(),
            frames: Vec::new(),
            indent: 0,
            finalized: false,
        }
    }

    /// Append to the current default target (the open function's signature or
    /// body, otherwise `globals`), applying the current indentation at the
    /// start of each new line.
    pub fn emit(&mut self, text: &str) {
        let indent = "  ".repeat(self.indent);
        let buf = self.current_buffer_mut();
        for piece in text.split_inclusive('\n') {
            if (buf.is_empty() || buf.ends_with('\n')) && piece != "\n" {
                buf.push_str(&indent);
            }
            buf.push_str(piece);
        }
    }

    /// Append a declaration line to the prologue of the function currently
    /// being assembled. Prologue lines sit one level deep.
    pub fn emit_to_beginning_of_function(&mut self, text: &str) {
        let frame = self
            .frames
            .last_mut()
            .expect("no function frame open for prologue emission");
        frame.prologue.push_str("  ");
        frame.prologue.push_str(text);
    }

    /// As `emit_to_beginning_of_function`, but suppresses duplicates, keyed
    /// by the exact text. Used for generated iterator counters.
    pub fn emit_once_to_beginning_of_function(&mut self, text: &str) {
        let frame = self
            .frames
            .last_mut()
            .expect("no function frame open for prologue emission");
        if frame.once.insert(text.to_string()) {
            frame.prologue.push_str("  ");
            frame.prologue.push_str(text);
        }
    }

    /// Append raw text to the open function's epilogue. Callers format their
    /// own indentation; the epilogue always sits at function level.
    pub fn emit_to_epilogue(&mut self, text: &str) {
        let frame = self
            .frames
            .last_mut()
            .expect("no function frame open for epilogue emission");
        frame.epilogue.push_str(text);
    }

    pub fn emit_predefined_header(&mut self, key: HeaderKey) {
        self.headers.insert(key);
    }

    /// Open an isolated frame; emission targets its signature region until
    /// `begin_function_body`.
    pub fn begin_function(&mut self) {
        self.frames.push(FunctionFrame::new());
    }

    pub fn begin_function_body(&mut self) {
        let frame = self
            .frames
            .last_mut()
            .expect("begin_function_body without begin_function");
        frame.in_body = true;
    }

    /// Flatten the open frame (signature, prologue, body, epilogue, in that
    /// order) and append it to `globals`.
    pub fn finalize_function(&mut self) {
        let frame = self
            .frames
            .pop()
            .expect("finalize_function without begin_function");
        self.globals.push_str(&frame.signature);
        self.globals.push_str(&frame.prologue);
        self.globals.push_str(&frame.body);
        self.globals.push_str(&frame.epilogue);
    }

    pub fn increase_indent(&mut self) {
        self.indent += 1;
    }

    pub fn decrease_indent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Byte position in the current default target, for `rewind_to`.
    pub fn checkpoint(&self) -> usize {
        self.current_buffer().len()
    }

    pub fn rewind_to(&mut self, checkpoint: usize) {
        let buf = self.current_buffer_mut();
        if checkpoint <= buf.len() {
            buf.truncate(checkpoint);
        }
    }

    /// Drop `suffix` from the tail of the current target if it is there.
    /// The one rewrite the transpiler needs: trimming the `;\n` a declaration
    /// initializer leaves inside a `for` header.
    pub fn strip_trailing(&mut self, suffix: &str) -> bool {
        let buf = self.current_buffer_mut();
        if buf.ends_with(suffix) {
            let new_len = buf.len() - suffix.len();
            buf.truncate(new_len);
            true
        } else {
            false
        }
    }

    /// Read-only view of the current default target.
    pub fn current_text(&self) -> &str {
        self.current_buffer()
    }

    /// Concatenate the deduplicated headers (in canonical order) and the
    /// collected globals into the final translation unit.
    pub fn finalize(mut self) -> String {
        debug_assert!(!self.finalized, "finalize called twice");
        debug_assert!(self.frames.is_empty(), "unfinalized function frame");
        self.finalized = true;
        let mut out = String::new();
        for key in HeaderKey::ALL {
            if self.headers.contains(&key) {
                out.push_str(key.include_line());
                out.push('\n');
            }
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&self.globals);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    fn current_buffer(&self) -> &String {
        match self.frames.last() {
            Some(frame) if frame.in_body => &frame.body,
            Some(frame) => &frame.signature,
            None => &self.globals,
        }
    }

    fn current_buffer_mut(&mut self) -> &mut String {
        match self.frames.last_mut() {
            Some(frame) if frame.in_body => &mut frame.body,
            Some(frame) => &mut frame.signature,
            None => &mut self.globals,
        }
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}
