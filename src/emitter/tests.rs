#[cfg(test)]
mod tests {
    use crate::emitter::{Emitter, HeaderKey};

    #[test]
    fn test_indentation_applies_at_line_starts() {
        let mut emitter = Emitter::new();
        emitter.emit("int main(void) {\n");
        emitter.increase_indent();
        emitter.emit("x = 1;\n");
        emitter.emit("y = ");
        emitter.emit("2;\n");
        emitter.decrease_indent();
        emitter.emit("}\n");
        assert_eq!(
            emitter.finalize(),
            "int main(void) {\n  x = 1;\n  y = 2;\n}\n"
        );
    }

    #[test]
    fn test_indent_never_goes_negative() {
        let mut emitter = Emitter::new();
        emitter.decrease_indent();
        emitter.decrease_indent();
        emitter.emit("x;\n");
        assert_eq!(emitter.finalize(), "x;\n");
    }

    #[test]
    fn test_headers_are_deduplicated_and_precede_globals() {
        let mut emitter = Emitter::new();
        emitter.emit("int x;\n");
        emitter.emit_predefined_header(HeaderKey::StdlibH);
        emitter.emit_predefined_header(HeaderKey::StdioH);
        emitter.emit_predefined_header(HeaderKey::StdioH);
        let out = emitter.finalize();
        assert_eq!(out.matches("#include <stdio.h>").count(), 1);
        assert_eq!(out.matches("#include <stdlib.h>").count(), 1);
        // Canonical order, all before any non-header text.
        let stdio = out.find("#include <stdio.h>").unwrap();
        let stdlib = out.find("#include <stdlib.h>").unwrap();
        let global = out.find("int x;").unwrap();
        assert!(stdio < stdlib && stdlib < global);
    }

    #[test]
    fn test_function_frame_flattens_in_region_order() {
        let mut emitter = Emitter::new();
        emitter.begin_function();
        emitter.emit("void f(void) {\n");
        emitter.begin_function_body();
        emitter.emit_to_beginning_of_function("int16_t a;\n");
        emitter.increase_indent();
        emitter.emit("a = 1;\n");
        emitter.decrease_indent();
        emitter.emit_to_epilogue("  free(a);\n");
        emitter.emit_to_epilogue("}\n");
        emitter.finalize_function();
        assert_eq!(
            emitter.finalize(),
            "void f(void) {\n  int16_t a;\n  a = 1;\n  free(a);\n}\n"
        );
    }

    #[test]
    fn test_emit_once_suppresses_duplicates() {
        let mut emitter = Emitter::new();
        emitter.begin_function();
        emitter.emit("void f(void) {\n");
        emitter.begin_function_body();
        emitter.emit_once_to_beginning_of_function("int16_t iterator_1;\n");
        emitter.emit_once_to_beginning_of_function("int16_t iterator_1;\n");
        emitter.emit_to_epilogue("}\n");
        emitter.finalize_function();
        let out = emitter.finalize();
        assert_eq!(out.matches("int16_t iterator_1;").count(), 1);
    }

    #[test]
    fn test_strip_trailing_rewrites_the_tail() {
        let mut emitter = Emitter::new();
        emitter.begin_function();
        emitter.emit("void f(void) {\n");
        emitter.begin_function_body();
        emitter.increase_indent();
        emitter.emit("for (");
        emitter.emit("i = 0;\n");
        assert!(emitter.strip_trailing(";\n"));
        assert!(!emitter.strip_trailing(";\n"));
        emitter.emit("; i < 3; i++) {\n");
        emitter.emit("}\n");
        emitter.decrease_indent();
        emitter.emit_to_epilogue("}\n");
        emitter.finalize_function();
        let out = emitter.finalize();
        assert!(out.contains("for (i = 0; i < 3; i++) {"));
    }

    #[test]
    fn test_checkpoint_and_rewind() {
        let mut emitter = Emitter::new();
        emitter.emit("keep");
        let checkpoint = emitter.checkpoint();
        emitter.emit(" drop");
        emitter.rewind_to(checkpoint);
        assert_eq!(emitter.current_text(), "keep");
    }
}
