//! Format-string synthesis for `console.log`.
//!
//! Formats are built from static type information: `%d` for `int16_t` and
//! booleans, `%s` for `char *`, `%p` for values the reconstruction gave up
//! on. Literal string fragments fold into the format; struct values render
//! recursively as `{ a: 1, b: "x" }`; fixed arrays unroll into the format.
//! A dynamic array has no statically known length, so in statement position
//! it prints through a bounded loop of `printf` calls instead of one call.

use crate::ast::{Expr, Literal};
use crate::emitter::HeaderKey;
use crate::typing::CType;

use super::{c_string_body, Transpiler};

#[derive(Default)]
struct PrintfPieces {
    format: String,
    values: Vec<String>,
}

impl Transpiler {
    /// `console.log(...)` in statement position.
    pub(super) fn emit_console_log(&mut self, arguments: &[Expr]) {
        self.emitter.emit_predefined_header(HeaderKey::StdioH);
        let mut pieces = PrintfPieces::default();
        let mut first = true;
        for arg in arguments {
            if !first {
                pieces.format.push(' ');
            }
            first = false;
            if let Expr::Literal(Literal::String { raw, single_quoted }) = arg {
                pieces
                    .format
                    .push_str(&c_string_body(raw, *single_quoted).replace('%', "%%"));
                continue;
            }
            let arg_type = self.types.expression_type(&self.scope, arg);
            if let CType::Array {
                element,
                dynamic: true,
                ..
            } = &arg_type
            {
                let element = (**element).clone();
                let code = self.transpile_expr(arg);
                self.flush_printf(&mut pieces);
                self.emit_dynamic_array_print(&element, &code);
                continue;
            }
            let code = self.transpile_expr(arg);
            self.render_value(&arg_type, &code, &mut pieces, false);
        }
        pieces.format.push_str("\\n");
        self.flush_printf(&mut pieces);
    }

    /// `console.log(...)` in expression position must stay a single call, so
    /// dynamic arrays degrade to a `[...]` placeholder.
    pub(super) fn console_log_expression(&mut self, arguments: &[Expr]) -> String {
        self.emitter.emit_predefined_header(HeaderKey::StdioH);
        let mut pieces = PrintfPieces::default();
        let mut first = true;
        for arg in arguments {
            if !first {
                pieces.format.push(' ');
            }
            first = false;
            if let Expr::Literal(Literal::String { raw, single_quoted }) = arg {
                pieces
                    .format
                    .push_str(&c_string_body(raw, *single_quoted).replace('%', "%%"));
                continue;
            }
            let arg_type = self.types.expression_type(&self.scope, arg);
            let code = self.transpile_expr(arg);
            self.render_value(&arg_type, &code, &mut pieces, false);
        }
        pieces.format.push_str("\\n");
        format_printf(&pieces)
    }

    /// Append the rendering of one typed value to the format/argument pair.
    /// `quoted` controls whether strings print inside quotes, which they do
    /// inside struct and array renderings but not at top level.
    fn render_value(&mut self, ctype: &CType, code: &str, pieces: &mut PrintfPieces, quoted: bool) {
        match ctype {
            CType::Int16 | CType::Bool => {
                pieces.format.push_str("%d");
                pieces.values.push(code.to_string());
            }
            CType::CharPtr => {
                if quoted {
                    pieces.format.push_str("\\\"%s\\\"");
                } else {
                    pieces.format.push_str("%s");
                }
                pieces.values.push(code.to_string());
            }
            CType::Struct { fields, .. } => {
                pieces.format.push_str("{ ");
                for (i, (name, field_type)) in fields.iter().enumerate() {
                    if i > 0 {
                        pieces.format.push_str(", ");
                    }
                    pieces.format.push_str(name);
                    pieces.format.push_str(": ");
                    self.render_value(field_type, &format!("{}->{}", code, name), pieces, true);
                }
                pieces.format.push_str(" }");
            }
            CType::Array {
                element,
                capacity,
                dynamic: false,
            } => {
                pieces.format.push('[');
                for i in 0..*capacity {
                    if i > 0 {
                        pieces.format.push_str(", ");
                    }
                    self.render_value(element, &format!("{}[{}]", code, i), pieces, true);
                }
                pieces.format.push(']');
            }
            CType::Array { dynamic: true, .. } => {
                // No static bound to unroll against.
                pieces.format.push_str("[...]");
            }
            CType::VoidPtr | CType::Pointer(_) | CType::Void => {
                pieces.format.push_str("%p");
                pieces.values.push(code.to_string());
            }
        }
    }

    /// Element-by-element printing for a runtime-sized array.
    fn emit_dynamic_array_print(&mut self, element: &CType, code: &str) {
        let counter = self.types.add_new_iterator_variable(&self.scope);
        self.emitter
            .emit_once_to_beginning_of_function(&format!("int16_t {};\n", counter));
        self.emitter.emit("printf(\"[\");\n");
        self.emitter.emit(&format!(
            "for ({c} = 0; {c} < {arr}.size; {c}++) {{\n",
            c = counter,
            arr = code
        ));
        self.emitter.increase_indent();
        self.emitter
            .emit(&format!("if ({} > 0) printf(\", \");\n", counter));
        let mut pieces = PrintfPieces::default();
        self.render_value(
            element,
            &format!("{}.data[{}]", code, counter),
            &mut pieces,
            true,
        );
        self.flush_printf(&mut pieces);
        self.emitter.decrease_indent();
        self.emitter.emit("}\n");
        self.emitter.emit("printf(\"]\");\n");
    }

    fn flush_printf(&mut self, pieces: &mut PrintfPieces) {
        if pieces.format.is_empty() && pieces.values.is_empty() {
            return;
        }
        let call = format_printf(pieces);
        self.emitter.emit(&format!("{};\n", call));
        pieces.format.clear();
        pieces.values.clear();
    }
}

fn format_printf(pieces: &PrintfPieces) -> String {
    if pieces.values.is_empty() {
        format!("printf(\"{}\")", pieces.format)
    } else {
        format!("printf(\"{}\", {})", pieces.format, pieces.values.join(", "))
    }
}
