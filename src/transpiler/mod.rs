mod printf;

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::ast::{BinaryOp, Expr, Literal, PostfixOp, PrefixOp, Program, Stmt, VarDeclarator};
use crate::emitter::{Emitter, HeaderKey};
use crate::memory::{ExitKind, MemoryManager};
use crate::typing::{scoped_key, CType, TypeHelper, TypedefRecord};

/// Every unsupported construct found in one run, joined by newlines when
/// displayed. If any were recorded the emitted C is withheld.
#[derive(Error, Debug)]
#[error("{}", .messages.join("\n"))]
pub struct TranspileError {
    pub messages: Vec<String>,
}

/// Translate one compilation unit into a C89 translation unit, or report
/// every unsupported construct encountered.
pub fn transpile(program: &Program) -> Result<String, TranspileError> {
    Transpiler::new().run(program)
}

/// Recursive AST walker producing C by dispatching on node kind and
/// consulting the type registry and the lifetime plan. Statements write
/// through the emitter's region targets; expressions build strings so they
/// compose.
pub struct Transpiler {
    types: TypeHelper,
    memory: MemoryManager,
    emitter: Emitter,
    errors: Vec<String>,
    scope: String,
}

impl Transpiler {
    pub fn new() -> Self {
        Self {
            types: TypeHelper::new(),
            memory: MemoryManager::new(),
            emitter: Emitter::new(),
            errors: Vec::new(),
            scope: String::new(),
        }
    }

    pub fn run(mut self, program: &Program) -> Result<String, TranspileError> {
        self.types.figure_out_variables_and_types(program);
        self.memory.preprocess(program, &mut self.types);
        if self.memory.has_escapees() {
            // The pointer table is itself a dynamic array of `void *`.
            self.types.ensure_array_tag(&CType::VoidPtr);
        }

        // A buffer registered in the pointer table must not regrow: counted
        // pushes are pre-sized into the physical capacity, and unprovable
        // growth on an escaping array cannot be released safely at exit.
        let mut offenders: Vec<String> = self
            .types
            .unbounded_push_keys()
            .into_iter()
            .filter(|key| self.memory.is_escaping(key))
            .filter_map(|key| self.types.info_by_key(&key).map(|info| info.name.clone()))
            .collect();
        offenders.sort();
        for name in offenders {
            self.report(format!(
                "push inside a loop is not supported on array '{}' because it outlives its function.",
                name
            ));
        }

        self.emit_typedefs();
        self.memory
            .insert_gc_variables_creation_if_necessary(&mut self.emitter);
        self.emit_prototypes(program);

        for stmt in &program.statements {
            if let Stmt::FunctionDeclaration { name, body, .. } = stmt {
                self.emit_function(name, body);
            }
        }
        self.emit_main(program);

        if self.errors.is_empty() {
            Ok(self.emitter.finalize())
        } else {
            Err(TranspileError {
                messages: self.errors,
            })
        }
    }

    fn report(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    // ----------------------------------------------------------------- //
    // Unit-level regions
    // ----------------------------------------------------------------- //

    fn emit_typedefs(&mut self) {
        let typedefs = self.types.typedefs().to_vec();
        for record in typedefs {
            match record {
                TypedefRecord::Struct { name, fields } => {
                    self.emitter.emit(&format!("struct {} {{\n", name));
                    self.emitter.increase_indent();
                    for (field, ctype) in &fields {
                        self.emitter.emit(&format!("{};\n", ctype.declaration(field)));
                    }
                    self.emitter.decrease_indent();
                    self.emitter.emit("};\n\n");
                }
                TypedefRecord::Array { element } => {
                    let tag = crate::typing::array_tag_name(&element);
                    self.emitter.emit(&format!("struct {} {{\n", tag));
                    self.emitter.increase_indent();
                    let data = CType::Pointer(Box::new(element)).declaration("data");
                    self.emitter.emit(&format!("{};\n", data));
                    self.emitter.emit("int16_t size;\n");
                    self.emitter.emit("int16_t capacity;\n");
                    self.emitter.decrease_indent();
                    self.emitter.emit("};\n\n");
                }
            }
        }
    }

    fn emit_prototypes(&mut self, program: &Program) {
        let mut any = false;
        for stmt in &program.statements {
            if let Stmt::FunctionDeclaration { name, .. } = stmt {
                let Some(sig) = self.types.function_sig(name).cloned() else {
                    continue;
                };
                let params = format_parameters(&sig.parameters);
                self.emitter.emit(&format!(
                    "{}{}({});\n",
                    sig.return_type.type_string(),
                    name,
                    params
                ));
                any = true;
            }
        }
        if any {
            self.emitter.emit("\n");
        }
    }

    fn emit_function(&mut self, name: &str, body: &[Stmt]) {
        self.scope = name.to_string();
        let Some(sig) = self.types.function_sig(name).cloned() else {
            return;
        };
        let params = format_parameters(&sig.parameters);
        self.emitter.begin_function();
        self.emitter.emit(&format!(
            "{}{}({}) {{\n",
            sig.return_type.type_string(),
            name,
            params
        ));
        self.emitter.begin_function_body();
        self.emitter.increase_indent();
        for stmt in body {
            self.transpile_stmt(stmt);
        }
        self.emitter.decrease_indent();
        if !matches!(body.last(), Some(Stmt::Return { .. })) {
            self.memory.insert_destructors_if_necessary(
                &self.scope,
                &self.types,
                &mut self.emitter,
                ExitKind::ScopeEnd,
            );
        }
        self.emitter.emit_to_epilogue("}\n\n");
        self.emitter.finalize_function();
        self.scope = String::new();
    }

    /// Top-level statements form the body of the emitted `main`.
    fn emit_main(&mut self, program: &Program) {
        self.scope = String::new();
        self.emitter.begin_function();
        self.emitter.emit("int main(void) {\n");
        self.emitter.begin_function_body();
        self.emitter.increase_indent();
        self.memory.init_global_table(&mut self.emitter);

        let top: Vec<&Stmt> = program
            .statements
            .iter()
            .filter(|s| !matches!(s, Stmt::FunctionDeclaration { .. }))
            .collect();
        for stmt in &top {
            self.transpile_stmt(stmt);
        }
        self.emitter.decrease_indent();
        if !matches!(top.last(), Some(Stmt::Return { .. })) {
            self.memory.insert_destructors_if_necessary(
                "",
                &self.types,
                &mut self.emitter,
                ExitKind::ScopeEnd,
            );
            self.memory
                .release_global_table(&mut self.emitter, ExitKind::ScopeEnd);
            self.emitter.emit_to_epilogue("  return 0;\n");
        }
        self.emitter.emit_to_epilogue("}\n");
        self.emitter.finalize_function();
    }

    // ----------------------------------------------------------------- //
    // Statements
    // ----------------------------------------------------------------- //

    fn transpile_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(e) => self.transpile_expression_statement(e),
            Stmt::VarDeclaration { declarators } => {
                for d in declarators {
                    self.transpile_declarator(d);
                }
            }
            Stmt::Block { .. } => {
                self.transpile_braced(stmt);
                self.emitter.emit("\n");
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.transpile_expr(condition);
                self.emitter.emit(&format!("if ({}) ", cond));
                self.transpile_braced(then_branch);
                if let Some(else_branch) = else_branch {
                    self.emitter.emit(" else ");
                    self.transpile_braced(else_branch);
                }
                self.emitter.emit("\n");
            }
            Stmt::While { condition, body } => {
                let cond = self.transpile_expr(condition);
                self.emitter.emit(&format!("while ({}) ", cond));
                self.transpile_braced(body);
                self.emitter.emit("\n");
            }
            Stmt::DoWhile { body, condition } => {
                self.emitter.emit("do ");
                self.transpile_braced(body);
                let cond = self.transpile_expr(condition);
                self.emitter.emit(&format!(" while ({});\n", cond));
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => self.transpile_for(initializer.as_deref(), condition.as_deref(), increment.as_deref(), body),
            Stmt::ForOf {
                binding,
                iterable,
                body,
            } => self.transpile_for_of(binding, iterable, body),
            Stmt::ForIn { .. } => self.report("For-in statements are not supported."),
            Stmt::Return { value } => {
                // The emitted main returns an int status.
                if self.scope.is_empty() {
                    if let Some(v) = value {
                        let value_type = self.types.expression_type(&self.scope, v);
                        if !matches!(value_type, CType::Int16 | CType::Bool) {
                            self.report("Top-level return values must be numeric.");
                            return;
                        }
                    }
                }
                self.memory.insert_destructors_if_necessary(
                    &self.scope,
                    &self.types,
                    &mut self.emitter,
                    ExitKind::Return,
                );
                if self.scope.is_empty() {
                    self.memory
                        .release_global_table(&mut self.emitter, ExitKind::Return);
                }
                match value {
                    Some(v) => {
                        let code = self.transpile_expr(v);
                        self.emitter.emit(&format!("return {};\n", code));
                    }
                    None if self.scope.is_empty() => self.emitter.emit("return 0;\n"),
                    None => self.emitter.emit("return;\n"),
                }
            }
            Stmt::FunctionDeclaration { .. } => {
                self.report("Nested function declarations are not supported.")
            }
            Stmt::Throw { .. } | Stmt::ClassDeclaration { .. } => {
                self.report(format!("Unsupported statement kind: {}.", stmt.kind_name()))
            }
        }
    }

    /// Bodies always get braces, whether or not the source had them.
    /// Emits `{ ... }` without a trailing newline so `else`/`while` can
    /// follow on the same line.
    fn transpile_braced(&mut self, stmt: &Stmt) {
        self.emitter.emit("{\n");
        self.emitter.increase_indent();
        match stmt {
            Stmt::Block { statements } => {
                for s in statements {
                    self.transpile_stmt(s);
                }
            }
            other => self.transpile_stmt(other),
        }
        self.emitter.decrease_indent();
        self.emitter.emit("}");
    }

    fn transpile_expression_statement(&mut self, e: &Expr) {
        if let Expr::Call { callee, arguments } = e {
            if is_console_log(callee) {
                self.emit_console_log(arguments);
                return;
            }
        }
        if let Expr::Binary {
            left,
            operator: BinaryOp::Assign,
            right,
        } = e
        {
            self.transpile_assignment_statement(left, right);
            return;
        }
        let code = self.transpile_expr(e);
        if !code.is_empty() {
            self.emitter.emit(&format!("{};\n", code));
        }
    }

    // ----------------------------------------------------------------- //
    // Declarations and assignment
    // ----------------------------------------------------------------- //

    /// Declarations always land in the prologue; allocator calls and
    /// initializer assignments land at the declaration site in the body.
    fn transpile_declarator(&mut self, d: &VarDeclarator) {
        let Some(info) = self.types.variable_info(&self.scope, &d.name).cloned() else {
            return;
        };
        let key = scoped_key(&self.scope, &d.name);
        // Owning pointers start at NULL so a release on an exit path that
        // precedes the allocation site is a no-op.
        let declaration = info.ctype.declaration(&d.name);
        let declaration = if info.owns_allocation {
            match &info.ctype {
                CType::Struct { .. } => format!("{} = NULL;\n", declaration),
                CType::Array { dynamic: true, .. } => {
                    format!("{} = {{ NULL, 0, 0 }};\n", declaration)
                }
                _ => format!("{};\n", declaration),
            }
        } else {
            format!("{};\n", declaration)
        };
        self.emitter.emit_once_to_beginning_of_function(&declaration);

        if info.owns_allocation {
            match &info.ctype {
                CType::Array {
                    capacity,
                    dynamic: true,
                    ..
                } => {
                    self.emitter.emit_predefined_header(HeaderKey::Array);
                    self.emitter.emit_predefined_header(HeaderKey::StdlibH);
                    self.emitter.emit_predefined_header(HeaderKey::AssertH);
                    let physical = (capacity * 2).max(4);
                    let logical = self.types.logical_size(&key);
                    self.emitter.emit(&format!(
                        "ARRAY_CREATE({}, {}, {});\n",
                        d.name, physical, logical
                    ));
                    self.memory.insert_global_pointer_if_necessary(
                        &key,
                        &format!("{}.data", d.name),
                        &mut self.emitter,
                    );
                }
                CType::Struct { .. } => {
                    self.emit_struct_allocation(&d.name.clone(), &key);
                }
                _ => {}
            }
        }

        match &d.initializer {
            Some(Expr::ObjectLiteral { properties }) => {
                let target = d.name.clone();
                self.emit_object_fields(&target, properties);
            }
            Some(Expr::ArrayLiteral { elements }) => {
                let elements = elements.clone();
                self.emit_array_elements(&info.ctype, &d.name.clone(), &key, &elements);
            }
            Some(init) => {
                let code = self.transpile_expr(init);
                if !code.is_empty() {
                    self.emitter.emit(&format!("{} = {};\n", d.name, code));
                }
            }
            None => {}
        }
    }

    fn emit_struct_allocation(&mut self, target: &str, gc_key: &str) {
        self.emitter.emit_predefined_header(HeaderKey::StdlibH);
        self.emitter.emit_predefined_header(HeaderKey::AssertH);
        self.emitter
            .emit(&format!("{} = malloc(sizeof(*{}));\n", target, target));
        self.emitter.emit(&format!("assert({} != NULL);\n", target));
        self.memory
            .insert_global_pointer_if_necessary(gc_key, target, &mut self.emitter);
    }

    /// Object literals expand field by field through the struct pointer.
    fn emit_object_fields(&mut self, target: &str, properties: &[(String, Expr)]) {
        for (field, value) in properties {
            if is_aggregate(value) {
                self.report("Nested object and array literals are not supported.");
                continue;
            }
            let code = self.transpile_expr(value);
            if !code.is_empty() {
                self.emitter
                    .emit(&format!("{}->{} = {};\n", target, field, code));
            }
        }
    }

    /// Array literals expand index by index. Elements that are object
    /// literals get their own allocation first.
    fn emit_array_elements(
        &mut self,
        array_type: &CType,
        name: &str,
        gc_key: &str,
        elements: &[Expr],
    ) {
        let CType::Array {
            element, dynamic, ..
        } = array_type
        else {
            return;
        };
        let element = element.clone();
        for (i, value) in elements.iter().enumerate() {
            let slot = if *dynamic {
                format!("{}.data[{}]", name, i)
            } else {
                format!("{}[{}]", name, i)
            };
            match value {
                Expr::ObjectLiteral { properties } if matches!(*element, CType::Struct { .. }) => {
                    self.emit_struct_allocation(&slot, gc_key);
                    self.emit_object_fields(&slot, properties);
                }
                Expr::ObjectLiteral { .. } | Expr::ArrayLiteral { .. } => {
                    self.report("Nested object and array literals are not supported.");
                }
                _ => {
                    let code = self.transpile_expr(value);
                    if !code.is_empty() {
                        self.emitter.emit(&format!("{} = {};\n", slot, code));
                    }
                }
            }
        }
    }

    /// `=` in statement position. `=` anywhere else is rejected by
    /// `transpile_expr`.
    fn transpile_assignment_statement(&mut self, left: &Expr, right: &Expr) {
        match left {
            Expr::Identifier(name) => {
                let info = self.types.variable_info(&self.scope, name).cloned();
                match right {
                    Expr::ObjectLiteral { properties } => {
                        if matches!(info.as_ref().map(|i| &i.ctype), Some(CType::Struct { .. })) {
                            let target = name.clone();
                            self.emit_object_fields(&target, properties);
                        } else {
                            self.report(
                                "Object literals can only be assigned to variables with a reconstructed object type.",
                            );
                        }
                    }
                    Expr::ArrayLiteral { elements } => {
                        let Some(info) = info else {
                            self.report("Left-hand side of assignment is not assignable.");
                            return;
                        };
                        if !info.ctype.is_array() {
                            self.report(
                                "Array literals can only be assigned to variables with a reconstructed array type.",
                            );
                            return;
                        }
                        let key = scoped_key(&self.scope, name);
                        let elements = elements.clone();
                        self.emit_array_elements(&info.ctype, &name.clone(), &key, &elements);
                        if info.ctype.is_dynamic_array() {
                            self.emitter
                                .emit(&format!("{}.size = {};\n", name, elements.len()));
                        }
                    }
                    _ => {
                        let code = self.transpile_expr(right);
                        if !code.is_empty() {
                            self.emitter.emit(&format!("{} = {};\n", name, code));
                        }
                    }
                }
            }
            Expr::Member { .. } | Expr::Index { .. } => {
                if is_aggregate(right) {
                    self.report("Nested object and array literals are not supported.");
                    return;
                }
                let lhs = self.transpile_lvalue(left);
                let Some(lhs) = lhs else {
                    return;
                };
                let code = self.transpile_expr(right);
                if !code.is_empty() {
                    self.emitter.emit(&format!("{} = {};\n", lhs, code));
                }
            }
            _ => self.report("Left-hand side of assignment is not assignable."),
        }
    }

    /// Member and element targets; the `js_get` fallback is not assignable.
    fn transpile_lvalue(&mut self, e: &Expr) -> Option<String> {
        match e {
            Expr::Member { .. } => Some(self.transpile_expr(e)),
            Expr::Index { object, index } => {
                if let Expr::Literal(Literal::String { .. }) = index.as_ref() {
                    return Some(self.transpile_expr(e));
                }
                let object_type = self.types.expression_type(&self.scope, object);
                if object_type.is_array() {
                    Some(self.transpile_expr(e))
                } else {
                    self.report("Left-hand side of assignment is not assignable.");
                    None
                }
            }
            _ => {
                self.report("Left-hand side of assignment is not assignable.");
                None
            }
        }
    }

    // ----------------------------------------------------------------- //
    // Loops
    // ----------------------------------------------------------------- //

    /// C89 takes a single initializer clause. All but the last declarator are
    /// hoisted to standalone statements; the last stays in the header unless
    /// it needs a heap allocation, in which case it is hoisted too and the
    /// initializer slot stays empty.
    fn transpile_for(
        &mut self,
        initializer: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &Stmt,
    ) {
        match initializer {
            Some(Stmt::VarDeclaration { declarators }) if !declarators.is_empty() => {
                let (last, head) = declarators.split_last().expect("nonempty declarators");
                for d in head {
                    self.transpile_declarator(d);
                }
                let hoist = self
                    .types
                    .variable_info(&self.scope, &last.name)
                    .map(|i| i.requires_allocation)
                    .unwrap_or(false);
                if hoist {
                    self.transpile_declarator(last);
                    self.emitter.emit("for (");
                } else {
                    self.emitter.emit("for (");
                    self.transpile_declarator(last);
                    self.emitter.strip_trailing(";\n");
                }
            }
            Some(Stmt::Expression(e)) => {
                let e = e.clone();
                self.emitter.emit("for (");
                if let Expr::Binary {
                    left,
                    operator: BinaryOp::Assign,
                    right,
                } = &e
                {
                    self.transpile_assignment_statement(left, right);
                    self.emitter.strip_trailing(";\n");
                } else {
                    let code = self.transpile_expr(&e);
                    self.emitter.emit(&code);
                }
            }
            Some(other) => {
                self.report(format!(
                    "Unsupported for-loop initializer: {}.",
                    other.kind_name()
                ));
                self.emitter.emit("for (");
            }
            None => self.emitter.emit("for ("),
        }
        self.emitter.emit("; ");
        if let Some(cond) = condition {
            let code = self.transpile_expr(cond);
            self.emitter.emit(&code);
        }
        self.emitter.emit("; ");
        if let Some(inc) = increment {
            let code = self.transpile_expr(inc);
            self.emitter.emit(&code);
        }
        self.emitter.emit(") ");
        self.transpile_braced(body);
        self.emitter.emit("\n");
    }

    /// Lowers to a counted loop with a per-iteration element assignment.
    fn transpile_for_of(&mut self, binding: &str, iterable: &Expr, body: &Stmt) {
        let Expr::Identifier(array_name) = iterable else {
            self.report("For-of requires an identifier naming an array-typed variable.");
            return;
        };
        let Some((element, capacity, dynamic)) =
            self.types
                .variable_info(&self.scope, array_name)
                .and_then(|info| match &info.ctype {
                    CType::Array {
                        element,
                        capacity,
                        dynamic,
                    } => Some(((**element).clone(), *capacity, *dynamic)),
                    _ => None,
                })
        else {
            self.report("For-of requires an identifier naming an array-typed variable.");
            return;
        };

        let counter = self.types.add_new_iterator_variable(&self.scope);
        self.emitter
            .emit_once_to_beginning_of_function(&format!("int16_t {};\n", counter));
        self.emitter
            .emit_once_to_beginning_of_function(&format!("{};\n", element.declaration(binding)));

        let bound = if dynamic {
            format!("{}.size", array_name)
        } else {
            capacity.to_string()
        };
        let slot = if dynamic {
            format!("{}.data[{}]", array_name, counter)
        } else {
            format!("{}[{}]", array_name, counter)
        };
        self.emitter.emit(&format!(
            "for ({c} = 0; {c} < {bound}; {c}++) {{\n",
            c = counter,
            bound = bound
        ));
        self.emitter.increase_indent();
        self.emitter.emit(&format!("{} = {};\n", binding, slot));
        match body {
            Stmt::Block { statements } => {
                for s in statements {
                    self.transpile_stmt(s);
                }
            }
            other => self.transpile_stmt(other),
        }
        self.emitter.decrease_indent();
        self.emitter.emit("}\n");
    }

    // ----------------------------------------------------------------- //
    // Expressions
    // ----------------------------------------------------------------- //

    fn transpile_expr(&mut self, e: &Expr) -> String {
        match e {
            Expr::Identifier(name) => name.clone(),
            Expr::Literal(Literal::Number(n)) => n.to_string(),
            Expr::Literal(Literal::Boolean(b)) => {
                self.emitter.emit_predefined_header(HeaderKey::Bool);
                let constant = if *b { "TRUE" } else { "FALSE" };
                constant.to_string()
            }
            Expr::Literal(Literal::Null) => "NULL".to_string(),
            Expr::Literal(Literal::String { raw, single_quoted }) => {
                format!("\"{}\"", c_string_body(raw, *single_quoted))
            }
            Expr::Binary {
                operator: BinaryOp::Assign,
                ..
            } => {
                self.report("Assignments inside expressions are not yet supported.");
                String::new()
            }
            Expr::Binary {
                left,
                operator,
                right,
            } if matches!(operator, BinaryOp::EqualEqual | BinaryOp::StrictEqual) => {
                let left_type = self.types.expression_type(&self.scope, left);
                let right_type = self.types.expression_type(&self.scope, right);
                let l = self.transpile_expr(left);
                let r = self.transpile_expr(right);
                if left_type == CType::CharPtr && right_type == CType::CharPtr {
                    self.emitter.emit_predefined_header(HeaderKey::StringH);
                    format!("strcmp({}, {}) == 0", l, r)
                } else if left_type != CType::Int16 && right_type != CType::Int16 {
                    self.emitter.emit_predefined_header(HeaderKey::JsEq);
                    format!("js_eq({}, {})", l, r)
                } else {
                    format!("{} == {}", l, r)
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let op = match operator {
                    BinaryOp::Less => "<",
                    BinaryOp::LessEqual => "<=",
                    BinaryOp::Greater => ">",
                    BinaryOp::GreaterEqual => ">=",
                    BinaryOp::Plus => "+",
                    BinaryOp::Minus => "-",
                    BinaryOp::Star => "*",
                    BinaryOp::Slash => "/",
                    other => {
                        self.report(format!("Unsupported operator: {}.", other));
                        return String::new();
                    }
                };
                let l = self.transpile_expr(left);
                let r = self.transpile_expr(right);
                format!("{} {} {}", l, op, r)
            }
            Expr::Prefix { operator, operand } => match operator {
                PrefixOp::Not => {
                    let operand_type = self.types.expression_type(&self.scope, operand);
                    let code = self.transpile_expr(operand);
                    if operand_type == CType::CharPtr {
                        // Empty strings are falsy in the source language.
                        format!("(!{} || !{}[0])", code, code)
                    } else {
                        format!("!{}", code)
                    }
                }
                other => {
                    self.report(format!("Unsupported operator: {}.", other));
                    String::new()
                }
            },
            Expr::Postfix { operator, operand } => {
                let code = self.transpile_expr(operand);
                match operator {
                    PostfixOp::Increment => format!("{}++", code),
                    PostfixOp::Decrement => format!("{}--", code),
                }
            }
            Expr::Call { callee, arguments } => self.transpile_call(callee, arguments),
            Expr::Member { object, property } => {
                let object_type = self.types.expression_type(&self.scope, object);
                let code = self.transpile_expr(object);
                if property == "length" {
                    if let CType::Array {
                        capacity, dynamic, ..
                    } = object_type
                    {
                        return if dynamic {
                            format!("{}.size", code)
                        } else {
                            capacity.to_string()
                        };
                    }
                }
                format!("{}->{}", code, property)
            }
            Expr::Index { object, index } => {
                if let Expr::Literal(Literal::String { raw, .. }) = index.as_ref() {
                    let code = self.transpile_expr(object);
                    return format!("{}->{}", code, raw);
                }
                let object_type = self.types.expression_type(&self.scope, object);
                let code = self.transpile_expr(object);
                let idx = self.transpile_expr(index);
                match object_type {
                    CType::Array { dynamic: true, .. } => format!("{}.data[{}]", code, idx),
                    CType::Array { dynamic: false, .. } => format!("{}[{}]", code, idx),
                    _ => {
                        self.emitter.emit_predefined_header(HeaderKey::JsEq);
                        format!("js_get({}, {})", code, idx)
                    }
                }
            }
            Expr::ArrayLiteral { .. } | Expr::ObjectLiteral { .. } => {
                self.report(
                    "Object and array literals are only supported in variable declarations and assignments.",
                );
                String::new()
            }
        }
    }

    fn transpile_call(&mut self, callee: &Expr, arguments: &[Expr]) -> String {
        if is_console_log(callee) {
            return self.console_log_expression(arguments);
        }
        if let Expr::Member { object, property } = callee {
            let object_type = self.types.expression_type(&self.scope, object);
            if property == "push" && arguments.len() == 1 {
                if let CType::Array { dynamic, .. } = &object_type {
                    if !dynamic {
                        self.report("push is not supported on fixed-capacity arrays.");
                        return String::new();
                    }
                    if is_aggregate(&arguments[0]) {
                        self.report("Nested object and array literals are not supported.");
                        return String::new();
                    }
                    self.emitter.emit_predefined_header(HeaderKey::Array);
                    let target = self.transpile_expr(object);
                    let value = self.transpile_expr(&arguments[0]);
                    return format!("ARRAY_PUSH({}, {})", target, value);
                }
            }
            if property == "pop" && arguments.is_empty() && object_type.is_array() {
                self.emitter.emit_predefined_header(HeaderKey::ArrayPop);
                let target = self.transpile_expr(object);
                return format!("ARRAY_POP({})", target);
            }
        }
        let callee_code = self.transpile_expr(callee);
        let args: Vec<String> = arguments.iter().map(|a| self.transpile_expr(a)).collect();
        format!("{}({})", callee_code, args.join(", "))
    }
}

impl Default for Transpiler {
    fn default() -> Self {
        Self::new()
    }
}

fn format_parameters(parameters: &[(String, CType)]) -> String {
    if parameters.is_empty() {
        return "void".to_string();
    }
    parameters
        .iter()
        .map(|(name, ctype)| ctype.declaration(name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_console_log(callee: &Expr) -> bool {
    matches!(
        callee,
        Expr::Member { object, property }
            if property == "log" && matches!(object.as_ref(), Expr::Identifier(n) if n == "console")
    )
}

fn is_aggregate(e: &Expr) -> bool {
    matches!(e, Expr::ObjectLiteral { .. } | Expr::ArrayLiteral { .. })
}

/// Normalize a source string literal into the body of a C double-quoted
/// literal: single-quoted input has its `\'` escapes unwrapped and any bare
/// `"` escaped; double-quoted input passes through unchanged.
fn c_string_body(raw: &str, single_quoted: bool) -> String {
    if !single_quoted {
        return raw.to_string();
    }
    let mut out = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    out.push('\'');
                } else {
                    out.push('\\');
                }
            }
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}
