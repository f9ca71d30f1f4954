#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use crate::ast::{BinaryOp, Expr, Program, Stmt};
use crate::emitter::{Emitter, HeaderKey};
use crate::typing::{scoped_key, CType, TypeHelper};

/// Which kind of normal control-flow exit a release site sits on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitKind {
    /// An explicit `return`; destructors go inline at the current position.
    Return,
    /// The implicit end of the scope; destructors go to the epilogue.
    ScopeEnd,
}

/// Allocation-lifetime planning.
///
/// `preprocess` classifies every allocation-bearing variable as
/// function-local or escaping; the insert methods then place allocator-table
/// registrations and `free` calls during emission. Escape is a monotone fixed
/// point over a flow-insensitive assignment graph: nodes are variables, an
/// edge X -> Y means X may hold a reference to Y, and the seeds are `return`
/// operands, stores into top-level bindings from inner scopes, and arguments
/// passed to non-builtin calls. When non-escape cannot be proven the value is
/// treated as escaping; this pass never fails.
pub struct MemoryManager {
    /// Scope name -> owning allocation-bearing variable keys, in declaration
    /// order. Releases run in reverse (LIFO).
    allocations: HashMap<String, Vec<String>>,
    escaped: HashSet<String>,
    has_escapees: bool,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self {
            allocations: HashMap::new(),
            escaped: HashSet::new(),
            has_escapees: false,
        }
    }

    pub fn preprocess(&mut self, program: &Program, types: &mut TypeHelper) {
        self.allocations.clear();
        self.escaped.clear();

        let mut edges: Vec<(String, String)> = Vec::new();
        let mut seeds: HashSet<String> = HashSet::new();

        self.scan_stmts("", &program.statements, types, &mut edges, &mut seeds);
        for stmt in &program.statements {
            if let Stmt::FunctionDeclaration { name, body, .. } = stmt {
                self.scan_stmts(name, body, types, &mut edges, &mut seeds);
            }
        }

        self.escaped = seeds;
        let mut changed = true;
        while changed {
            changed = false;
            for (container, value) in &edges {
                if self.escaped.contains(container) && !self.escaped.contains(value) {
                    self.escaped.insert(value.clone());
                    changed = true;
                }
            }
        }

        for key in &self.escaped {
            types.mark_escaping(key);
        }
        self.has_escapees = self.allocations.values().flatten().any(|k| self.escaped.contains(k));
    }

    pub fn has_escapees(&self) -> bool {
        self.has_escapees
    }

    pub fn is_escaping(&self, key: &str) -> bool {
        self.escaped.contains(key)
    }

    /// Declare the file-scope pointer table that tracks escapees. Call with
    /// no function frame open; a no-op when nothing escapes.
    pub fn insert_gc_variables_creation_if_necessary(&self, emitter: &mut Emitter) {
        if self.has_escapees {
            emitter.emit("static struct array_ptr_t gc_global;\n\n");
        }
    }

    /// Create the pointer table's backing storage. Emitted at the top of
    /// `main`'s body.
    pub fn init_global_table(&self, emitter: &mut Emitter) {
        if self.has_escapees {
            emitter.emit_predefined_header(HeaderKey::Array);
            emitter.emit_predefined_header(HeaderKey::StdlibH);
            emitter.emit_predefined_header(HeaderKey::AssertH);
            emitter.emit("ARRAY_CREATE(gc_global, 4, 0);\n");
        }
    }

    /// Register a freshly made allocation in the pointer table, if its
    /// variable escapes. `expression` is the C expression for the raw
    /// pointer being tracked.
    pub fn insert_global_pointer_if_necessary(
        &self,
        key: &str,
        expression: &str,
        emitter: &mut Emitter,
    ) {
        if self.escaped.contains(key) {
            emitter.emit_predefined_header(HeaderKey::Array);
            emitter.emit(&format!("ARRAY_PUSH(gc_global, (void *){});\n", expression));
        }
    }

    /// Emit `free` calls for every non-escaping allocation belonging to
    /// `scope`, in reverse allocation order. A dynamic array's elements are
    /// released before its backing buffer.
    pub fn insert_destructors_if_necessary(
        &self,
        scope: &str,
        types: &TypeHelper,
        emitter: &mut Emitter,
        exit: ExitKind,
    ) {
        let (lines, uses_counter) = self.destructor_lines(scope, types);
        if lines.is_empty() {
            return;
        }
        if uses_counter {
            emitter.emit_once_to_beginning_of_function("int16_t gc_i;\n");
        }
        self.place(&lines, emitter, exit);
    }

    /// Walk the pointer table in insertion order, releasing each entry once,
    /// then the table itself. Emitted before every exit from `main`.
    pub fn release_global_table(&self, emitter: &mut Emitter, exit: ExitKind) {
        if !self.has_escapees {
            return;
        }
        emitter.emit_once_to_beginning_of_function("int16_t gc_i;\n");
        let lines = [
            "for (gc_i = 0; gc_i < gc_global.size; gc_i++) {\n".to_string(),
            "  free(gc_global.data[gc_i]);\n".to_string(),
            "}\n".to_string(),
            "free(gc_global.data);\n".to_string(),
        ];
        self.place(&lines, emitter, exit);
    }

    fn place(&self, lines: &[String], emitter: &mut Emitter, exit: ExitKind) {
        match exit {
            ExitKind::Return => {
                for line in lines {
                    emitter.emit(line);
                }
            }
            ExitKind::ScopeEnd => {
                for line in lines {
                    emitter.emit_to_epilogue(&format!("  {}", line));
                }
            }
        }
    }

    fn destructor_lines(&self, scope: &str, types: &TypeHelper) -> (Vec<String>, bool) {
        let mut lines = Vec::new();
        let mut uses_counter = false;
        let Some(keys) = self.allocations.get(scope) else {
            return (lines, uses_counter);
        };
        for key in keys.iter().rev() {
            if self.escaped.contains(key) {
                continue;
            }
            let Some(info) = types.info_by_key(key) else {
                continue;
            };
            match &info.ctype {
                CType::Struct { .. } => lines.push(format!("free({});\n", info.name)),
                CType::Array {
                    element,
                    dynamic: true,
                    ..
                } => {
                    if matches!(element.as_ref(), CType::Struct { .. }) {
                        uses_counter = true;
                        lines.push(format!(
                            "for (gc_i = 0; gc_i < {}.size; gc_i++) {{\n",
                            info.name
                        ));
                        lines.push(format!("  free({}.data[gc_i]);\n", info.name));
                        lines.push("}\n".to_string());
                    }
                    lines.push(format!("free({}.data);\n", info.name));
                }
                _ => {}
            }
        }
        (lines, uses_counter)
    }

    // ----------------------------------------------------------------- //
    // Preprocess walk
    // ----------------------------------------------------------------- //

    fn scan_stmts(
        &mut self,
        scope: &str,
        stmts: &[Stmt],
        types: &TypeHelper,
        edges: &mut Vec<(String, String)>,
        seeds: &mut HashSet<String>,
    ) {
        for stmt in stmts {
            self.scan_stmt(scope, stmt, types, edges, seeds);
        }
    }

    fn scan_stmt(
        &mut self,
        scope: &str,
        stmt: &Stmt,
        types: &TypeHelper,
        edges: &mut Vec<(String, String)>,
        seeds: &mut HashSet<String>,
    ) {
        match stmt {
            Stmt::VarDeclaration { declarators } => {
                for d in declarators {
                    let key = scoped_key(scope, &d.name);
                    if types
                        .info_by_key(&key)
                        .map(|info| info.owns_allocation)
                        .unwrap_or(false)
                    {
                        self.allocations.entry(scope.to_string()).or_default().push(key.clone());
                    }
                    if let Some(init) = &d.initializer {
                        for source in resolved_idents(scope, init, types) {
                            edges.push((key.clone(), source));
                        }
                    }
                }
            }
            Stmt::Expression(e) => self.scan_expr(scope, e, types, edges, seeds),
            Stmt::Return { value } => {
                if let Some(v) = value {
                    for source in resolved_idents(scope, v, types) {
                        seeds.insert(source);
                    }
                }
            }
            Stmt::Block { statements } => self.scan_stmts(scope, statements, types, edges, seeds),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.scan_expr(scope, condition, types, edges, seeds);
                self.scan_stmt(scope, then_branch, types, edges, seeds);
                if let Some(e) = else_branch {
                    self.scan_stmt(scope, e, types, edges, seeds);
                }
            }
            Stmt::While { condition, body } | Stmt::DoWhile { body, condition } => {
                self.scan_expr(scope, condition, types, edges, seeds);
                self.scan_stmt(scope, body, types, edges, seeds);
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                if let Some(init) = initializer {
                    self.scan_stmt(scope, init, types, edges, seeds);
                }
                if let Some(cond) = condition {
                    self.scan_expr(scope, cond, types, edges, seeds);
                }
                if let Some(inc) = increment {
                    self.scan_expr(scope, inc, types, edges, seeds);
                }
                self.scan_stmt(scope, body, types, edges, seeds);
            }
            Stmt::ForOf { iterable, body, .. } => {
                self.scan_expr(scope, iterable, types, edges, seeds);
                self.scan_stmt(scope, body, types, edges, seeds);
            }
            Stmt::ForIn { body, .. } => self.scan_stmt(scope, body, types, edges, seeds),
            Stmt::Throw { value } => self.scan_expr(scope, value, types, edges, seeds),
            Stmt::FunctionDeclaration { .. } | Stmt::ClassDeclaration { .. } => {}
        }
    }

    fn scan_expr(
        &mut self,
        scope: &str,
        e: &Expr,
        types: &TypeHelper,
        edges: &mut Vec<(String, String)>,
        seeds: &mut HashSet<String>,
    ) {
        match e {
            Expr::Binary {
                left,
                operator: BinaryOp::Assign,
                right,
            } => {
                let target = match left.as_ref() {
                    Expr::Identifier(name) => types.resolve_key(scope, name),
                    // A store through a field or element keeps the value
                    // alive as long as the container.
                    Expr::Member { object, .. } | Expr::Index { object, .. } => {
                        match object.as_ref() {
                            Expr::Identifier(name) => types.resolve_key(scope, name),
                            _ => None,
                        }
                    }
                    _ => None,
                };
                let sources = resolved_idents(scope, right, types);
                if let Some(target) = target {
                    // Storing into a binding that outlives this activation
                    // makes the stored allocation escape outright.
                    let crosses_out = scope != "" && target.starts_with('.');
                    for source in sources {
                        if crosses_out {
                            seeds.insert(source.clone());
                        }
                        edges.push((target.clone(), source));
                    }
                }
                self.scan_expr(scope, right, types, edges, seeds);
            }
            Expr::Call { callee, arguments } => {
                if let Expr::Member { object, property } = callee.as_ref() {
                    if property == "push" && arguments.len() == 1 {
                        if let Expr::Identifier(name) = object.as_ref() {
                            if let Some(target) = types.resolve_key(scope, name) {
                                for source in resolved_idents(scope, &arguments[0], types) {
                                    edges.push((target.clone(), source));
                                }
                            }
                        }
                    }
                }
                // A callee may store what it receives; arguments to
                // non-builtin calls escape.
                if !is_builtin_callee(callee) {
                    for a in arguments {
                        for source in resolved_idents(scope, a, types) {
                            seeds.insert(source);
                        }
                    }
                }
                for a in arguments {
                    self.scan_expr(scope, a, types, edges, seeds);
                }
            }
            Expr::Binary { left, right, .. } => {
                self.scan_expr(scope, left, types, edges, seeds);
                self.scan_expr(scope, right, types, edges, seeds);
            }
            Expr::Prefix { operand, .. } | Expr::Postfix { operand, .. } => {
                self.scan_expr(scope, operand, types, edges, seeds)
            }
            Expr::Member { object, .. } => self.scan_expr(scope, object, types, edges, seeds),
            Expr::Index { object, index } => {
                self.scan_expr(scope, object, types, edges, seeds);
                self.scan_expr(scope, index, types, edges, seeds);
            }
            Expr::ArrayLiteral { elements } => {
                for el in elements {
                    self.scan_expr(scope, el, types, edges, seeds);
                }
            }
            Expr::ObjectLiteral { properties } => {
                for (_, v) in properties {
                    self.scan_expr(scope, v, types, edges, seeds);
                }
            }
            Expr::Identifier(_) | Expr::Literal(_) => {}
        }
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Builtin call patterns the transpiler intercepts; their arguments never
/// flow into user code.
fn is_builtin_callee(callee: &Expr) -> bool {
    match callee {
        Expr::Member { object, property } => {
            property == "push"
                || property == "pop"
                || (property == "log"
                    && matches!(object.as_ref(), Expr::Identifier(n) if n == "console"))
        }
        _ => false,
    }
}

/// Every identifier inside `e` that resolves to a registered variable,
/// as scoped keys. Over-collection is safe: it can only delay a release to
/// program exit, never lose one.
fn resolved_idents(scope: &str, e: &Expr, types: &TypeHelper) -> Vec<String> {
    let mut names = Vec::new();
    collect_idents(e, &mut names);
    names
        .into_iter()
        .filter_map(|n| types.resolve_key(scope, &n))
        .collect()
}

fn collect_idents(e: &Expr, out: &mut Vec<String>) {
    match e {
        Expr::Identifier(name) => out.push(name.clone()),
        Expr::Literal(_) => {}
        Expr::Binary { left, right, .. } => {
            collect_idents(left, out);
            collect_idents(right, out);
        }
        Expr::Prefix { operand, .. } | Expr::Postfix { operand, .. } => {
            collect_idents(operand, out)
        }
        Expr::Call { callee, arguments } => {
            collect_idents(callee, out);
            for a in arguments {
                collect_idents(a, out);
            }
        }
        Expr::Member { object, .. } => collect_idents(object, out),
        Expr::Index { object, index } => {
            collect_idents(object, out);
            collect_idents(index, out);
        }
        Expr::ArrayLiteral { elements } => {
            for el in elements {
                collect_idents(el, out);
            }
        }
        Expr::ObjectLiteral { properties } => {
            for (_, v) in properties {
                collect_idents(v, out);
            }
        }
    }
}
