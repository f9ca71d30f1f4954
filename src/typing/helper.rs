use std::collections::{HashMap, HashSet};

use crate::ast::{
    BinaryOp, Expr, Literal, Parameter, PostfixOp, PrefixOp, Program, Stmt, TypeAnn, VarDeclarator,
};

use super::ctype::{array_tag_name, CType};
use super::variable::{FunctionSig, TypedefRecord, VariableInfo};

/// Whole-unit type reconstruction.
///
/// One pre-pass walk assigns every named binding a `CType` and an allocation
/// hint; later passes only query. Variables are keyed by scope-qualified name
/// (`<function>.<name>`, with an empty function component for top level).
pub struct TypeHelper {
    registry: HashMap<String, VariableInfo>,
    functions: HashMap<String, FunctionSig>,
    struct_shapes: HashMap<String, String>,
    struct_defs: HashMap<String, Vec<(String, CType)>>,
    typedefs: Vec<TypedefRecord>,
    array_tags: HashSet<String>,
    logical_sizes: HashMap<String, i64>,
    /// Arrays that started as `[]` and still await an element type.
    untyped_elements: HashSet<String>,
    /// Arrays whose capacity bound a loop `push` made unprovable.
    unbounded_pushes: HashSet<String>,
    iterator_counter: usize,
}

pub fn scoped_key(scope: &str, name: &str) -> String {
    format!("{}.{}", scope, name)
}

impl TypeHelper {
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
            functions: HashMap::new(),
            struct_shapes: HashMap::new(),
            struct_defs: HashMap::new(),
            typedefs: Vec::new(),
            array_tags: HashSet::new(),
            logical_sizes: HashMap::new(),
            untyped_elements: HashSet::new(),
            unbounded_pushes: HashSet::new(),
            iterator_counter: 0,
        }
    }

    /// Populate the registry for the whole compilation unit. Rebuilds from
    /// scratch, so calling it twice yields the same state.
    ///
    /// The collection runs twice: return types reconstructed from function
    /// bodies in the first round may retype top-level bindings initialized by
    /// calls, so the second round re-collects with the refined signatures in
    /// place.
    pub fn figure_out_variables_and_types(&mut self, program: &Program) {
        self.reset();
        self.collect_signatures(program);
        self.collect_unit(program);

        let refined: HashMap<String, CType> = self
            .functions
            .iter()
            .map(|(name, sig)| (name.clone(), sig.return_type.clone()))
            .collect();
        self.reset();
        self.collect_signatures(program);
        for stmt in &program.statements {
            if let Stmt::FunctionDeclaration {
                name,
                return_type: None,
                ..
            } = stmt
            {
                if let (Some(sig), Some(found)) =
                    (self.functions.get_mut(name), refined.get(name))
                {
                    sig.return_type = found.clone();
                }
            }
        }
        self.collect_unit(program);
    }

    fn reset(&mut self) {
        self.registry.clear();
        self.functions.clear();
        self.struct_shapes.clear();
        self.struct_defs.clear();
        self.typedefs.clear();
        self.array_tags.clear();
        self.logical_sizes.clear();
        self.untyped_elements.clear();
        self.unbounded_pushes.clear();
        self.iterator_counter = 0;
    }

    /// Signatures first, so calls type-check in any order.
    fn collect_signatures(&mut self, program: &Program) {
        for stmt in &program.statements {
            if let Stmt::FunctionDeclaration {
                name,
                parameters,
                return_type,
                ..
            } = stmt
            {
                let sig = self.signature_from_annotations(parameters, return_type.as_ref());
                self.functions.insert(name.clone(), sig);
            }
        }
    }

    fn collect_unit(&mut self, program: &Program) {
        // Top-level bindings, so function bodies can see globals.
        self.walk_stmts("", &program.statements, 0);

        // Function bodies, refining unannotated return types from the first
        // typed return expression.
        for stmt in &program.statements {
            if let Stmt::FunctionDeclaration {
                name,
                parameters,
                return_type,
                body,
            } = stmt
            {
                for param in parameters {
                    let ctype = self
                        .functions
                        .get(name)
                        .and_then(|sig| {
                            sig.parameters
                                .iter()
                                .find(|(p, _)| p == &param.name)
                                .map(|(_, t)| t.clone())
                        })
                        .unwrap_or(CType::VoidPtr);
                    self.register_variable(name, &param.name, ctype, false);
                }
                self.walk_stmts(name, body, 0);
                if return_type.is_none() {
                    if let Some(found) = self.find_return_type(name, body) {
                        if found != CType::VoidPtr {
                            if let Some(sig) = self.functions.get_mut(name) {
                                sig.return_type = found;
                            }
                        }
                    }
                }
            }
        }

        // Arrays that never learned an element type fall back to `void *`.
        let pending: Vec<String> = self.untyped_elements.drain().collect();
        for key in pending {
            if let Some(info) = self.registry.get(&key) {
                if info.ctype.is_dynamic_array() {
                    self.ensure_array_tag(&CType::VoidPtr);
                }
            }
        }
    }

    /// Map a source-level annotation onto its C representation.
    pub fn convert_type(&mut self, ann: &TypeAnn) -> CType {
        match ann {
            TypeAnn::Number => CType::Int16,
            TypeAnn::Boolean => CType::Bool,
            TypeAnn::String => CType::CharPtr,
            TypeAnn::Any => CType::VoidPtr,
            TypeAnn::Array { element, capacity } => {
                let element = self.convert_type(element);
                match capacity {
                    Some(n) => CType::Array {
                        element: Box::new(element),
                        capacity: *n,
                        dynamic: false,
                    },
                    None => {
                        self.ensure_array_tag(&element);
                        CType::Array {
                            element: Box::new(element),
                            capacity: 0,
                            dynamic: true,
                        }
                    }
                }
            }
            TypeAnn::Object { fields } => {
                let fields: Vec<(String, CType)> = fields
                    .iter()
                    .map(|(n, t)| (n.clone(), self.convert_type(t)))
                    .collect();
                self.intern_struct("obj", fields)
            }
        }
    }

    pub fn variable_info(&self, scope: &str, name: &str) -> Option<&VariableInfo> {
        self.registry
            .get(&scoped_key(scope, name))
            .or_else(|| self.registry.get(&scoped_key("", name)))
    }

    /// Resolve an identifier to the scoped key its info is registered under.
    pub fn resolve_key(&self, scope: &str, name: &str) -> Option<String> {
        let local = scoped_key(scope, name);
        if self.registry.contains_key(&local) {
            return Some(local);
        }
        let global = scoped_key("", name);
        if self.registry.contains_key(&global) {
            return Some(global);
        }
        None
    }

    pub fn info_by_key(&self, key: &str) -> Option<&VariableInfo> {
        self.registry.get(key)
    }

    pub fn mark_escaping(&mut self, key: &str) {
        if let Some(info) = self.registry.get_mut(key) {
            info.escapes = true;
        }
    }

    /// Unique, stable name for a generated `int16_t` loop counter. Uniqueness
    /// scope is the whole translation unit.
    pub fn add_new_iterator_variable(&mut self, scope: &str) -> String {
        self.iterator_counter += 1;
        let name = format!("iterator_{}", self.iterator_counter);
        self.register_variable(scope, &name, CType::Int16, false);
        name
    }

    pub fn function_sig(&self, name: &str) -> Option<&FunctionSig> {
        self.functions.get(name)
    }

    /// Aggregate definitions in first-seen (dependency-safe) order.
    pub fn typedefs(&self) -> &[TypedefRecord] {
        &self.typedefs
    }

    /// Initializer length of a dynamic array, zero when it had none.
    pub fn logical_size(&self, key: &str) -> i64 {
        self.logical_sizes.get(key).copied().unwrap_or(0)
    }

    /// Keys of arrays pushed to under a loop, where no capacity bound could
    /// be proven.
    pub fn unbounded_push_keys(&self) -> Vec<String> {
        self.unbounded_pushes.iter().cloned().collect()
    }

    pub fn ensure_array_tag(&mut self, element: &CType) {
        let tag = array_tag_name(element);
        if self.array_tags.insert(tag) {
            self.typedefs.push(TypedefRecord::Array {
                element: element.clone(),
            });
        }
    }

    /// The type of an expression, as far as the reconstruction can tell.
    pub fn expression_type(&self, scope: &str, e: &Expr) -> CType {
        match e {
            Expr::Identifier(name) => self
                .variable_info(scope, name)
                .map(|info| info.ctype.clone())
                .unwrap_or(CType::VoidPtr),
            Expr::Literal(Literal::Number(_)) => CType::Int16,
            Expr::Literal(Literal::String { .. }) => CType::CharPtr,
            Expr::Literal(Literal::Boolean(_)) => CType::Bool,
            Expr::Literal(Literal::Null) => CType::VoidPtr,
            Expr::Binary { operator, left, .. } => match operator {
                BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
                | BinaryOp::EqualEqual
                | BinaryOp::StrictEqual
                | BinaryOp::NotEqual
                | BinaryOp::And
                | BinaryOp::Or => CType::Bool,
                BinaryOp::Assign => self.expression_type(scope, left),
                _ => CType::Int16,
            },
            Expr::Prefix { operator, .. } => match operator {
                PrefixOp::Not => CType::Bool,
                PrefixOp::Negate => CType::Int16,
                PrefixOp::TypeOf => CType::CharPtr,
            },
            Expr::Postfix { operator, .. } => match operator {
                PostfixOp::Increment | PostfixOp::Decrement => CType::Int16,
            },
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Member { object, property } if property == "pop" => {
                    match self.expression_type(scope, object) {
                        CType::Array { element, .. } => *element,
                        _ => CType::VoidPtr,
                    }
                }
                Expr::Identifier(fname) => self
                    .functions
                    .get(fname)
                    .map(|sig| sig.return_type.clone())
                    .unwrap_or(CType::VoidPtr),
                _ => CType::VoidPtr,
            },
            Expr::Member { object, property } => {
                let object_type = self.expression_type(scope, object);
                if property == "length" && object_type.is_array() {
                    return CType::Int16;
                }
                match object_type {
                    CType::Struct { fields, .. } => fields
                        .iter()
                        .find(|(n, _)| n == property)
                        .map(|(_, t)| t.clone())
                        .unwrap_or(CType::VoidPtr),
                    _ => CType::VoidPtr,
                }
            }
            Expr::Index { object, index } => {
                let object_type = self.expression_type(scope, object);
                if let (
                    Expr::Literal(Literal::String { raw, .. }),
                    CType::Struct { fields, .. },
                ) = (index.as_ref(), &object_type)
                {
                    return fields
                        .iter()
                        .find(|(n, _)| n == raw)
                        .map(|(_, t)| t.clone())
                        .unwrap_or(CType::VoidPtr);
                }
                match object_type {
                    CType::Array { element, .. } => *element,
                    _ => CType::VoidPtr,
                }
            }
            Expr::ArrayLiteral { elements } => {
                let element = self.unify_elements(scope, elements);
                CType::Array {
                    element: Box::new(element),
                    capacity: elements.len() as i64,
                    dynamic: true,
                }
            }
            Expr::ObjectLiteral { properties } => {
                if properties.is_empty() {
                    return CType::VoidPtr;
                }
                let fields: Vec<(String, CType)> = properties
                    .iter()
                    .map(|(n, v)| (n.clone(), self.expression_type(scope, v)))
                    .collect();
                match self.struct_shapes.get(&shape_key(&fields)) {
                    Some(name) => CType::Struct {
                        name: name.clone(),
                        fields: self.struct_defs.get(name).cloned().unwrap_or(fields),
                    },
                    None => CType::VoidPtr,
                }
            }
        }
    }

    // ----------------------------------------------------------------- //
    // Pre-pass internals
    // ----------------------------------------------------------------- //

    fn signature_from_annotations(
        &mut self,
        parameters: &[Parameter],
        return_type: Option<&TypeAnn>,
    ) -> FunctionSig {
        let parameters = parameters
            .iter()
            .map(|p| {
                let ctype = p
                    .type_ann
                    .as_ref()
                    .map(|ann| self.convert_type(ann))
                    .unwrap_or(CType::VoidPtr);
                (p.name.clone(), ctype)
            })
            .collect();
        let return_type = return_type
            .map(|ann| self.convert_type(ann))
            .unwrap_or(CType::Void);
        FunctionSig {
            parameters,
            return_type,
        }
    }

    fn register_variable(&mut self, scope: &str, name: &str, ctype: CType, owns: bool) {
        let key = scoped_key(scope, name);
        let requires_allocation =
            matches!(ctype, CType::Struct { .. }) || ctype.is_dynamic_array();
        let info = VariableInfo {
            name: name.to_string(),
            is_dynamic_array: ctype.is_dynamic_array(),
            requires_allocation,
            owns_allocation: owns && requires_allocation,
            ctype,
            escapes: false,
        };
        self.registry.insert(key, info);
    }

    fn walk_stmts(&mut self, scope: &str, stmts: &[Stmt], loop_depth: usize) {
        for stmt in stmts {
            self.walk_stmt(scope, stmt, loop_depth);
        }
    }

    fn walk_stmt(&mut self, scope: &str, stmt: &Stmt, loop_depth: usize) {
        match stmt {
            Stmt::Expression(e) => self.walk_expr(scope, e, loop_depth, None),
            Stmt::VarDeclaration { declarators } => {
                for d in declarators {
                    self.declare(scope, d, loop_depth);
                }
            }
            // Function declarations are only valid at top level and are
            // walked separately; nested ones are the transpiler's problem.
            Stmt::FunctionDeclaration { .. } => {}
            Stmt::Block { statements } => self.walk_stmts(scope, statements, loop_depth),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.walk_expr(scope, condition, loop_depth, None);
                self.walk_stmt(scope, then_branch, loop_depth);
                if let Some(e) = else_branch {
                    self.walk_stmt(scope, e, loop_depth);
                }
            }
            Stmt::While { condition, body } | Stmt::DoWhile { body, condition } => {
                self.walk_expr(scope, condition, loop_depth + 1, None);
                self.walk_stmt(scope, body, loop_depth + 1);
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                if let Some(init) = initializer {
                    self.walk_stmt(scope, init, loop_depth);
                }
                if let Some(cond) = condition {
                    self.walk_expr(scope, cond, loop_depth + 1, None);
                }
                if let Some(inc) = increment {
                    self.walk_expr(scope, inc, loop_depth + 1, None);
                }
                self.walk_stmt(scope, body, loop_depth + 1);
            }
            Stmt::ForOf {
                binding,
                iterable,
                body,
            } => {
                if let Expr::Identifier(name) = iterable.as_ref() {
                    if let Some(info) = self.variable_info(scope, name) {
                        if let CType::Array { element, .. } = &info.ctype {
                            let element = (**element).clone();
                            self.register_variable(scope, binding, element, false);
                        }
                    }
                }
                self.walk_stmt(scope, body, loop_depth + 1);
            }
            Stmt::ForIn { body, .. } => self.walk_stmt(scope, body, loop_depth + 1),
            Stmt::Return { value } => {
                if let Some(v) = value {
                    self.walk_expr(scope, v, loop_depth, None);
                }
            }
            Stmt::Throw { value } => self.walk_expr(scope, value, loop_depth, None),
            Stmt::ClassDeclaration { .. } => {}
        }
    }

    fn declare(&mut self, scope: &str, d: &VarDeclarator, loop_depth: usize) {
        let key = scoped_key(scope, &d.name);
        let ctype = if let Some(ann) = &d.type_ann {
            self.convert_type(ann)
        } else if let Some(init) = &d.initializer {
            match self.reconstruct(scope, init, &d.name, loop_depth) {
                // A call to a void function as initializer; `void q;` would
                // not be a declaration.
                CType::Void => CType::VoidPtr,
                other => other,
            }
        } else {
            CType::VoidPtr
        };

        if let Some(Expr::ArrayLiteral { elements }) = &d.initializer {
            self.logical_sizes.insert(key.clone(), elements.len() as i64);
            if elements.is_empty() && d.type_ann.is_none() {
                self.untyped_elements.insert(key.clone());
            }
        }

        let owns = match &d.initializer {
            None => true,
            Some(Expr::ArrayLiteral { .. }) | Some(Expr::ObjectLiteral { .. }) => true,
            Some(_) => false,
        };
        self.register_variable(scope, &d.name, ctype, owns);
    }

    /// Type an initializer, interning any aggregate shapes it introduces.
    fn reconstruct(&mut self, scope: &str, e: &Expr, hint: &str, loop_depth: usize) -> CType {
        match e {
            Expr::ArrayLiteral { elements } => {
                for el in elements {
                    self.walk_expr(scope, el, loop_depth, Some(hint));
                }
                let element = match elements.first() {
                    Some(Expr::ObjectLiteral { .. }) => {
                        self.reconstruct(scope, &elements[0], hint, loop_depth)
                    }
                    Some(_) => self.unify_elements(scope, elements),
                    None => CType::VoidPtr,
                };
                // An empty literal has no element type yet; its tag is
                // settled by a later push or by the void* fallback.
                if !elements.is_empty() {
                    self.ensure_array_tag(&element);
                }
                CType::Array {
                    element: Box::new(element),
                    capacity: elements.len() as i64,
                    dynamic: true,
                }
            }
            Expr::ObjectLiteral { properties } => {
                if properties.is_empty() {
                    return CType::VoidPtr;
                }
                let fields: Vec<(String, CType)> = properties
                    .iter()
                    .map(|(n, v)| (n.clone(), self.expression_type(scope, v)))
                    .collect();
                self.intern_struct(hint, fields)
            }
            _ => {
                self.walk_expr(scope, e, loop_depth, Some(hint));
                self.expression_type(scope, e)
            }
        }
    }

    /// Recursive expression walk for the pre-pass: counts statically provable
    /// `push` calls toward array capacities, refines empty-literal element
    /// types, and interns object-literal shapes found outside declarations.
    fn walk_expr(&mut self, scope: &str, e: &Expr, loop_depth: usize, hint: Option<&str>) {
        match e {
            Expr::Call { callee, arguments } => {
                for a in arguments {
                    self.walk_expr(scope, a, loop_depth, hint);
                }
                if let Expr::Member { object, property } = callee.as_ref() {
                    self.walk_expr(scope, object, loop_depth, hint);
                    if property == "push" && arguments.len() == 1 {
                        if let Expr::Identifier(name) = object.as_ref() {
                            self.note_push(scope, name, &arguments[0], loop_depth);
                        }
                    }
                } else {
                    self.walk_expr(scope, callee, loop_depth, hint);
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                self.walk_expr(scope, left, loop_depth, hint);
                let rhs_hint = match (operator, left.as_ref()) {
                    (BinaryOp::Assign, Expr::Identifier(name)) => Some(name.as_str()),
                    _ => hint,
                };
                if let Expr::ObjectLiteral { .. } = right.as_ref() {
                    self.reconstruct(scope, right, rhs_hint.unwrap_or("obj"), loop_depth);
                } else {
                    self.walk_expr(scope, right, loop_depth, rhs_hint);
                }
            }
            Expr::Prefix { operand, .. } | Expr::Postfix { operand, .. } => {
                self.walk_expr(scope, operand, loop_depth, hint)
            }
            Expr::Member { object, .. } => self.walk_expr(scope, object, loop_depth, hint),
            Expr::Index { object, index } => {
                self.walk_expr(scope, object, loop_depth, hint);
                self.walk_expr(scope, index, loop_depth, hint);
            }
            Expr::ArrayLiteral { elements } => {
                for el in elements {
                    self.walk_expr(scope, el, loop_depth, hint);
                }
            }
            Expr::ObjectLiteral { .. } => {
                self.reconstruct(scope, e, hint.unwrap_or("obj"), loop_depth);
            }
            Expr::Identifier(_) | Expr::Literal(_) => {}
        }
    }

    /// A `push` outside any loop raises the provable capacity bound by one;
    /// under a loop the bound is unprovable, which is recorded, and the array
    /// stays at its literal capacity (it is dynamic either way).
    fn note_push(&mut self, scope: &str, name: &str, argument: &Expr, loop_depth: usize) {
        let arg_type = self.expression_type(scope, argument);
        let Some(key) = self.resolve_key(scope, name) else {
            return;
        };
        let refine = self.untyped_elements.contains(&key) && arg_type != CType::VoidPtr;
        let mut unbounded = false;
        if let Some(info) = self.registry.get_mut(&key) {
            if let CType::Array {
                element,
                capacity,
                dynamic: true,
            } = &mut info.ctype
            {
                if loop_depth == 0 {
                    *capacity += 1;
                } else {
                    unbounded = true;
                }
                if refine {
                    *element = Box::new(arg_type.clone());
                }
            } else {
                return;
            }
        } else {
            return;
        }
        if unbounded {
            self.unbounded_pushes.insert(key.clone());
        }
        if refine {
            self.untyped_elements.remove(&key);
            self.ensure_array_tag(&arg_type);
        }
    }

    fn unify_elements(&self, scope: &str, elements: &[Expr]) -> CType {
        let mut unified: Option<CType> = None;
        for el in elements {
            let t = self.expression_type(scope, el);
            match &unified {
                None => unified = Some(t),
                Some(u) if *u == t => {}
                Some(_) => return CType::VoidPtr,
            }
        }
        unified.unwrap_or(CType::VoidPtr)
    }

    fn intern_struct(&mut self, hint: &str, fields: Vec<(String, CType)>) -> CType {
        let key = shape_key(&fields);
        if let Some(name) = self.struct_shapes.get(&key) {
            let canonical = self.struct_defs.get(name).cloned().unwrap_or(fields);
            return CType::Struct {
                name: name.clone(),
                fields: canonical,
            };
        }
        let base = sanitize(hint);
        let mut name = format!("{}_t", base);
        let mut n = 1;
        while self.struct_defs.contains_key(&name) {
            n += 1;
            name = format!("{}_{}_t", base, n);
        }
        self.struct_shapes.insert(key, name.clone());
        self.struct_defs.insert(name.clone(), fields.clone());
        self.typedefs.push(TypedefRecord::Struct {
            name: name.clone(),
            fields: fields.clone(),
        });
        CType::Struct { name, fields }
    }

    fn find_return_type(&self, scope: &str, stmts: &[Stmt]) -> Option<CType> {
        for stmt in stmts {
            if let Some(t) = self.return_type_in(scope, stmt) {
                return Some(t);
            }
        }
        None
    }

    fn return_type_in(&self, scope: &str, stmt: &Stmt) -> Option<CType> {
        match stmt {
            Stmt::Return { value } => value
                .as_ref()
                .map(|v| self.expression_type(scope, v)),
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => self.return_type_in(scope, then_branch).or_else(|| {
                else_branch
                    .as_ref()
                    .and_then(|e| self.return_type_in(scope, e))
            }),
            Stmt::While { body, .. }
            | Stmt::DoWhile { body, .. }
            | Stmt::For { body, .. }
            | Stmt::ForOf { body, .. }
            | Stmt::ForIn { body, .. } => self.return_type_in(scope, body),
            Stmt::Block { statements } => self.find_return_type(scope, statements),
            _ => None,
        }
    }
}

impl Default for TypeHelper {
    fn default() -> Self {
        Self::new()
    }
}

/// Two object literals with the same field names and types share one emitted
/// struct definition; the key sorts fields by name so source order does not
/// split shapes.
fn shape_key(fields: &[(String, CType)]) -> String {
    let mut parts: Vec<String> = fields
        .iter()
        .map(|(n, t)| format!("{}:{}", n, t.type_string()))
        .collect();
    parts.sort();
    parts.join("|")
}

fn sanitize(hint: &str) -> String {
    let cleaned: String = hint
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().next().unwrap().is_ascii_digit() {
        format!("obj_{}", cleaned)
    } else {
        cleaned
    }
}
