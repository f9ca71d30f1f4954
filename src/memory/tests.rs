#[cfg(test)]
mod tests {
    use crate::ast::{BinaryOp, Expr, Literal, Parameter, Program, Stmt, VarDeclarator};
    use crate::memory::MemoryManager;
    use crate::transpiler::transpile;
    use crate::typing::TypeHelper;

    fn num(n: i64) -> Expr {
        Expr::Literal(Literal::Number(n))
    }

    fn ident(name: &str) -> Expr {
        Expr::Identifier(name.to_string())
    }

    fn point(x: i64, y: i64) -> Expr {
        Expr::ObjectLiteral {
            properties: vec![("x".to_string(), num(x)), ("y".to_string(), num(y))],
        }
    }

    fn let_stmt(name: &str, init: Expr) -> Stmt {
        Stmt::VarDeclaration {
            declarators: vec![VarDeclarator {
                name: name.to_string(),
                type_ann: None,
                initializer: Some(init),
            }],
        }
    }

    fn function(name: &str, body: Vec<Stmt>) -> Stmt {
        Stmt::FunctionDeclaration {
            name: name.to_string(),
            parameters: vec![],
            return_type: None,
            body,
        }
    }

    fn assign(target: &str, value: Expr) -> Stmt {
        Stmt::Expression(Expr::Binary {
            left: Box::new(ident(target)),
            operator: BinaryOp::Assign,
            right: Box::new(value),
        })
    }

    #[test]
    fn test_local_allocations_released_in_reverse_order() {
        let program = Program {
            statements: vec![function(
                "work",
                vec![let_stmt("p", point(1, 2)), let_stmt("q", point(3, 4))],
            )],
        };
        let out = transpile(&program).unwrap();
        let free_q = out.find("free(q);").expect("q released");
        let free_p = out.find("free(p);").expect("p released");
        assert!(free_q < free_p, "releases must be LIFO");
    }

    #[test]
    fn test_destructors_emitted_before_each_return() {
        let program = Program {
            statements: vec![function(
                "work",
                vec![
                    let_stmt("p", point(1, 2)),
                    Stmt::Return {
                        value: Some(Box::new(num(0))),
                    },
                ],
            )],
        };
        let out = transpile(&program).unwrap();
        let free_p = out.find("free(p);").expect("p released");
        let ret = out.find("return 0;").expect("return emitted");
        assert!(free_p < ret, "release precedes the return");
        // The explicit return is the last statement, so there is exactly one
        // release site.
        assert_eq!(out.matches("free(p);").count(), 1);
    }

    #[test]
    fn test_returned_allocation_escapes_to_global_table() {
        let program = Program {
            statements: vec![
                function(
                    "make",
                    vec![
                        let_stmt("p", point(1, 2)),
                        Stmt::Return {
                            value: Some(Box::new(ident("p"))),
                        },
                    ],
                ),
                let_stmt(
                    "q",
                    Expr::Call {
                        callee: Box::new(ident("make")),
                        arguments: vec![],
                    },
                ),
            ],
        };
        let out = transpile(&program).unwrap();
        assert!(out.contains("ARRAY_PUSH(gc_global, (void *)p);"));
        assert!(!out.contains("free(p);"));
        assert!(out.contains("static struct array_ptr_t gc_global;"));
        // Swept once, in insertion order, before main returns.
        assert!(out.contains("free(gc_global.data[gc_i]);"));
        assert!(out.contains("free(gc_global.data);"));
    }

    #[test]
    fn test_store_into_global_escapes() {
        let program = Program {
            statements: vec![
                let_stmt("keep", Expr::Literal(Literal::Null)),
                function(
                    "stash",
                    vec![let_stmt("p", point(1, 2)), assign("keep", ident("p"))],
                ),
            ],
        };
        let mut types = TypeHelper::new();
        types.figure_out_variables_and_types(&program);
        let mut memory = MemoryManager::new();
        memory.preprocess(&program, &mut types);
        assert!(memory.is_escaping("stash.p"));
        assert!(memory.has_escapees());
    }

    #[test]
    fn test_argument_passed_to_function_escapes() {
        // The callee may store what it receives:
        //   let keep = null;
        //   function stash(x) { keep = x; }
        //   function make() { let p = { x: 1, y: 2 }; stash(p); }
        let program = Program {
            statements: vec![
                let_stmt("keep", Expr::Literal(Literal::Null)),
                Stmt::FunctionDeclaration {
                    name: "stash".to_string(),
                    parameters: vec![Parameter {
                        name: "x".to_string(),
                        type_ann: None,
                    }],
                    return_type: None,
                    body: vec![assign("keep", ident("x"))],
                },
                function(
                    "make",
                    vec![
                        let_stmt("p", point(1, 2)),
                        Stmt::Expression(Expr::Call {
                            callee: Box::new(ident("stash")),
                            arguments: vec![ident("p")],
                        }),
                    ],
                ),
            ],
        };
        let mut types = TypeHelper::new();
        types.figure_out_variables_and_types(&program);
        let mut memory = MemoryManager::new();
        memory.preprocess(&program, &mut types);
        assert!(memory.is_escaping("make.p"));

        let out = transpile(&program).unwrap();
        assert!(out.contains("ARRAY_PUSH(gc_global, (void *)p);"), "{}", out);
        assert!(!out.contains("free(p);"), "{}", out);
    }

    #[test]
    fn test_push_into_escaping_container_escapes_transitively() {
        // The array is returned; the element pushed into it must not be
        // released at scope exit either.
        let program = Program {
            statements: vec![function(
                "collect",
                vec![
                    let_stmt("items", Expr::ArrayLiteral { elements: vec![] }),
                    let_stmt("p", point(1, 2)),
                    Stmt::Expression(Expr::Call {
                        callee: Box::new(Expr::Member {
                            object: Box::new(ident("items")),
                            property: "push".to_string(),
                        }),
                        arguments: vec![ident("p")],
                    }),
                    Stmt::Return {
                        value: Some(Box::new(ident("items"))),
                    },
                ],
            )],
        };
        let mut types = TypeHelper::new();
        types.figure_out_variables_and_types(&program);
        let mut memory = MemoryManager::new();
        memory.preprocess(&program, &mut types);
        assert!(memory.is_escaping("collect.items"));
        assert!(memory.is_escaping("collect.p"));
    }

    #[test]
    fn test_local_array_buffer_released_at_main_exit() {
        let program = Program {
            statements: vec![let_stmt(
                "a",
                Expr::ArrayLiteral {
                    elements: vec![num(1), num(2)],
                },
            )],
        };
        let out = transpile(&program).unwrap();
        assert!(out.contains("ARRAY_CREATE(a, 4, 2);"));
        assert!(out.contains("free(a.data);"));
        assert!(!out.contains("gc_global"));
    }

    #[test]
    fn test_array_elements_released_before_backing_buffer() {
        let program = Program {
            statements: vec![function(
                "work",
                vec![let_stmt(
                    "ps",
                    Expr::ArrayLiteral {
                        elements: vec![point(1, 2), point(3, 4)],
                    },
                )],
            )],
        };
        let out = transpile(&program).unwrap();
        let element_free = out
            .find("free(ps.data[gc_i]);")
            .expect("element release loop");
        let buffer_free = out.find("free(ps.data);").expect("buffer release");
        assert!(element_free < buffer_free);
    }
}
