#[cfg(test)]
mod tests {
    use crate::ast::{
        BinaryOp, Expr, Literal, Program, Stmt, TypeAnn, VarDeclarator,
    };
    use crate::transpiler::transpile;

    fn num(n: i64) -> Expr {
        Expr::Literal(Literal::Number(n))
    }

    fn boolean(b: bool) -> Expr {
        Expr::Literal(Literal::Boolean(b))
    }

    fn string(s: &str) -> Expr {
        Expr::Literal(Literal::String {
            raw: s.to_string(),
            single_quoted: false,
        })
    }

    fn ident(name: &str) -> Expr {
        Expr::Identifier(name.to_string())
    }

    fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            operator: op,
            right: Box::new(right),
        }
    }

    fn member(object: Expr, property: &str) -> Expr {
        Expr::Member {
            object: Box::new(object),
            property: property.to_string(),
        }
    }

    fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            arguments,
        }
    }

    fn console_log(arguments: Vec<Expr>) -> Stmt {
        Stmt::Expression(call(member(ident("console"), "log"), arguments))
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

    fn declarator(name: &str, init: Option<Expr>) -> VarDeclarator {
        VarDeclarator {
            name: name.to_string(),
            type_ann: None,
            initializer: init,
        }
    }

    fn object(fields: &[(&str, Expr)]) -> Expr {
        Expr::ObjectLiteral {
            properties: fields
                .iter()
                .map(|(n, v)| (n.to_string(), v.clone()))
                .collect(),
        }
    }

    fn program(statements: Vec<Stmt>) -> Program {
        Program { statements }
    }

    // ------------------------------------------------------------- //
    // End-to-end scenarios
    // ------------------------------------------------------------- //

    #[test]
    fn test_array_length_lowers_to_size_field() {
        // let a = [1, 2, 3]; console.log(a.length);
        let out = transpile(&program(vec![
            let_stmt(
                "a",
                Expr::ArrayLiteral {
                    elements: vec![num(1), num(2), num(3)],
                },
            ),
            console_log(vec![member(ident("a"), "length")]),
        ]))
        .unwrap();
        assert!(out.contains("ARRAY_CREATE(a, 6, 3);"), "{}", out);
        assert!(out.contains("printf(\"%d\\n\", a.size);"), "{}", out);
        assert!(out.contains("a.data[0] = 1;"), "{}", out);
        assert!(out.contains("a.data[2] = 3;"), "{}", out);
    }

    #[test]
    fn test_string_equality_lowers_to_strcmp() {
        // let s = "hi"; if (s == "hi") console.log(s);
        let out = transpile(&program(vec![
            let_stmt("s", string("hi")),
            Stmt::If {
                condition: Box::new(binary(ident("s"), BinaryOp::EqualEqual, string("hi"))),
                then_branch: Box::new(console_log(vec![ident("s")])),
                else_branch: None,
            },
        ]))
        .unwrap();
        assert!(out.contains("strcmp(s, \"hi\") == 0"), "{}", out);
        assert!(out.contains("#include <string.h>"), "{}", out);
        assert!(out.contains("printf(\"%s\\n\", s);"), "{}", out);
    }

    #[test]
    fn test_returned_struct_registers_in_global_table() {
        // function make() { let p = { x: 1, y: 2 }; return p; } let q = make();
        let out = transpile(&program(vec![
            Stmt::FunctionDeclaration {
                name: "make".to_string(),
                parameters: vec![],
                return_type: None,
                body: vec![
                    let_stmt("p", object(&[("x", num(1)), ("y", num(2))])),
                    Stmt::Return {
                        value: Some(Box::new(ident("p"))),
                    },
                ],
            },
            let_stmt("q", call(ident("make"), vec![])),
        ]))
        .unwrap();
        assert_eq!(out.matches("struct p_t {").count(), 1, "{}", out);
        assert!(out.contains("p = malloc(sizeof(*p));"), "{}", out);
        assert!(out.contains("assert(p != NULL);"), "{}", out);
        assert!(out.contains("ARRAY_PUSH(gc_global, (void *)p);"), "{}", out);
        assert!(!out.contains("free(p);"), "{}", out);
        assert!(out.contains("struct p_t *make(void);"), "{}", out);
    }

    #[test]
    fn test_multi_declarator_for_hoists_all_but_last() {
        // for (let i = 0, j = 0; i < 10; i++) { j = j + i; }
        let out = transpile(&program(vec![Stmt::For {
            initializer: Some(Box::new(Stmt::VarDeclaration {
                declarators: vec![declarator("i", Some(num(0))), declarator("j", Some(num(0)))],
            })),
            condition: Some(Box::new(binary(ident("i"), BinaryOp::Less, num(10)))),
            increment: Some(Box::new(Expr::Postfix {
                operator: crate::ast::PostfixOp::Increment,
                operand: Box::new(ident("i")),
            })),
            body: Box::new(Stmt::Block {
                statements: vec![Stmt::Expression(binary(
                    ident("j"),
                    BinaryOp::Assign,
                    binary(ident("j"), BinaryOp::Plus, ident("i")),
                ))],
            }),
        }]))
        .unwrap();
        assert!(out.contains("  int16_t i;\n"), "{}", out);
        assert!(out.contains("  int16_t j;\n"), "{}", out);
        assert!(out.contains("i = 0;\n"), "{}", out);
        assert!(out.contains("for (j = 0; i < 10; i++) {"), "{}", out);
        assert!(out.contains("j = j + i;"), "{}", out);
    }

    #[test]
    fn test_for_of_lowers_to_counted_loop() {
        // let arr = [1, 2, 3]; for (let x of arr) console.log(x);
        let out = transpile(&program(vec![
            let_stmt(
                "arr",
                Expr::ArrayLiteral {
                    elements: vec![num(1), num(2), num(3)],
                },
            ),
            Stmt::ForOf {
                binding: "x".to_string(),
                iterable: Box::new(ident("arr")),
                body: Box::new(console_log(vec![ident("x")])),
            },
        ]))
        .unwrap();
        assert!(
            out.contains("for (iterator_1 = 0; iterator_1 < arr.size; iterator_1++) {"),
            "{}",
            out
        );
        assert!(out.contains("x = arr.data[iterator_1];"), "{}", out);
        assert!(out.contains("  int16_t iterator_1;\n"), "{}", out);
        assert!(out.contains("  int16_t x;\n"), "{}", out);
    }

    #[test]
    fn test_assignment_inside_expression_is_reported() {
        // let o = {}; if ((o = { a: 1 })) {}
        let err = transpile(&program(vec![
            let_stmt("o", Expr::ObjectLiteral { properties: vec![] }),
            Stmt::If {
                condition: Box::new(binary(
                    ident("o"),
                    BinaryOp::Assign,
                    object(&[("a", num(1))]),
                )),
                then_branch: Box::new(Stmt::Block { statements: vec![] }),
                else_branch: None,
            },
        ]))
        .unwrap_err();
        assert!(err
            .messages
            .contains(&"Assignments inside expressions are not yet supported.".to_string()));
    }

    // ------------------------------------------------------------- //
    // Invariants
    // ------------------------------------------------------------- //

    #[test]
    fn test_declarations_appear_once_in_prologue() {
        // Declarations land in the prologue even when the source declares
        // inside nested blocks.
        let out = transpile(&program(vec![Stmt::FunctionDeclaration {
            name: "work".to_string(),
            parameters: vec![],
            return_type: None,
            body: vec![
                let_stmt("x", num(1)),
                Stmt::Block {
                    statements: vec![let_stmt("y", num(2))],
                },
            ],
        }]))
        .unwrap();
        assert_eq!(out.matches("int16_t x;").count(), 1, "{}", out);
        assert_eq!(out.matches("int16_t y;").count(), 1, "{}", out);
        let prologue_x = out.find("int16_t x;").unwrap();
        let body_x = out.find("x = 1;").unwrap();
        assert!(prologue_x < body_x, "declaration precedes body use");
    }

    #[test]
    fn test_headers_emitted_once_and_first() {
        let out = transpile(&program(vec![
            let_stmt("s", string("a")),
            let_stmt("t", string("b")),
            Stmt::If {
                condition: Box::new(binary(ident("s"), BinaryOp::EqualEqual, ident("t"))),
                then_branch: Box::new(console_log(vec![ident("s")])),
                else_branch: None,
            },
            console_log(vec![ident("t")]),
        ]))
        .unwrap();
        assert_eq!(out.matches("#include <stdio.h>").count(), 1, "{}", out);
        assert_eq!(out.matches("#include <string.h>").count(), 1, "{}", out);
        let last_include = out.rfind("#include").unwrap();
        let first_code = out.find("int main").unwrap();
        assert!(last_include < first_code, "headers precede code");
    }

    #[test]
    fn test_fixed_array_length_is_a_constant() {
        // let xs: number[3]; console.log(xs.length);
        let out = transpile(&program(vec![
            Stmt::VarDeclaration {
                declarators: vec![VarDeclarator {
                    name: "xs".to_string(),
                    type_ann: Some(TypeAnn::Array {
                        element: Box::new(TypeAnn::Number),
                        capacity: Some(3),
                    }),
                    initializer: None,
                }],
            },
            console_log(vec![member(ident("xs"), "length")]),
        ]))
        .unwrap();
        assert!(out.contains("int16_t xs[3];"), "{}", out);
        assert!(out.contains("printf(\"%d\\n\", 3);"), "{}", out);
        assert!(!out.contains("xs.size"), "{}", out);
        assert!(!out.contains("ARRAY_CREATE(xs"), "{}", out);
    }

    #[test]
    fn test_push_and_pop_lower_to_array_macros() {
        let out = transpile(&program(vec![
            let_stmt("a", Expr::ArrayLiteral { elements: vec![num(1)] }),
            Stmt::Expression(call(member(ident("a"), "push"), vec![num(2)])),
            let_stmt("b", call(member(ident("a"), "pop"), vec![])),
        ]))
        .unwrap();
        assert!(out.contains("ARRAY_PUSH(a, 2);"), "{}", out);
        assert!(out.contains("b = ARRAY_POP(a);"), "{}", out);
        assert!(out.contains("#include \"runtime/array.h\""), "{}", out);
        assert!(out.contains("#include \"runtime/array_pop.h\""), "{}", out);
        assert!(!out.contains(".push("), "{}", out);
        assert!(!out.contains(".pop("), "{}", out);
    }

    #[test]
    fn test_error_accumulation_reports_every_construct() {
        let err = transpile(&program(vec![
            Stmt::ForIn {
                binding: "k".to_string(),
                object: Box::new(ident("o")),
                body: Box::new(Stmt::Block { statements: vec![] }),
            },
            Stmt::Expression(binary(
                num(1),
                BinaryOp::Percent,
                num(2),
            )),
            let_stmt("o", Expr::ObjectLiteral { properties: vec![] }),
            Stmt::If {
                condition: Box::new(binary(
                    ident("o"),
                    BinaryOp::Assign,
                    object(&[("a", num(1))]),
                )),
                then_branch: Box::new(Stmt::Block { statements: vec![] }),
                else_branch: None,
            },
        ]))
        .unwrap_err();
        assert_eq!(err.messages.len(), 3, "{:?}", err.messages);
        assert!(err
            .messages
            .contains(&"For-in statements are not supported.".to_string()));
        assert!(err
            .messages
            .contains(&"Unsupported operator: %.".to_string()));
        assert!(err
            .messages
            .contains(&"Assignments inside expressions are not yet supported.".to_string()));
    }

    // ------------------------------------------------------------- //
    // Statement and expression lowering details
    // ------------------------------------------------------------- //

    #[test]
    fn test_boolean_literals_use_runtime_constants() {
        let out = transpile(&program(vec![
            let_stmt("flag", boolean(true)),
            Stmt::While {
                condition: Box::new(ident("flag")),
                body: Box::new(Stmt::Expression(binary(
                    ident("flag"),
                    BinaryOp::Assign,
                    boolean(false),
                ))),
            },
        ]))
        .unwrap();
        assert!(out.contains("uint8_t flag;"), "{}", out);
        assert!(out.contains("flag = TRUE;"), "{}", out);
        assert!(out.contains("flag = FALSE;"), "{}", out);
        assert!(out.contains("#include \"runtime/bool.h\""), "{}", out);
        assert!(out.contains("while (flag) {"), "{}", out);
    }

    #[test]
    fn test_equality_outside_int16_uses_js_eq() {
        let out = transpile(&program(vec![
            let_stmt("f", boolean(true)),
            let_stmt("g", boolean(false)),
            Stmt::If {
                condition: Box::new(binary(ident("f"), BinaryOp::EqualEqual, ident("g"))),
                then_branch: Box::new(console_log(vec![ident("f")])),
                else_branch: None,
            },
        ]))
        .unwrap();
        assert!(out.contains("js_eq(f, g)"), "{}", out);
        assert!(out.contains("#include \"runtime/js_eq.h\""), "{}", out);
    }

    #[test]
    fn test_not_on_string_checks_emptiness() {
        let out = transpile(&program(vec![
            let_stmt("s", string("x")),
            Stmt::If {
                condition: Box::new(Expr::Prefix {
                    operator: crate::ast::PrefixOp::Not,
                    operand: Box::new(ident("s")),
                }),
                then_branch: Box::new(console_log(vec![string("empty")])),
                else_branch: None,
            },
        ]))
        .unwrap();
        assert!(out.contains("if ((!s || !s[0])) {"), "{}", out);
    }

    #[test]
    fn test_single_quoted_strings_are_reflowed() {
        let out = transpile(&program(vec![let_stmt(
            "s",
            Expr::Literal(Literal::String {
                raw: "it\\'s \"fine\"".to_string(),
                single_quoted: true,
            }),
        )]))
        .unwrap();
        assert!(out.contains("s = \"it's \\\"fine\\\"\";"), "{}", out);
    }

    #[test]
    fn test_object_literal_expands_field_by_field() {
        let out = transpile(&program(vec![let_stmt(
            "p",
            object(&[("x", num(1)), ("label", string("origin"))]),
        )]))
        .unwrap();
        assert!(out.contains("p->x = 1;"), "{}", out);
        assert!(out.contains("p->label = \"origin\";"), "{}", out);
        assert!(out.contains("struct p_t *p = NULL;"), "{}", out);
    }

    #[test]
    fn test_string_keyed_element_access_becomes_member() {
        let out = transpile(&program(vec![
            let_stmt("p", object(&[("x", num(1))])),
            console_log(vec![Expr::Index {
                object: Box::new(ident("p")),
                index: Box::new(string("x")),
            }]),
        ]))
        .unwrap();
        assert!(out.contains("printf(\"%d\\n\", p->x);"), "{}", out);
    }

    #[test]
    fn test_unknown_element_access_falls_back_to_js_get() {
        let out = transpile(&program(vec![
            let_stmt("u", Expr::Literal(Literal::Null)),
            let_stmt("k", num(0)),
            let_stmt(
                "v",
                Expr::Index {
                    object: Box::new(ident("u")),
                    index: Box::new(ident("k")),
                },
            ),
        ]))
        .unwrap();
        assert!(out.contains("v = js_get(u, k);"), "{}", out);
        assert!(out.contains("#include \"runtime/js_eq.h\""), "{}", out);
    }

    #[test]
    fn test_do_while_and_block_braces() {
        let out = transpile(&program(vec![
            let_stmt("i", num(0)),
            Stmt::DoWhile {
                body: Box::new(Stmt::Expression(Expr::Postfix {
                    operator: crate::ast::PostfixOp::Increment,
                    operand: Box::new(ident("i")),
                })),
                condition: Box::new(binary(ident("i"), BinaryOp::Less, num(3))),
            },
        ]))
        .unwrap();
        assert!(out.contains("do {"), "{}", out);
        assert!(out.contains("} while (i < 3);"), "{}", out);
        assert!(out.contains("i++;"), "{}", out);
    }

    #[test]
    fn test_console_log_renders_struct_recursively() {
        let out = transpile(&program(vec![
            let_stmt("p", object(&[("a", num(1)), ("b", string("x"))])),
            console_log(vec![ident("p")]),
        ]))
        .unwrap();
        assert!(
            out.contains("printf(\"{ a: %d, b: \\\"%s\\\" }\\n\", p->a, p->b);"),
            "{}",
            out
        );
    }

    #[test]
    fn test_console_log_dynamic_array_prints_through_loop() {
        let out = transpile(&program(vec![
            let_stmt(
                "a",
                Expr::ArrayLiteral {
                    elements: vec![num(1), num(2)],
                },
            ),
            console_log(vec![ident("a")]),
        ]))
        .unwrap();
        assert!(out.contains("printf(\"[\");"), "{}", out);
        assert!(
            out.contains("if (iterator_1 > 0) printf(\", \");"),
            "{}",
            out
        );
        assert!(out.contains("printf(\"%d\", a.data[iterator_1]);"), "{}", out);
        assert!(out.contains("printf(\"]\");"), "{}", out);
    }

    #[test]
    fn test_console_log_folds_literal_fragments() {
        let out = transpile(&program(vec![
            let_stmt("n", num(7)),
            console_log(vec![string("value:"), ident("n")]),
        ]))
        .unwrap();
        assert!(out.contains("printf(\"value: %d\\n\", n);"), "{}", out);
    }

    #[test]
    fn test_top_level_return_of_pointer_is_reported() {
        // let p = { x: 1 }; return p;  -- main returns int
        let err = transpile(&program(vec![
            let_stmt("p", object(&[("x", num(1))])),
            Stmt::Return {
                value: Some(Box::new(ident("p"))),
            },
        ]))
        .unwrap_err();
        assert!(err
            .messages
            .contains(&"Top-level return values must be numeric.".to_string()));
    }

    #[test]
    fn test_top_level_numeric_return_releases_before_exit() {
        // let a = [1]; return 2;
        let out = transpile(&program(vec![
            let_stmt("a", Expr::ArrayLiteral { elements: vec![num(1)] }),
            Stmt::Return {
                value: Some(Box::new(num(2))),
            },
        ]))
        .unwrap();
        let free_a = out.find("free(a.data);").expect("buffer released");
        let ret = out.find("return 2;").expect("status returned");
        assert!(free_a < ret, "release precedes the return");
    }

    #[test]
    fn test_loop_push_on_escaping_array_is_reported() {
        // function grow() { let a = [1]; while (true) { a.push(2); } return a; }
        let err = transpile(&program(vec![Stmt::FunctionDeclaration {
            name: "grow".to_string(),
            parameters: vec![],
            return_type: None,
            body: vec![
                let_stmt("a", Expr::ArrayLiteral { elements: vec![num(1)] }),
                Stmt::While {
                    condition: Box::new(boolean(true)),
                    body: Box::new(Stmt::Expression(call(
                        member(ident("a"), "push"),
                        vec![num(2)],
                    ))),
                },
                Stmt::Return {
                    value: Some(Box::new(ident("a"))),
                },
            ],
        }]))
        .unwrap_err();
        assert!(err.messages.contains(
            &"push inside a loop is not supported on array 'a' because it outlives its function."
                .to_string()
        ));
    }

    #[test]
    fn test_counted_pushes_on_escaping_array_stay_in_capacity() {
        // Statically counted pushes are pre-sized into the physical
        // capacity, so the registered buffer never moves.
        let out = transpile(&program(vec![
            Stmt::FunctionDeclaration {
                name: "make".to_string(),
                parameters: vec![],
                return_type: None,
                body: vec![
                    let_stmt("a", Expr::ArrayLiteral { elements: vec![num(1)] }),
                    Stmt::Expression(call(member(ident("a"), "push"), vec![num(2)])),
                    Stmt::Return {
                        value: Some(Box::new(ident("a"))),
                    },
                ],
            },
            let_stmt("b", call(ident("make"), vec![])),
        ]))
        .unwrap();
        assert!(out.contains("ARRAY_CREATE(a, 4, 1);"), "{}", out);
        assert!(out.contains("ARRAY_PUSH(gc_global, (void *)a.data);"), "{}", out);
        assert!(!out.contains("free(a.data);"), "{}", out);
    }

    #[test]
    fn test_nested_function_declarations_are_reported() {
        let err = transpile(&program(vec![Stmt::FunctionDeclaration {
            name: "outer".to_string(),
            parameters: vec![],
            return_type: None,
            body: vec![Stmt::FunctionDeclaration {
                name: "inner".to_string(),
                parameters: vec![],
                return_type: None,
                body: vec![],
            }],
        }]))
        .unwrap_err();
        assert!(err
            .messages
            .contains(&"Nested function declarations are not supported.".to_string()));
    }

    #[test]
    fn test_for_of_over_non_identifier_is_reported() {
        let err = transpile(&program(vec![Stmt::ForOf {
            binding: "x".to_string(),
            iterable: Box::new(Expr::ArrayLiteral { elements: vec![num(1)] }),
            body: Box::new(Stmt::Block { statements: vec![] }),
        }]))
        .unwrap_err();
        assert!(err
            .messages
            .contains(&"For-of requires an identifier naming an array-typed variable.".to_string()));
    }

    #[test]
    fn test_function_parameters_use_annotated_types() {
        let out = transpile(&program(vec![Stmt::FunctionDeclaration {
            name: "add".to_string(),
            parameters: vec![
                crate::ast::Parameter {
                    name: "a".to_string(),
                    type_ann: Some(TypeAnn::Number),
                },
                crate::ast::Parameter {
                    name: "b".to_string(),
                    type_ann: Some(TypeAnn::Number),
                },
            ],
            return_type: Some(TypeAnn::Number),
            body: vec![Stmt::Return {
                value: Some(Box::new(binary(ident("a"), BinaryOp::Plus, ident("b")))),
            }],
        }]))
        .unwrap();
        assert!(out.contains("int16_t add(int16_t a, int16_t b);"), "{}", out);
        assert!(out.contains("int16_t add(int16_t a, int16_t b) {"), "{}", out);
        assert!(out.contains("return a + b;"), "{}", out);
    }
}
