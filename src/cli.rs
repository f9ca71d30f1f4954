use crate::ast::Program;
use crate::transpiler::transpile;
use anyhow::bail;
use std::path::PathBuf;

/// Validates that the input file has a .ast.json extension.
fn validate_ast_file(input: &PathBuf) -> anyhow::Result<()> {
    if input
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.ends_with(".ast.json") || n.ends_with(".json"))
    {
        Ok(())
    } else {
        bail!(
            "Input file must be an AST JSON file (.json), but got: {}",
            input.display()
        );
    }
}

fn read_program(input: &PathBuf) -> anyhow::Result<Program> {
    let source = std::fs::read_to_string(input)?;
    let program: Program = serde_json::from_str(&source)?;
    Ok(program)
}

/// Translate an AST JSON file into a C translation unit. On unsupported
/// constructs, print every message and fail without writing output.
pub fn translate(input: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    validate_ast_file(&input)?;
    println!("Translating {}...", input.display());

    let program = read_program(&input)?;

    let c_code = match transpile(&program) {
        Ok(code) => code,
        Err(e) => {
            for message in &e.messages {
                eprintln!("{}", message);
            }
            bail!("{} unsupported construct(s) found", e.messages.len());
        }
    };

    let output_path = output.unwrap_or_else(|| {
        let mut path = input.clone();
        path.set_extension("c");
        path
    });

    std::fs::write(&output_path, c_code)?;

    println!("C code generated successfully: {}", output_path.display());
    Ok(())
}

/// Parse an AST JSON file and echo it back pretty-printed; a quick way to
/// check that a front end produces the shape this crate consumes.
pub fn check_ast(input: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    validate_ast_file(&input)?;
    println!("Checking AST in {}...", input.display());

    let program = read_program(&input)?;
    let json = serde_json::to_string_pretty(&program)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            println!("Normalized AST written to: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub fn version() -> anyhow::Result<()> {
    println!("js2c translator version {}", env!("CARGO_PKG_VERSION"));
    println!("Translates a statically analyzable JavaScript subset to portable C89");
    Ok(())
}
