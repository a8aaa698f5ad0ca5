mod compiler;
mod frontend;
mod lang;
mod runtime;

use std::{env, fs, path::Path, process};

use crate::compiler::quad::CompiledProgram;
use crate::compiler::{compile_source, listing};
use crate::runtime::Vm;

fn main() {
    let args: Vec<String> = env::args().collect();

    let show_quads = args.contains(&"--quads".to_string());
    let emit = args.contains(&"--emit".to_string());

    // first non-flag argument is the filename
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    let Some(filename) = filename else {
        print_usage();
        process::exit(if args.len() > 1 { 1 } else { 0 });
    };

    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some("duck") => {
            let program = compile_file(filename);
            if show_quads {
                print!("{}", listing::render(&program.quads));
            }
            if emit {
                emit_object(filename, &program);
            } else if !show_quads {
                run_program(&program);
            }
        }
        Some("quad") => {
            let program = load_object(filename);
            if show_quads {
                print!("{}", listing::render(&program.quads));
            } else {
                run_program(&program);
            }
        }
        _ => {
            eprintln!("Error: expected a .duck source or .quad object, got {}", filename);
            process::exit(1);
        }
    }
}

fn compile_file(filename: &str) -> CompiledProgram {
    let source = match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            process::exit(1);
        }
    };
    match compile_source(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}: {}", filename, e);
            process::exit(1);
        }
    }
}

fn emit_object(filename: &str, program: &CompiledProgram) {
    let out_path = Path::new(filename).with_extension("quad");
    let bytes = match program.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to encode program: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = fs::write(&out_path, bytes) {
        eprintln!("Failed to write '{}': {}", out_path.display(), e);
        process::exit(1);
    }
}

fn load_object(filename: &str) -> CompiledProgram {
    let bytes = match fs::read(filename) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            process::exit(1);
        }
    };
    match CompiledProgram::from_bytes(&bytes) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("'{}' is not a valid object file: {}", filename, e);
            process::exit(1);
        }
    }
}

fn run_program(program: &CompiledProgram) {
    let result = Vm::new(program).and_then(|mut vm| vm.run());
    if let Err(e) = result {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn print_usage() {
    println!("usage: quadlang [options] <file.duck | file.quad>");
    println!();
    println!("options:");
    println!("  --quads   print the compiled quadruple listing instead of running");
    println!("  --emit    write the compiled program to <file>.quad");
}
