use clap::Parser;
use std::{path::PathBuf, process::ExitCode};
use vfunc_rs::{
    types::{repository::Repository, ObjectInfo},
    vtable::host_method_name,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Dump the virtual functions and class struct layout of object types"
)]
struct Args {
    /// JSON metadata file
    metadata: PathBuf,
    /// Only dump this type (default: all types)
    type_name: Option<String>,
}

fn print_type_info(info: &ObjectInfo) {
    println!("\n{}", info.name());

    let struct_info = info.class_struct();
    match &struct_info {
        Some(s) => {
            println!(
                "  Class struct {} ({} bytes, align {}):",
                s.name(),
                s.size(),
                s.align()
            );
            for i in 0..s.n_fields() {
                let Some(field) = s.field(i) else { break };
                let field_type = field.field_type();
                match field_type.as_callback() {
                    Some(cb) => println!("    {:>6}  {}: {}", field.offset(), field.name(), cb),
                    None => println!(
                        "    {:>6}  {}: {}",
                        field.offset(),
                        field.name(),
                        field_type.type_tag()
                    ),
                }
            }
        }
        None => println!("  (No class struct)"),
    }

    println!("  VFuncs:");
    for i in 0..info.n_vfuncs() {
        let Some(vfunc) = info.vfunc(i) else { break };
        let slot = struct_info
            .as_ref()
            .and_then(|s| s.find_field(vfunc.name()))
            .map(|f| f.offset().to_string())
            .unwrap_or_else(|| "MISSING".to_string());
        let reported = vfunc
            .reported_offset()
            .map(|o| o.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "    - {} -> {} at offset {} (vs. {})",
            vfunc.name(),
            host_method_name(vfunc.name()),
            slot,
            reported
        );
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let repository = match Repository::from_path(&args.metadata) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match &args.type_name {
        Some(name) => match repository.find(name) {
            Some(info) => print_type_info(&info),
            None => {
                eprintln!("Type '{}' not found", name);
                println!("\nAvailable types:");
                for t in repository.types() {
                    println!("  {}", t.name());
                }
                return ExitCode::FAILURE;
            }
        },
        None => {
            for t in repository.types() {
                print_type_info(t);
            }
        }
    }
    ExitCode::SUCCESS
}
