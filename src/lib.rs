use clap::Parser;
use std::{path::PathBuf, process::ExitCode, rc::Rc};

#[macro_use]
pub mod macros;
pub mod class_struct;
pub mod error;
pub mod host;
pub mod layout;
pub mod registry;
pub mod trampoline;
pub mod tracer;
pub mod types;
pub mod value;
pub mod vtable;

use error::DispatchError;
use host::HostRuntime;
use registry::TypeRegistry;
use trampoline::{call_with_zeroed_args, FfiTrampolineFactory};
use tracer::Tracer;
use types::repository::Repository;
use value::HostValue;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Install host-method trampolines into a type's class structure"
)]
pub struct Args {
    /// JSON file describing object types and their class structs
    #[arg(short, long, value_name = "FILE")]
    pub metadata: PathBuf,
    /// The object type to initialize
    #[arg(value_name = "TYPE")]
    pub type_name: String,
    /// Call every installed slot once with zeroed arguments
    #[arg(long)]
    pub call: bool,
}

/// Host side of the CLI: prints each dispatch and answers `void`, so slots
/// with a non-void return yield zero.
struct EchoRuntime;

impl HostRuntime for EchoRuntime {
    fn invoke_method(&self, method: &str, args: &[HostValue]) -> Result<HostValue, DispatchError> {
        println!("    -> {}{:?}", method, args);
        Ok(HostValue::Void)
    }
}

pub fn run_cli() -> ExitCode {
    let args = Args::parse();

    let repository = match Repository::from_path(&args.metadata) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let Some(info) = repository.find(&args.type_name) else {
        eprintln!(
            "type '{}' not found in {}",
            args.type_name,
            args.metadata.display()
        );
        return ExitCode::FAILURE;
    };

    let tracer = Rc::new(Tracer::new());
    let runtime: Rc<dyn HostRuntime> = Rc::new(EchoRuntime);
    let factory = FfiTrampolineFactory::new(runtime, tracer.clone());
    let mut registry = TypeRegistry::new(Box::new(factory), tracer.clone());

    let class = match registry.class_init(&info) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    println!("{} ({} bytes at {:p})", info.name(), class.size(), class.as_ptr());
    for (offset, trampoline) in class.installed() {
        println!(
            "  {:>6}  {:<28} {:p}  {}",
            offset,
            trampoline.method_name(),
            trampoline.entry_point(),
            trampoline.signature()
        );
    }

    if args.call {
        println!("calling installed slots:");
        for (offset, trampoline) in class.installed() {
            println!("  {:>6}  {}", offset, trampoline.method_name());
            // SAFETY: EchoRuntime never dereferences its arguments
            let result = unsafe { call_with_zeroed_args(trampoline) };
            println!("    <- {:#x}", result);
        }
    }
    tracer.flush();
    ExitCode::SUCCESS
}
