use std::process::ExitCode;

fn main() -> ExitCode {
    vfunc_rs::run_cli()
}
