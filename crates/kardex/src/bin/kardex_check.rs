//! kardex-check - Validate a stock movements file.

fn main() -> std::process::ExitCode {
    kardex::cmd::check::main()
}
