//! kardex-report - Print kardex reports from a stock movements file.

fn main() -> std::process::ExitCode {
    kardex::cmd::report_cmd::main()
}
