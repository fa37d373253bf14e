use std::process;

fn main() {
    match quire_cli::run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("quire error: {err}");
            process::exit(quire_cli::exit_code_for(&err));
        }
    }
}
