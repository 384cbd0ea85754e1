fn main() {
    if let Err(err) = chemspend::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
