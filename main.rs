/// Entry point for the application.
///
/// The first argument, if any, is the path of the scene description. Calls `run` and blocks until it completes.
fn main() {
    if let Err(e) = pollster::block_on(raytracing_lib::run(std::env::args().nth(1))) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
