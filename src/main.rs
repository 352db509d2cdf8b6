fn main() {
    if let Err(e) = app_lib::run() {
        log::error!("roleplay_api stopped: {e:#}");
        eprintln!("roleplay_api: {e:#}");
        std::process::exit(1);
    }
}
