fn main() -> laygo22::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    laygo22::cli::run()
}
