/// Config file path given as the first argument, if any
pub fn config_path_arg() -> Option<String> {
    std::env::args().nth(1)
}
