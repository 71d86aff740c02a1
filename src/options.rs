use clap::Parser;

/// vedirect-bridge - collects VE.Direct text protocol data from Victron devices
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Optional runtime limit in seconds
    #[clap(short = 't', long = "time")]
    pub runtime: Option<u64>,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let options =
            Options::parse_from(["vedirect-bridge", "-c", "/etc/vedirect.yaml", "--time", "30"]);
        assert_eq!(options.config_file, "/etc/vedirect.yaml");
        assert_eq!(options.runtime, Some(30));
    }

    #[test]
    fn defaults() {
        let options = Options::parse_from(["vedirect-bridge"]);
        assert_eq!(options.config_file, "config.yaml");
        assert_eq!(options.runtime, None);
    }
}
