//! Command-line options

use std::path::PathBuf;

use clap::Parser;

/// Frames run when no limit is given
pub const DEFAULT_FRAMES: u64 = 1000;

/// Run the sphere collision simulation and log every body contact
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "sphere_app", version, about)]
pub struct Options {
    /// `.toml` or `.ron` simulation config
    pub config: Option<PathBuf>,

    /// Frames to run; 0 runs until stdin reads `quit` or reaches end of input
    #[arg(long, value_name = "N", default_value_t = DEFAULT_FRAMES)]
    pub frames: u64,

    /// Run every frame on the main thread
    #[arg(long)]
    pub single_threaded: bool,

    /// Seed for the random population
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Collision log file
    #[arg(long, value_name = "PATH", default_value = "Output.txt")]
    pub output: PathBuf,
}

impl Options {
    /// Frame limit, `None` when the run is unbounded
    pub const fn frame_limit(&self) -> Option<u64> {
        if self.frames == 0 {
            None
        } else {
            Some(self.frames)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Options, clap::Error> {
        Options::try_parse_from(std::iter::once("sphere_app").chain(args.iter().copied()))
    }

    #[test]
    fn test_command_definition() {
        Options::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let options = parse(&[]).expect("parse");
        assert_eq!(options.config, None);
        assert_eq!(options.frame_limit(), Some(DEFAULT_FRAMES));
        assert!(!options.single_threaded);
        assert_eq!(options.seed, None);
        assert_eq!(options.output, PathBuf::from("Output.txt"));
    }

    #[test]
    fn test_all_options() {
        let options = parse(&[
            "sim.toml",
            "--frames",
            "25",
            "--single-threaded",
            "--seed",
            "9",
            "--output",
            "log.txt",
        ])
        .expect("parse");
        assert_eq!(options.config, Some(PathBuf::from("sim.toml")));
        assert_eq!(options.frame_limit(), Some(25));
        assert!(options.single_threaded);
        assert_eq!(options.seed, Some(9));
        assert_eq!(options.output, PathBuf::from("log.txt"));
    }

    #[test]
    fn test_zero_frames_means_unbounded() {
        assert_eq!(parse(&["--frames", "0"]).expect("parse").frame_limit(), None);
    }

    #[test]
    fn test_errors() {
        assert!(parse(&["--frames"]).is_err());
        assert!(matches!(
            parse(&["--seed", "abc"]).map_err(|e| e.kind()),
            Err(ErrorKind::ValueValidation | ErrorKind::InvalidValue)
        ));
        assert_eq!(parse(&["--fast"]).map_err(|e| e.kind()), Err(ErrorKind::UnknownArgument));
    }
}
