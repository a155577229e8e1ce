// Command line for the participant-facing application

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct TrustcalArgs {
    /// Text file shown on the welcome screen
    #[arg(long, default_value = "PROMPT.txt")]
    pub prompt: PathBuf,

    /// Session configuration in TOML; built-in defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for result files, overriding the configuration
    #[arg(short, long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// TrueType font used for all text
    #[arg(long, default_value = "assets/DejaVuSans.ttf")]
    pub font: PathBuf,

    /// Serial port of the scanning robot. Scans are simulated when omitted
    #[arg(short, long)]
    pub port: Option<PathBuf>,

    /// Baud rate of the serial link
    #[arg(short, long, default_value_t = 9600)]
    pub baud: u32,

    /// Seed for trial order and stimulus generation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Borderless fullscreen on the primary monitor
    #[arg(long)]
    pub fullscreen: bool,

    /// Directory to save a PNG of every presented stimulus
    #[arg(long = "export-stimuli")]
    pub export_stimuli: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = TrustcalArgs::try_parse_from(["trustcal"]).unwrap();
        assert_eq!(args.prompt, PathBuf::from("PROMPT.txt"));
        assert_eq!(args.baud, 9600);
        assert!(args.port.is_none());
        assert!(!args.fullscreen);
    }

    #[test]
    fn all_flags() {
        let args = TrustcalArgs::try_parse_from([
            "trustcal",
            "--prompt",
            "p.txt",
            "--config",
            "session.toml",
            "--output-dir",
            "out",
            "--port",
            "/dev/ttyUSB0",
            "--baud",
            "115200",
            "--seed",
            "42",
            "--fullscreen",
            "--export-stimuli",
            "stimuli",
        ])
        .unwrap();
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert_eq!(args.port, Some(PathBuf::from("/dev/ttyUSB0")));
        assert_eq!(args.baud, 115200);
        assert_eq!(args.seed, Some(42));
        assert!(args.fullscreen);
        assert_eq!(args.export_stimuli, Some(PathBuf::from("stimuli")));
    }
}
