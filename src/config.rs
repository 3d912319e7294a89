// config.rs — viewer configuration: defaults → JSON file → command line
//
// Flags use the `--name=value` form and are matched case-insensitively.
// `-name=value` and `/name=value` are accepted as well.

use crate::error::{Result, ViewerError};
use crate::panorama::{
    Algorithm, ViewDelta, ViewportParameters, DEFAULT_STEP, FOV_MAX, FOV_MIN, PITCH_MAX, PITCH_MIN,
};

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Initial view of one viewport and the angular step used by wheel/keys.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub initial: ViewportParameters,
    pub step: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            initial: ViewportParameters::default(),
            step: DEFAULT_STEP,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmSelection {
    Serial,
    #[default]
    Parallel,
    All,
}

impl AlgorithmSelection {
    pub fn algorithms(self) -> Vec<Algorithm> {
        match self {
            AlgorithmSelection::Serial => vec![Algorithm::Serial],
            AlgorithmSelection::Parallel => vec![Algorithm::Parallel],
            AlgorithmSelection::All => Algorithm::ALL.to_vec(),
        }
    }

    /// Execution strategy for the interactive viewer.
    pub fn primary(self) -> Algorithm {
        match self {
            AlgorithmSelection::Serial => Algorithm::Serial,
            AlgorithmSelection::Parallel | AlgorithmSelection::All => Algorithm::Parallel,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("all") || s == "-1" {
            return Some(AlgorithmSelection::All);
        }
        Algorithm::parse(s).map(|a| match a {
            Algorithm::Serial => AlgorithmSelection::Serial,
            Algorithm::Parallel => AlgorithmSelection::Parallel,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub view: ViewConfig,
    pub delta: ViewDelta,
    pub width_output: u32,
    pub height_output: u32,
    pub algorithm: AlgorithmSelection,
    /// 0 opens the interactive window; anything else runs headless.
    pub iterations: usize,
    pub image: Option<PathBuf>,
    pub lang: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            view: ViewConfig::default(),
            delta: ViewDelta::default(),
            width_output: 1080,
            height_output: 540,
            algorithm: AlgorithmSelection::default(),
            iterations: 0,
            image: None,
            lang: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(ViewerConfig),
    Help,
}

impl ViewerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|e| ViewerError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: ViewerConfig =
            serde_json::from_str(text).map_err(|e| ViewerError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn is_headless(&self) -> bool {
        self.iterations > 0
    }

    pub fn validate(&self) -> Result<()> {
        let v = &self.view.initial;
        check_range("yaw", v.yaw, -180.0, 180.0)?;
        check_range("pitch", v.pitch, PITCH_MIN, PITCH_MAX)?;
        check_range("roll", v.roll, 0.0, 360.0)?;
        check_range("fov", v.fov, FOV_MIN, FOV_MAX)?;
        check_range("step", self.view.step, 0.0, 360.0)?;
        check_range("deltaYaw", self.delta.yaw, -360.0, 360.0)?;
        check_range("deltaPitch", self.delta.pitch, -90.0, 90.0)?;
        check_range("deltaRoll", self.delta.roll, -360.0, 360.0)?;
        if self.width_output == 0 || self.height_output == 0 {
            return Err(ViewerError::InvalidDimensions {
                width: self.width_output,
                height: self.height_output,
            });
        }
        Ok(())
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ViewerError::InvalidArgument(format!(
            "{name} = {value} is outside [{min}, {max}]"
        )))
    }
}

/// Splits `--flag=value` into (flag, value). Leading `-`, `--` or `/` is stripped.
fn split_flag(arg: &str) -> Option<(&str, Option<&str>)> {
    let lead = arg.chars().next()?;
    if lead != '-' && lead != '/' {
        return None;
    }
    let body = arg.trim_start_matches(lead);
    match body.split_once('=') {
        Some((flag, value)) => Some((flag, Some(value))),
        None => Some((body, None)),
    }
}

fn parse_num<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ViewerError::InvalidArgument(format!("illegal value for {flag} ({value})")))
}

/// Parses the process arguments (without the program name).
pub fn parse_args<I, S>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();

    // the config file is the base every other flag overrides
    let mut cfg = ViewerConfig::default();
    for arg in &args {
        if let Some((flag, Some(path))) = split_flag(arg) {
            if flag.eq_ignore_ascii_case("config") {
                cfg = ViewerConfig::from_json_file(Path::new(path))?;
            }
        }
    }

    for arg in &args {
        let Some((flag, value)) = split_flag(arg) else {
            return Err(ViewerError::InvalidArgument(format!("unknown argument = {arg}")));
        };
        let name = flag.to_ascii_lowercase();
        if matches!(name.as_str(), "help" | "h" | "?") {
            return Ok(Command::Help);
        }
        let Some(value) = value else {
            return Err(ViewerError::InvalidArgument(format!(
                "unknown flag or missing value for {arg}"
            )));
        };

        match name.as_str() {
            "config" => {}
            "yaw" => cfg.view.initial.yaw = parse_num(flag, value)?,
            "pitch" => cfg.view.initial.pitch = parse_num(flag, value)?,
            "roll" => cfg.view.initial.roll = parse_num(flag, value)?,
            "fov" => cfg.view.initial.fov = parse_num(flag, value)?,
            "step" => cfg.view.step = parse_num(flag, value)?,
            "deltayaw" => cfg.delta.yaw = parse_num(flag, value)?,
            "deltapitch" => cfg.delta.pitch = parse_num(flag, value)?,
            "deltaroll" => cfg.delta.roll = parse_num(flag, value)?,
            "widthoutput" => cfg.width_output = parse_num(flag, value)?,
            "heightoutput" => cfg.height_output = parse_num(flag, value)?,
            "iterations" => cfg.iterations = parse_num(flag, value)?,
            "algorithm" => {
                cfg.algorithm = AlgorithmSelection::parse(value).ok_or_else(|| {
                    ViewerError::InvalidArgument(format!("illegal value for algorithm ({value})"))
                })?
            }
            "img" | "img0" => cfg.image = Some(PathBuf::from(value)),
            "lang" => cfg.lang = Some(value.to_owned()),
            _ => {
                return Err(ViewerError::InvalidArgument(format!("unknown flag = {arg}")));
            }
        }
    }

    cfg.validate()?;
    Ok(Command::Run(cfg))
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [flags] (flags are case insensitive)
  --img=PATH            equirectangular image to open
  --yaw=N               initial yaw, -180..180 degrees (default 0)
  --pitch=N             initial pitch, -90..90 degrees (default 0)
  --roll=N              initial roll, 0..360 degrees (default 0)
  --fov=N               initial field of view, 10..120 degrees (default 90)
  --step=N              wheel/key increment in degrees (default 10)
  --deltaYaw=N          yaw added every frame, -360..360 (default 0)
  --deltaPitch=N        pitch added every frame, -90..90 (default 0)
  --deltaRoll=N         roll added every frame, -360..360 (default 0)
  --widthOutput=N       headless output width (default 1080)
  --heightOutput=N      headless output height (default 540)
  --algorithm=NAME      serial | parallel | all (default parallel)
  --iterations=N        render N frames headless and report timings (default 0 = interactive)
  --config=PATH         JSON file with any of the settings above
  --lang=CODE           UI language (default en, or EQUIRECT_LANG)
  --help                show this message"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> ViewerConfig {
        match parse_args(args).unwrap() {
            Command::Run(cfg) => cfg,
            Command::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn no_arguments_gives_defaults() {
        let cfg = run(&[]);
        assert_eq!(cfg, ViewerConfig::default());
        assert_eq!(cfg.view.initial, ViewportParameters::default());
        assert_eq!(cfg.view.step, 10.0);
        assert!(!cfg.is_headless());
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = run(&[
            "--yaw=-45",
            "--PITCH=30",
            "-roll=90",
            "/fov=60",
            "--deltaYaw=5",
            "--widthOutput=640",
            "--heightOutput=320",
            "--algorithm=all",
            "--iterations=12",
            "--img=pano.jpg",
            "--lang=ja",
        ]);
        assert_eq!(cfg.view.initial, ViewportParameters::new(-45.0, 30.0, 90.0, 60.0));
        assert_eq!(cfg.delta.yaw, 5.0);
        assert_eq!((cfg.width_output, cfg.height_output), (640, 320));
        assert_eq!(cfg.algorithm.algorithms(), vec![Algorithm::Serial, Algorithm::Parallel]);
        assert_eq!(cfg.iterations, 12);
        assert_eq!(cfg.image.as_deref(), Some(Path::new("pano.jpg")));
        assert_eq!(cfg.lang.as_deref(), Some("ja"));
        assert!(cfg.is_headless());
    }

    #[test]
    fn help_wins() {
        assert_eq!(parse_args(["--yaw=10", "-?"]).unwrap(), Command::Help);
        assert_eq!(parse_args(["--help"]).unwrap(), Command::Help);
    }

    #[test]
    fn rejects_out_of_range_values() {
        for bad in ["--yaw=181", "--pitch=-91", "--roll=361", "--fov=5", "--deltaPitch=100"] {
            assert!(
                matches!(parse_args([bad]), Err(ViewerError::InvalidArgument(_))),
                "{bad}"
            );
        }
        assert!(matches!(
            parse_args(["--widthOutput=0"]),
            Err(ViewerError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert!(parse_args(["pano.jpg"]).is_err());
        assert!(parse_args(["--yaw"]).is_err());
        assert!(parse_args(["--yaw=left"]).is_err());
        assert!(parse_args(["--zoom=3"]).is_err());
        assert!(parse_args(["--algorithm=gpu"]).is_err());
    }

    #[test]
    fn json_config_fills_missing_fields_with_defaults() {
        let cfg = ViewerConfig::from_json(
            r#"{ "view": { "initial": { "fov": 60 }, "step": 5 }, "algorithm": "serial" }"#,
        )
        .unwrap();
        assert_eq!(cfg.view.initial, ViewportParameters::new(0.0, 0.0, 0.0, 60.0));
        assert_eq!(cfg.view.step, 5.0);
        assert_eq!(cfg.algorithm, AlgorithmSelection::Serial);
        assert_eq!(cfg.width_output, 1080);
    }

    #[test]
    fn json_config_is_validated() {
        assert!(ViewerConfig::from_json(r#"{ "view": { "initial": { "pitch": 95 } } }"#).is_err());
        assert!(ViewerConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn command_line_overrides_config_file() {
        let path = std::env::temp_dir().join(format!("equirect-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "view": { "initial": { "yaw": 20, "fov": 70 } } }"#).unwrap();
        let cfg = run(&["--yaw=-30", &format!("--config={}", path.display())]);
        std::fs::remove_file(&path).ok();
        assert_eq!(cfg.view.initial.yaw, -30.0);
        assert_eq!(cfg.view.initial.fov, 70.0);
    }
}
