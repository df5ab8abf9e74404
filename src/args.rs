use crate::config::{GeneratorPaths, RunConfig, MIN_SEQUENCE_COUNT};
use std::fmt;
use std::path::Path;

/// A correction applied to the configuration before launch. Never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationWarning {
    CountCorrected { requested: u32, corrected: u32 },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationWarning::CountCorrected {
                requested,
                corrected,
            } => write!(
                f,
                "Frame count {} is too small for the selected mode; using {}",
                requested, corrected
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltArgs {
    pub args: Vec<String>,
    /// Frame count actually passed to the generator.
    pub count: u32,
    pub warning: Option<ValidationWarning>,
}

impl BuiltArgs {
    /// The full command line as a single display string.
    pub fn command_line(&self, executable: &Path) -> String {
        let mut line = executable.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Random and smoothing modes need a sequence of at least two frames.
pub fn normalize_count(config: &RunConfig) -> (u32, Option<ValidationWarning>) {
    if config.any_flag() && config.count < 2 {
        (
            MIN_SEQUENCE_COUNT,
            Some(ValidationWarning::CountCorrected {
                requested: config.count,
                corrected: MIN_SEQUENCE_COUNT,
            }),
        )
    } else {
        (config.count, None)
    }
}

pub fn build_args(config: &RunConfig, paths: &GeneratorPaths) -> BuiltArgs {
    let (count, warning) = normalize_count(config);

    let mut args: Vec<String> = Vec::new();
    let mut push = |flag: &str, value: String| {
        args.push(flag.to_string());
        args.push(value);
    };

    push("--seed", config.seed_start.to_string());
    push("--seed2", config.seed_end.to_string());
    push("--num", count.to_string());
    push("--start_index", config.start_index.to_string());

    if config.random_seed {
        push("--random_seed", "1".to_string());
    }
    if config.smooth_z {
        push("--smooth_z", "1".to_string());
    }
    if config.smooth_psi {
        push("--smooth_psi", "1".to_string());
    }

    if let Some(psi) = config.psi {
        push("--psi", psi.to_string());
    }
    if let Some(layers) = config.layers {
        push("--layers", layers.to_string());
    }
    if config.sequential_seeds {
        push("--seed1toN", "1".to_string());
    }

    push("--model", config.model.filename().to_string());
    push("--model_path", model_path_arg(config, paths));

    BuiltArgs {
        args,
        count,
        warning,
    }
}

fn model_path_arg(config: &RunConfig, paths: &GeneratorPaths) -> String {
    let dir = config
        .model_base_path
        .clone()
        .unwrap_or_else(|| paths.model_dir());
    let rendered = dir.display().to_string();
    format!("{}/", rendered.trim_end_matches(['/', '\\']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelId, RunFlag};

    fn paths() -> GeneratorPaths {
        GeneratorPaths::new("/gan/bin", "stylegan")
    }

    fn value_of<'a>(built: &'a BuiltArgs, flag: &str) -> Option<&'a str> {
        built
            .args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| built.args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn plain_run_produces_base_argument_list() {
        let config = RunConfig {
            seed_start: 1,
            seed_end: 2,
            count: 5,
            ..RunConfig::default()
        };
        let built = build_args(&config, &paths());
        assert_eq!(
            built.args,
            vec![
                "--seed",
                "1",
                "--seed2",
                "2",
                "--num",
                "5",
                "--start_index",
                "0",
                "--model",
                "StyleGAN_karras2019stylegan-ffhq-1024x1024.ct4",
                "--model_path",
                "/gan/model/",
            ]
        );
        assert_eq!(built.warning, None);
    }

    #[test]
    fn flagged_run_with_small_count_is_corrected() {
        for flag in [RunFlag::RandomSeed, RunFlag::SmoothZ, RunFlag::SmoothPsi] {
            for count in [0, 1] {
                let mut config = RunConfig {
                    count,
                    ..RunConfig::default()
                };
                config.set_flag(flag, true);
                let built = build_args(&config, &paths());
                assert_eq!(built.count, 10);
                assert_eq!(value_of(&built, "--num"), Some("10"));
                assert_eq!(
                    built.warning,
                    Some(ValidationWarning::CountCorrected {
                        requested: count,
                        corrected: 10
                    })
                );
            }
        }
    }

    #[test]
    fn unflagged_small_count_is_left_alone() {
        let config = RunConfig {
            count: 1,
            ..RunConfig::default()
        };
        let built = build_args(&config, &paths());
        assert_eq!(built.count, 1);
        assert!(built.warning.is_none());
    }

    #[test]
    fn flags_are_emitted_only_when_set() {
        let mut config = RunConfig {
            count: 4,
            ..RunConfig::default()
        };
        config.set_flag(RunFlag::SmoothPsi, true);
        let built = build_args(&config, &paths());
        assert_eq!(value_of(&built, "--smooth_psi"), Some("1"));
        assert!(!built.args.iter().any(|a| a == "--smooth_z"));
        assert!(!built.args.iter().any(|a| a == "--random_seed"));
    }

    #[test]
    fn exactly_one_model_token_for_every_model() {
        for model in ModelId::ALL {
            let config = RunConfig {
                model,
                ..RunConfig::default()
            };
            let built = build_args(&config, &paths());
            assert_eq!(built.args.iter().filter(|a| *a == "--model").count(), 1);
            assert_eq!(value_of(&built, "--model"), Some(model.filename()));
        }
    }

    #[test]
    fn optional_generator_options_precede_model() {
        let config = RunConfig {
            psi: Some(0.5),
            layers: Some(8),
            sequential_seeds: true,
            ..RunConfig::default()
        };
        let built = build_args(&config, &paths());
        let psi = built.args.iter().position(|a| a == "--psi").unwrap();
        let model = built.args.iter().position(|a| a == "--model").unwrap();
        assert!(psi < model);
        assert_eq!(value_of(&built, "--psi"), Some("0.5"));
        assert_eq!(value_of(&built, "--layers"), Some("8"));
        assert_eq!(value_of(&built, "--seed1toN"), Some("1"));
    }

    #[test]
    fn model_path_override_gets_single_trailing_slash() {
        let config = RunConfig {
            model_base_path: Some("/weights/".into()),
            ..RunConfig::default()
        };
        let built = build_args(&config, &paths());
        assert_eq!(value_of(&built, "--model_path"), Some("/weights/"));
    }

    #[test]
    fn command_line_joins_executable_and_args() {
        let built = BuiltArgs {
            args: vec!["--seed".into(), "3".into()],
            count: 1,
            warning: None,
        };
        assert_eq!(
            built.command_line(Path::new("/gan/bin/stylegan")),
            "/gan/bin/stylegan --seed 3"
        );
    }
}
