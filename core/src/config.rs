use std::{
    collections::BTreeMap,
    fmt::Write as _,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, ensure, Context as _};
use chrono::{DateTime, TimeZone};
use rust_embed::RustEmbed;
use serde::Deserialize;

use crate::environment::Environment;
use crate::errors::EngineError;

/// `user` value meaning "use the login name of whoever runs pcu".
pub const OS_USERNAME: &str = "os_username";

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

/// Settings for one pcu invocation: the built-in defaults overlaid by the user's file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub user: String,
    pub default_env: String,
    pub datetime_format: String,

    #[serde(default = "Config::default_shell")]
    pub shell: PathBuf,

    pub max_lines_output: usize,
    pub max_lines_error: usize,
    pub generator_timelimit_msec: u64,

    #[serde(default)]
    envs: BTreeMap<String, Environment>,

    /// name or alias => name
    #[serde(skip)]
    env_index: BTreeMap<String, String>,
}

impl Config {
    pub const FILENAME: &str = "pcu.toml";
    const USER_FILE_STUB: &str = "# Keys set here override the defaults (see `pcu envs` for environments).\n";

    fn default_shell() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    fn load_asset(path: &str) -> Option<String> {
        let file = Asset::get(path)?;
        std::str::from_utf8(file.data.as_ref())
            .ok()
            .map(ToOwned::to_owned)
    }

    pub fn default_toml() -> anyhow::Result<String> {
        Self::load_asset(Self::FILENAME).context("Built-in default settings are missing")
    }

    /// Built-in source template shipped with pcu, if any.
    pub fn default_template(template_file: &str) -> Option<String> {
        Self::load_asset(&format!("templates/{}", template_file))
    }

    /// Parses the defaults with `user_toml` merged over them.
    pub fn from_toml_layers(default_toml: &str, user_toml: &str) -> anyhow::Result<Self> {
        let mut base: toml::Value =
            toml::from_str(default_toml).context("Invalid built-in settings TOML")?;
        let overlay: toml::Value = toml::from_str(user_toml).context("Invalid settings TOML")?;
        merge_toml(&mut base, overlay);

        let cfg: Self = base.try_into().context("Invalid settings")?;
        cfg.finish()
    }

    pub fn from_user_toml(user_toml: &str) -> anyhow::Result<Self> {
        Self::from_toml_layers(&Self::default_toml()?, user_toml)
    }

    /// Loads `settings_file` over the defaults, creating a stub file when absent.
    pub fn load(settings_file: impl AsRef<Path>) -> anyhow::Result<Self> {
        let settings_file = settings_file.as_ref();
        if !settings_file.is_file() {
            log::debug!("Creating settings stub {:?}", settings_file);
            fsutil::write_with_mkdir(settings_file, Self::USER_FILE_STUB)?;
        }
        let user_toml = fsutil::read_to_string(settings_file)?;
        Self::from_user_toml(&user_toml)
            .with_context(|| format!("Failed to load settings {:?}", settings_file))
    }

    fn finish(mut self) -> anyhow::Result<Self> {
        if self.user == OS_USERNAME {
            self.user = os_username();
        }
        ensure!(
            self.generator_timelimit_msec > 0,
            "generator_timelimit_msec must be positive"
        );

        let mut index = BTreeMap::new();
        for (name, env) in self.envs.iter_mut() {
            env.name = name.clone();
            env.validate()?;
            for key in std::iter::once(name).chain(env.aliases.iter()) {
                if let Some(prev) = index.insert(key.clone(), name.clone()) {
                    bail!(
                        "Environment name or alias '{}' is used by both '{}' and '{}'",
                        key,
                        prev,
                        name
                    );
                }
            }
        }
        self.env_index = index;

        ensure!(
            self.env_index.contains_key(&self.default_env),
            "default_env '{}' is not a known environment",
            self.default_env
        );
        Ok(self)
    }

    /// Looks an environment up by name or alias.
    pub fn env(&self, name_or_alias: &str) -> Result<&Environment, EngineError> {
        self.env_index
            .get(name_or_alias)
            .and_then(|name| self.envs.get(name))
            .ok_or_else(|| EngineError::UnknownEnvironment(name_or_alias.to_owned()))
    }

    pub fn default_env(&self) -> Result<&Environment, EngineError> {
        self.env(&self.default_env)
    }

    pub fn envs(&self) -> impl Iterator<Item = &Environment> {
        self.envs.values()
    }

    pub fn env_names_and_aliases(&self) -> Vec<&str> {
        self.env_index.keys().map(String::as_str).collect()
    }

    pub fn generator_time_limit(&self) -> Duration {
        Duration::from_millis(self.generator_timelimit_msec)
    }

    /// Formats `now` with `datetime_format`; a malformed format is an error, not a panic.
    pub fn timestamp<Tz>(&self, now: &DateTime<Tz>) -> anyhow::Result<String>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let mut s = String::new();
        write!(s, "{}", now.format(&self.datetime_format))
            .map_err(|_| anyhow::anyhow!("Invalid datetime_format '{}'", self.datetime_format))?;
        Ok(s)
    }
}

/// Recursive table merge: tables merge key by key, anything else is replaced.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (k, v) in overlay {
                match base.get_mut(&k) {
                    Some(slot) => merge_toml(slot, v),
                    None => {
                        base.insert(k, v);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn os_username() -> String {
    ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_owned())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::environment::{Strictness, STDIN_SENTINEL};

    #[test]
    fn default_toml_should_be_parsable() {
        let cfg = dbg!(Config::from_user_toml("")).unwrap();

        assert_eq!(cfg.default_env, "cpp");
        assert_eq!(cfg.shell, Path::new("/bin/sh"));
        assert_ne!(cfg.user, OS_USERNAME);

        let cpp = cfg.default_env().unwrap();
        assert_eq!(cpp.name, "cpp");
        assert_eq!(cpp.input_file, STDIN_SENTINEL);
        assert_eq!(cpp.format_strictness, Strictness::Strict);
        assert!(cpp.compile_command.is_some());

        let py = cfg.env("py3").unwrap();
        assert_eq!(py.compile_command, None);
    }

    #[test]
    fn every_default_env_has_a_template() {
        let cfg = Config::from_user_toml("").unwrap();
        for env in cfg.envs() {
            assert!(
                Config::default_template(&env.template_file).is_some(),
                "missing template for {}",
                env.name
            );
        }
    }

    #[test]
    fn aliases_share_the_name_namespace() {
        let cfg = Config::from_user_toml("").unwrap();
        assert_eq!(cfg.env("c++").unwrap().name, "cpp");
        assert!(cfg.env_names_and_aliases().contains(&"c++"));
        assert!(matches!(
            cfg.env("cobol"),
            Err(EngineError::UnknownEnvironment(_))
        ));

        let dup = r##"
            [envs.cxx]
            aliases = ["c++"]
            template_file = "cpp.cpp"
            source_file = "#{problemName}.cxx"
            run_command = "./a.out"
        "##;
        assert!(Config::from_user_toml(dup).is_err());
    }

    #[test]
    fn user_file_overrides_per_field() {
        let user = r#"
            user = "liz"
            [envs.cpp]
            run_timelimit_msec = 9000
            format_strictness = "lax"
        "#;
        let cfg = Config::from_user_toml(user).unwrap();
        let cpp = cfg.env("cpp").unwrap();

        assert_eq!(cfg.user, "liz");
        assert_eq!(cpp.run_timelimit_msec, 9000);
        assert_eq!(cpp.format_strictness, Strictness::Lax);
        assert_eq!(cpp.source_file, "#{problemName}.cpp");
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(Config::from_user_toml("default_env = \"nope\"").is_err());
        assert!(Config::from_user_toml("[envs.cpp]\nrun_timelimit_msec = 0").is_err());
        assert!(Config::from_user_toml("[envs.cpp]\nformat_strictness = \"medium\"").is_err());
        assert!(Config::from_user_toml("verbose = true").is_err());
    }

    #[test]
    fn load_creates_stub_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let cfg = Config::load(&path).unwrap();
        assert!(path.is_file());
        assert_eq!(cfg.default_env, "cpp");
    }

    #[test]
    fn timestamp_uses_configured_format() {
        let mut cfg = Config::from_user_toml("").unwrap();
        let t = chrono::Utc.with_ymd_and_hms(2023, 5, 1, 9, 30, 0).unwrap();

        cfg.datetime_format = "%Y/%m/%d %H:%M".to_owned();
        assert_eq!(cfg.timestamp(&t).unwrap(), "2023/05/01 09:30");

        cfg.datetime_format = "%Q".to_owned();
        assert!(cfg.timestamp(&t).is_err());
    }
}
