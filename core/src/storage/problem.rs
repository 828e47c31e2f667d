use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    environment::{EnvOverrides, Environment, ResolveContext, ResolvedEnvironment},
    errors::EngineError,
};

use super::{is_valid_identifier, FileLock, PcuHome, TestSlot};

/// What is persisted per problem so that later invocations can rebuild its environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub env_name: String,
    #[serde(default)]
    pub env_overrides: EnvOverrides,
}

#[derive(Debug, Clone, Default)]
pub struct OpenOptions<'e> {
    /// Environment for a problem without a record yet. Ignored when a record exists.
    pub env: Option<&'e Environment>,
    /// Replaces the recorded overrides when given.
    pub overrides: Option<EnvOverrides>,
    /// Wipe the problem directory before anything else.
    pub clean: bool,
    /// Remove the problem directory when the guard is closed.
    pub delete_on_close: bool,
}

/// Exclusive handle on one problem's directory.
///
/// The lock on `<home>/.locks/problem.<name>.lock` is held for the lifetime of
/// this value and released by [`Problem::close`] or on drop.
#[derive(Debug)]
pub struct Problem<'c> {
    cfg: &'c Config,
    name: String,
    dir: PathBuf,
    lock: FileLock,
    env_name: String,
    overrides: EnvOverrides,
    resolved: ResolvedEnvironment,
    timestamp: String,
    delete_on_close: bool,
}

impl<'c> Problem<'c> {
    const RECORD_FILENAME: &'static str = "problem_settings.toml";
    const TESTCASES_DIR_NAME: &'static str = "testcases";

    pub fn open(
        home: &PcuHome,
        cfg: &'c Config,
        name: &str,
        opts: OpenOptions,
    ) -> anyhow::Result<Self> {
        if !is_valid_identifier(name) {
            return Err(EngineError::InvalidProblemName(name.to_owned()).into());
        }

        let lock_path = home.lock_file(&format!("problem.{}", name));
        let lock = FileLock::try_acquire(&lock_path)?.ok_or_else(|| EngineError::LockContention {
            problem: name.to_owned(),
            lock_path: lock_path.clone(),
        })?;
        log::debug!("Acquired {:?}", lock.path());

        let dir = home.problem_dir(name);
        let prepared = Self::prepare(cfg, name, &dir, &opts);
        let (base_env, overrides, resolved, timestamp) = match prepared {
            Ok(v) => v,
            Err(e) => {
                if opts.delete_on_close {
                    remove_tree_best_effort(&dir);
                }
                return Err(e);
            }
        };

        let problem = Self {
            cfg,
            name: name.to_owned(),
            dir,
            lock,
            env_name: base_env.name.clone(),
            overrides,
            resolved,
            timestamp,
            delete_on_close: opts.delete_on_close,
        };
        problem.save_record()?;
        Ok(problem)
    }

    fn prepare(
        cfg: &Config,
        name: &str,
        dir: &Path,
        opts: &OpenOptions,
    ) -> anyhow::Result<(Environment, EnvOverrides, ResolvedEnvironment, String)> {
        if opts.clean && dir.exists() {
            log::debug!("Cleaning {:?}", dir);
            fsutil::remove_dir_all(dir)?;
        }

        let record_path = dir.join(Self::RECORD_FILENAME);
        let (base_env, overrides) = if record_path.is_file() {
            let record: ProblemRecord = fsutil::read_toml_with_deserialize(&record_path)?;
            let env = cfg.env(&record.env_name)?.clone();
            let overrides = opts.overrides.clone().unwrap_or(record.env_overrides);
            (env, overrides)
        } else {
            let env = opts
                .env
                .ok_or_else(|| EngineError::UninitializedProblem(name.to_owned()))?
                .clone();
            (env, opts.overrides.clone().unwrap_or_default())
        };

        fsutil::mkdir_all(dir.join(Self::TESTCASES_DIR_NAME))?;

        let timestamp = cfg.timestamp(&chrono::Local::now())?;
        let ctx = ResolveContext {
            problem_name: name,
            user: &cfg.user,
            timestamp: &timestamp,
        };
        let resolved = base_env.resolve(&ctx, &overrides)?;
        Ok((base_env, overrides, resolved, timestamp))
    }

    fn save_record(&self) -> anyhow::Result<()> {
        let record = ProblemRecord {
            env_name: self.env_name.clone(),
            env_overrides: self.overrides.clone(),
        };
        fsutil::write_toml_with_mkdir(self.record_path(), &record)?;
        Ok(())
    }

    /// Re-resolves with a new base environment and overrides, persisting them on success.
    /// On failure the problem keeps its previous state.
    fn update_env(&mut self, base_env: &Environment, overrides: EnvOverrides) -> anyhow::Result<()> {
        let ctx = ResolveContext {
            problem_name: &self.name,
            user: &self.cfg.user,
            timestamp: &self.timestamp,
        };
        self.resolved = base_env.resolve(&ctx, &overrides)?;
        self.env_name = base_env.name.clone();
        self.overrides = overrides;
        self.save_record()
    }

    /// Switches to `env`, keeping the current overrides.
    pub fn change_env(&mut self, env: &Environment) -> anyhow::Result<()> {
        let overrides = self.overrides.clone();
        self.update_env(env, overrides)
            .with_context(|| format!("Cannot switch problem '{}' to '{}'", self.name, env.name))
    }

    pub fn set_override(&mut self, key: &str, value: toml::Value) -> anyhow::Result<()> {
        let base_env = self.cfg.env(&self.env_name)?;
        let mut overrides = self.overrides.clone();
        overrides.insert(key.to_owned(), value);
        self.update_env(base_env, overrides)
    }

    /// Returns whether an override for `key` existed.
    pub fn remove_override(&mut self, key: &str) -> anyhow::Result<bool> {
        let base_env = self.cfg.env(&self.env_name)?;
        let mut overrides = self.overrides.clone();
        if overrides.remove(key).is_none() {
            return Ok(false);
        }
        self.update_env(base_env, overrides)?;
        Ok(true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &'c Config {
        self.cfg
    }

    /// Name of the recorded environment (before overrides).
    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn overrides(&self) -> &EnvOverrides {
        &self.overrides
    }

    /// The environment with overrides merged in.
    pub fn env(&self) -> &Environment {
        &self.resolved.env
    }

    pub fn resolved(&self) -> &ResolvedEnvironment {
        &self.resolved
    }

    pub fn sub_params(&self, s: &str) -> String {
        self.resolved.sub_params(s)
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir.join(Self::RECORD_FILENAME)
    }

    pub fn testcases_dir(&self) -> PathBuf {
        self.dir.join(Self::TESTCASES_DIR_NAME)
    }

    pub fn test_path(&self, test_id: &str, slot: TestSlot) -> PathBuf {
        self.testcases_dir().join(slot.filename(test_id))
    }

    pub fn has_test(&self, test_id: &str) -> bool {
        self.test_path(test_id, TestSlot::Input).is_file()
    }

    /// Sorted ids of every test case that has an input file.
    pub fn list_test_ids(&self) -> anyhow::Result<Vec<String>> {
        let dir = self.testcases_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let suffix = format!(".{}", TestSlot::Input.extension());
        let mut ids: Vec<String> = fsutil::read_dir(&dir)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| name.strip_suffix(&suffix).map(ToOwned::to_owned))
            .filter(|id| !id.is_empty())
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Fails on the first id that has no input file.
    pub fn ensure_tests_exist<S: AsRef<str>>(&self, test_ids: &[S]) -> Result<(), EngineError> {
        match test_ids.iter().find(|id| !self.has_test(id.as_ref())) {
            Some(id) => Err(EngineError::UnknownTestId {
                problem: self.name.clone(),
                test_id: id.as_ref().to_owned(),
            }),
            None => Ok(()),
        }
    }

    /// Removes every slot of a test case.
    pub fn remove_test(&self, test_id: &str) -> fsutil::Result<()> {
        use strum::IntoEnumIterator as _;
        for slot in TestSlot::iter() {
            fsutil::remove_file_if_exists(self.test_path(test_id, slot))?;
        }
        Ok(())
    }

    pub fn mark_for_deletion(&mut self) {
        self.delete_on_close = true;
    }

    /// Releases the lock, deleting the problem first if it was marked for deletion.
    pub fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if !self.lock.is_held() {
            return;
        }
        if self.delete_on_close {
            remove_tree_best_effort(&self.dir);
        }
        self.lock.release();
    }
}

impl Drop for Problem<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

fn remove_tree_best_effort(dir: &Path) {
    match fsutil::remove_all_if_exists(dir) {
        Ok(()) => log::debug!("Removed {:?}", dir),
        Err(e) => log::warn!("{}", e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::environment::Strictness;
    use std::time::{Duration, Instant};

    struct Fixture {
        _tmp: tempfile::TempDir,
        home: PcuHome,
        cfg: Config,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let home = PcuHome::new(tmp.path().join("home"));
        home.ensure_dirs().unwrap();
        let cfg = Config::from_user_toml("user = \"liz\"").unwrap();
        Fixture {
            _tmp: tmp,
            home,
            cfg,
        }
    }

    fn make<'c>(fx: &'c Fixture, name: &str, env: &str) -> Problem<'c> {
        let opts = OpenOptions {
            env: Some(fx.cfg.env(env).unwrap()),
            clean: true,
            ..Default::default()
        };
        Problem::open(&fx.home, &fx.cfg, name, opts).unwrap()
    }

    fn engine_error(e: &anyhow::Error) -> &EngineError {
        e.downcast_ref::<EngineError>().unwrap()
    }

    #[test]
    fn uninitialized_problem_is_rejected() {
        let fx = fixture();
        let e = Problem::open(&fx.home, &fx.cfg, "apple", OpenOptions::default()).unwrap_err();
        assert!(matches!(
            engine_error(&e),
            EngineError::UninitializedProblem(name) if name == "apple"
        ));
    }

    #[test]
    fn invalid_name_is_rejected_before_locking() {
        let fx = fixture();
        for name in ["", "a/b", "..", "x y"] {
            let e = Problem::open(&fx.home, &fx.cfg, name, OpenOptions::default()).unwrap_err();
            assert!(matches!(engine_error(&e), EngineError::InvalidProblemName(_)));
        }
        assert!(fsutil::read_dir(fx.home.locks_dir()).unwrap().next().is_none());
    }

    #[test]
    fn record_is_persisted_and_reloaded() {
        let fx = fixture();
        let p = make(&fx, "apple", "c++");
        assert_eq!(p.env_name(), "cpp");
        assert_eq!(p.resolved().source_file, "apple.cpp");
        let record_path = p.record_path();
        p.close();

        let record: ProblemRecord = fsutil::read_toml_with_deserialize(&record_path).unwrap();
        assert_eq!(record.env_name, "cpp");
        assert!(record.env_overrides.is_empty());

        let p = Problem::open(&fx.home, &fx.cfg, "apple", OpenOptions::default()).unwrap();
        assert_eq!(p.env_name(), "cpp");
        assert_eq!(p.resolved().run_command, "./apple.exe");
    }

    #[test]
    fn record_wins_over_supplied_env() {
        let fx = fixture();
        make(&fx, "apple", "cpp").close();

        let opts = OpenOptions {
            env: Some(fx.cfg.env("py3").unwrap()),
            ..Default::default()
        };
        let p = Problem::open(&fx.home, &fx.cfg, "apple", opts).unwrap();
        assert_eq!(p.env_name(), "cpp");
    }

    #[test]
    fn explicit_overrides_replace_recorded_ones() {
        let fx = fixture();
        let mut p = make(&fx, "apple", "cpp");
        p.set_override("run_timelimit_msec", toml::Value::Integer(1234))
            .unwrap();
        p.close();

        let p = Problem::open(&fx.home, &fx.cfg, "apple", OpenOptions::default()).unwrap();
        assert_eq!(p.env().run_timelimit_msec, 1234);
        p.close();

        let opts = OpenOptions {
            overrides: Some(maplit::btreemap! {
                "format_strictness".to_owned() => toml::Value::String("lax".into()),
            }),
            ..Default::default()
        };
        let p = Problem::open(&fx.home, &fx.cfg, "apple", opts).unwrap();
        assert_eq!(p.env().format_strictness, Strictness::Lax);
        assert_ne!(p.env().run_timelimit_msec, 1234);
    }

    #[test]
    fn invalid_override_keeps_previous_state() {
        let fx = fixture();
        let mut p = make(&fx, "apple", "cpp");
        let before = p.resolved().clone();

        assert!(p
            .set_override("format_strictness", toml::Value::String("medium".into()))
            .is_err());
        assert_eq!(p.resolved(), &before);
        assert!(p.overrides().is_empty());

        assert!(!p.remove_override("run_timelimit_msec").unwrap());
    }

    #[test]
    fn change_env_keeps_overrides() {
        let fx = fixture();
        let mut p = make(&fx, "apple", "cpp");
        p.set_override("run_timelimit_msec", toml::Value::Integer(777))
            .unwrap();
        p.change_env(fx.cfg.env("py").unwrap()).unwrap();

        assert_eq!(p.env_name(), "py3");
        assert_eq!(p.env().run_timelimit_msec, 777);
        assert_eq!(p.resolved().compile_command, None);
    }

    #[test]
    fn second_open_fails_fast_with_lock_contention() {
        let fx = fixture();
        let _held = make(&fx, "apple", "cpp");

        let started = Instant::now();
        let e = Problem::open(&fx.home, &fx.cfg, "apple", OpenOptions::default()).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(engine_error(&e), EngineError::LockContention { .. }));
        assert_eq!(engine_error(&e).exit_code(), 3);

        // other problems are unaffected
        make(&fx, "banana", "cpp").close();
    }

    #[test]
    fn test_ids_come_from_input_files() {
        let fx = fixture();
        let p = make(&fx, "apple", "cpp");
        assert!(p.list_test_ids().unwrap().is_empty());

        for id in ["sample2", "sample1", "gen000000"] {
            fsutil::write(p.test_path(id, TestSlot::Input), "1\n").unwrap();
        }
        fsutil::write(p.test_path("orphan", TestSlot::Answer), "1\n").unwrap();

        assert_eq!(
            p.list_test_ids().unwrap(),
            vec!["gen000000", "sample1", "sample2"]
        );
        assert!(p.ensure_tests_exist(&["sample1"]).is_ok());
        assert!(matches!(
            p.ensure_tests_exist(&["sample1", "orphan"]),
            Err(EngineError::UnknownTestId { test_id, .. }) if test_id == "orphan"
        ));

        p.remove_test("sample1").unwrap();
        assert!(!p.has_test("sample1"));
    }

    #[test]
    fn clean_wipes_previous_content() {
        let fx = fixture();
        let p = make(&fx, "apple", "cpp");
        fsutil::write(p.test_path("sample1", TestSlot::Input), "1\n").unwrap();
        p.close();

        let p = make(&fx, "apple", "cpp");
        assert!(p.list_test_ids().unwrap().is_empty());
    }

    #[test]
    fn delete_on_close_removes_directory() {
        let fx = fixture();
        let mut p = make(&fx, "apple", "cpp");
        let dir = p.dir().to_owned();
        p.mark_for_deletion();
        p.close();
        assert!(!dir.exists());

        // also when the problem was never initialized
        fsutil::mkdir_all(fx.home.problem_dir("ghost")).unwrap();
        let opts = OpenOptions {
            delete_on_close: true,
            ..Default::default()
        };
        assert!(Problem::open(&fx.home, &fx.cfg, "ghost", opts).is_err());
        assert!(!fx.home.problem_dir("ghost").exists());
        make(&fx, "ghost", "cpp").close();
    }
}
