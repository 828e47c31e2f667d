use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::error::*;
use crate::{
    config::Config,
    environment::EnvOverrides,
    errors::EngineError,
    interactive::{self, SpinnerExt as _},
    print_success,
    storage::{is_valid_identifier, OpenOptions, PcuHome, Problem, TestSlot},
    style,
    testing::{self, BuildDir, JudgeReport, Summary},
};

/// Everything a command needs: where pcu keeps its data, the loaded settings, and the
/// directory sources are read from and written to.
#[derive(Debug, Clone)]
pub struct Session {
    pub home: PcuHome,
    pub cfg: Config,
    pub cwd: PathBuf,
}

impl Session {
    pub fn load(home: PcuHome, cwd: impl Into<PathBuf>) -> Result<Self> {
        home.ensure_dirs()
            .with_context(|| format!("Failed to prepare {:?}", home.base()))?;
        let cfg = Config::load(home.settings_file())?;
        Ok(Self {
            home,
            cfg,
            cwd: cwd.into(),
        })
    }

    pub fn open(&self, problem: &str, opts: OpenOptions) -> Result<Problem> {
        Problem::open(&self.home, &self.cfg, problem, opts)
    }

    /// Opens a problem that must already have been made.
    pub fn open_existing(&self, problem: &str) -> Result<Problem> {
        self.open(problem, OpenOptions::default())
    }
}

/// User template from `<home>/templates` if present, else the built-in one.
pub fn load_template(home: &PcuHome, template_file: &str) -> Result<String> {
    let user_template = home.template_file(template_file);
    if user_template.is_file() {
        return Ok(fsutil::read_to_string(&user_template)?);
    }
    Config::default_template(template_file).ok_or_else(|| {
        EngineError::TemplateNotFound {
            name: template_file.to_owned(),
            templates_dir: home.templates_dir(),
        }
        .into()
    })
}

#[derive(Debug, Clone, Default)]
pub struct MakeOptions<'a> {
    pub env: Option<&'a str>,
    pub write_source: bool,
    pub keep_data: bool,
    pub force: bool,
}

/// Creates (or re-creates) a problem and writes its source template to the working directory.
/// Returns the path of the written source, if any.
pub fn make(s: &Session, problem: &str, opts: &MakeOptions) -> Result<Option<PathBuf>> {
    let env = match opts.env {
        Some(name) => s.cfg.env(name)?,
        None => s.cfg.default_env()?,
    };
    let p = s.open(
        problem,
        OpenOptions {
            env: Some(env),
            clean: !opts.keep_data,
            ..Default::default()
        },
    )?;

    let mut written = None;
    if opts.write_source {
        let dest = s.cwd.join(&p.resolved().source_file);
        ensure!(
            opts.force || !dest.exists(),
            "'{}' already exists (use --force to overwrite it)",
            dest.to_string_lossy()
        );
        let template = load_template(&s.home, &p.env().template_file)?;
        fsutil::write_with_mkdir(&dest, p.sub_params(&template))?;
        written = Some(dest);
    }

    print_success!("Made problem '{}' with environment '{}'", p.name(), p.env_name());
    if let Some(dest) = &written {
        println!("Source file: {}", dest.to_string_lossy().bold());
    }
    p.close();
    Ok(written)
}

async fn compile_with_spinner(p: &Problem<'_>, cwd: &Path, build_dir: &BuildDir) -> Result<()> {
    let spinner = interactive::new_spinner(format!("Compiling {}", p.resolved().source_file))
        .with_ticking();
    let res = testing::compile(p, cwd, build_dir).await;
    spinner.lock().await.finish_and_clear();

    if let Err(e) = &res {
        if let Some(EngineError::CompileFailure(failure)) = e.downcast_ref::<EngineError>() {
            eprint!("{}", failure.diagnostics());
        }
    }
    res.map(|_| ())
}

/// Compiles the problem's source. With `local`, the build is kept in `./<problem>_compiled/`.
pub async fn comp(s: &Session, problem: &str, local: bool) -> Result<BuildDir> {
    let p = s.open_existing(problem)?;
    let build_dir = if local {
        BuildDir::local(s.cwd.join(format!("{}_compiled", p.name())))?
    } else {
        BuildDir::temp()?
    };
    compile_with_spinner(&p, &s.cwd, &build_dir).await?;

    print_success!("Compiled '{}'", p.resolved().source_file);
    if let BuildDir::Local(dir) = &build_dir {
        println!("Build directory: {}", dir.to_string_lossy().bold());
    }
    p.close();
    Ok(build_dir)
}

/// Compiles, then judges `test_ids` (every test case when empty).
pub async fn run(s: &Session, problem: &str, test_ids: &[String], json: bool) -> Result<JudgeReport> {
    let p = s.open_existing(problem)?;
    let ids = if test_ids.is_empty() {
        p.list_test_ids()?
    } else {
        p.ensure_tests_exist(test_ids)?;
        test_ids.to_vec()
    };

    let build_dir = BuildDir::temp()?;
    compile_with_spinner(&p, &s.cwd, &build_dir).await?;

    let report = if ids.is_empty() {
        log::warn!("Problem '{}' has no test cases", p.name());
        JudgeReport {
            problem: p.name().to_owned(),
            env_name: p.env_name().to_owned(),
            cases: Vec::new(),
            summary: Summary::default(),
            score: None,
        }
    } else {
        log::info!("Running: {}", p.resolved().run_command);
        testing::judge(&p, build_dir.path(), &ids).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        style::print_judge_report(&report, s.cfg.max_lines_output, s.cfg.max_lines_error);
    }
    p.close();
    Ok(report)
}

fn ensure_valid_test_id(test_id: &str) -> Result<()> {
    ensure!(
        is_valid_identifier(test_id),
        "Invalid test id '{}' (use only letters, digits, '_', '-' and '.')",
        test_id
    );
    Ok(())
}

pub fn get_slot(s: &Session, problem: &str, test_id: &str, slot: TestSlot) -> Result<Vec<u8>> {
    ensure_valid_test_id(test_id)?;
    let p = s.open_existing(problem)?;
    let data = fsutil::read_if_exists(p.test_path(test_id, slot))?.ok_or_else(|| {
        EngineError::TestSlotMissing {
            problem: p.name().to_owned(),
            test_id: test_id.to_owned(),
            slot: slot.describe(),
        }
    })?;
    p.close();
    Ok(data)
}

pub fn set_slot(s: &Session, problem: &str, test_id: &str, slot: TestSlot, data: &[u8]) -> Result<()> {
    ensure_valid_test_id(test_id)?;
    let p = s.open_existing(problem)?;
    fsutil::write_with_mkdir(p.test_path(test_id, slot), data)?;
    log::info!("Saved {} of '{}' ({} bytes)", slot.describe(), test_id, data.len());
    p.close();
    Ok(())
}

/// Deletes the given test cases, or all of them when `test_ids` is empty.
pub fn delete_cases(s: &Session, problem: &str, test_ids: &[String]) -> Result<Vec<String>> {
    let p = s.open_existing(problem)?;
    let ids = if test_ids.is_empty() {
        p.list_test_ids()?
    } else {
        p.ensure_tests_exist(test_ids)?;
        test_ids.to_vec()
    };
    for id in &ids {
        p.remove_test(id)?;
    }
    print_success!("Deleted {} test case(s) of '{}'", ids.len(), p.name());
    p.close();
    Ok(ids)
}

pub fn delete_problem(s: &Session, problem: &str) -> Result<()> {
    ensure!(
        s.home.problem_dir(problem).is_dir(),
        "Problem '{}' does not exist",
        problem
    );
    // the environment only matters for a directory that lost its record
    let p = s.open(
        problem,
        OpenOptions {
            env: Some(s.cfg.default_env()?),
            delete_on_close: true,
            ..Default::default()
        },
    )?;
    p.close();
    print_success!("Deleted problem '{}'", problem);
    Ok(())
}

/// Deletes every problem. Returns the names of the deleted ones.
pub fn delete_all_problems(s: &Session, ask: bool) -> Result<Vec<String>> {
    let names = s.home.problem_names()?;
    if names.is_empty() {
        println!("No problems to delete");
        return Ok(names);
    }
    if ask && !interactive::confirm_delete_problems(&names).context("Failed to read answer")? {
        println!("Aborted");
        return Ok(Vec::new());
    }
    for name in &names {
        delete_problem(s, name)?;
    }
    Ok(names)
}

pub fn change_env(s: &Session, problem: &str, env: &str) -> Result<()> {
    let env = s.cfg.env(env)?;
    let mut p = s.open_existing(problem)?;
    let from = p.env_name().to_owned();
    p.change_env(env)?;
    print_success!("Changed environment of '{}': {} -> {}", p.name(), from, p.env_name());
    p.close();
    Ok(())
}

/// Parses a command line value as TOML, falling back to a plain string.
///
/// ```
/// use pcu_core::action::parse_override_value;
///
/// assert_eq!(parse_override_value("3000"), toml::Value::Integer(3000));
/// assert_eq!(parse_override_value("lax"), toml::Value::String("lax".into()));
/// assert_eq!(parse_override_value("\"a b\""), toml::Value::String("a b".into()));
/// ```
pub fn parse_override_value(raw: &str) -> toml::Value {
    let parsed: std::result::Result<toml::Table, _> = toml::from_str(&format!("v = {}", raw));
    parsed
        .ok()
        .and_then(|mut table| table.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_owned()))
}

/// Sets `key` to `value`, or removes the override when `value` is `None`.
pub fn env_override(s: &Session, problem: &str, key: &str, value: Option<&str>) -> Result<()> {
    let mut p = s.open_existing(problem)?;
    match value {
        Some(raw) => {
            let value = parse_override_value(raw);
            p.set_override(key, value.clone())?;
            print_success!("Override {} = {} for '{}'", key, value, p.name());
        }
        None => {
            if p.remove_override(key)? {
                print_success!("Removed override {} for '{}'", key, p.name());
            } else {
                println!("'{}' has no override for {}", p.name(), key);
            }
        }
    }
    p.close();
    Ok(())
}

pub fn info(s: &Session, problem: &str) -> Result<()> {
    let p = s.open_existing(problem)?;
    let r = p.resolved();

    let row = |k: &str, v: &str| println!("{:>16}: {}", k.cyan().bold(), v);
    row("problem", p.name());
    row("directory", &p.dir().to_string_lossy());
    row("environment", p.env_name());
    row("overrides", &format_overrides(p.overrides()));
    row("source file", &r.source_file);
    row("compile", r.compile_command.as_deref().unwrap_or("(none)"));
    row("run", &r.run_command);
    row("input", &r.input_file);
    row("output", &r.output_file);
    row(
        "limits",
        &format!(
            "compile {} ms, run {} ms",
            r.env.compile_timelimit_msec, r.env.run_timelimit_msec
        ),
    );
    row("strictness", &r.strictness().to_string());
    row("test cases", &p.list_test_ids()?.join(" "));
    p.close();
    Ok(())
}

fn format_overrides(overrides: &EnvOverrides) -> String {
    if overrides.is_empty() {
        return "(none)".to_owned();
    }
    overrides
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn list_envs(cfg: &Config) {
    for env in cfg.envs() {
        let mark = if env.name == cfg.default_env { "*" } else { " " };
        let aliases: Vec<&str> = env.aliases.iter().map(String::as_str).collect();
        println!(
            "{} {:<12} {:<20} {}",
            mark.green().bold(),
            env.name.bold(),
            aliases.join(", ").dimmed(),
            env.source_file
        );
    }
}

pub async fn testgen(
    s: &Session,
    problem: &str,
    executable: &Path,
    n: usize,
    prefix: &str,
) -> Result<Vec<String>> {
    let p = s.open_existing(problem)?;
    let bar = interactive::new_progress_bar(n as u64);
    let res = testing::generate(&p, executable, n, prefix, &bar).await;
    bar.finish_and_clear();

    let ids = res?;
    print_success!("Generated {} test case(s) for '{}'", ids.len(), p.name());
    p.close();
    Ok(ids)
}

#[cfg(test)]
mod test {
    use super::*;

    fn session() -> (tempfile::TempDir, Session) {
        let tmp = tempfile::tempdir().unwrap();
        let home = PcuHome::new(tmp.path().join("home"));
        fsutil::write_with_mkdir(home.settings_file(), "user = \"liz\"\n").unwrap();
        let cwd = tmp.path().join("work");
        fsutil::mkdir_all(&cwd).unwrap();
        let s = Session::load(home, cwd).unwrap();
        (tmp, s)
    }

    #[test]
    fn make_writes_template_with_placeholders() {
        let (_tmp, s) = session();
        let opts = MakeOptions {
            env: Some("py"),
            write_source: true,
            ..Default::default()
        };
        let path = make(&s, "apple", &opts).unwrap().unwrap();
        assert_eq!(path, s.cwd.join("apple.py"));
        let src = fsutil::read_to_string(&path).unwrap();
        assert!(src.contains("liz"));
        assert!(src.contains("apple.py"));

        assert!(make(&s, "apple", &opts).is_err());
        let force = MakeOptions { force: true, ..opts };
        assert!(make(&s, "apple", &force).is_ok());
    }

    #[test]
    fn user_template_wins() {
        let (_tmp, s) = session();
        fsutil::write_with_mkdir(s.home.template_file("py3.py"), "# mine #{problemName}\n").unwrap();
        let opts = MakeOptions {
            env: Some("py3"),
            write_source: true,
            ..Default::default()
        };
        let path = make(&s, "apple", &opts).unwrap().unwrap();
        assert_eq!(fsutil::read_to_string(path).unwrap(), "# mine apple\n");

        assert!(matches!(
            load_template(&s.home, "nope.txt").unwrap_err().downcast_ref::<EngineError>(),
            Some(EngineError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn slots_round_trip_and_missing_slot_is_reported() {
        let (_tmp, s) = session();
        make(&s, "apple", &MakeOptions::default()).unwrap();

        set_slot(&s, "apple", "sample1", TestSlot::Input, b"1 2\n").unwrap();
        assert_eq!(get_slot(&s, "apple", "sample1", TestSlot::Input).unwrap(), b"1 2\n");

        let e = get_slot(&s, "apple", "sample1", TestSlot::Answer).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<EngineError>(),
            Some(EngineError::TestSlotMissing { slot: "answer", .. })
        ));
        assert!(set_slot(&s, "apple", "../evil", TestSlot::Input, b"").is_err());
    }

    #[test]
    fn get_slot_stays_inside_testcases() {
        let (_tmp, s) = session();
        make(&s, "apple", &MakeOptions::default()).unwrap();
        let outside = s.home.problem_dir("apple").join("leak.in");
        fsutil::write(&outside, "secret").unwrap();

        for id in ["../leak", "..", "a/b", ""] {
            let e = get_slot(&s, "apple", id, TestSlot::Input).unwrap_err();
            assert!(e.to_string().starts_with("Invalid test id"), "{}: {}", id, e);
        }
    }

    #[test]
    fn delete_cases_validates_first() {
        let (_tmp, s) = session();
        make(&s, "apple", &MakeOptions::default()).unwrap();
        set_slot(&s, "apple", "a", TestSlot::Input, b"1").unwrap();
        set_slot(&s, "apple", "b", TestSlot::Input, b"2").unwrap();

        assert!(delete_cases(&s, "apple", &["a".to_owned(), "x".to_owned()]).is_err());
        assert_eq!(
            s.open_existing("apple").unwrap().list_test_ids().unwrap(),
            vec!["a", "b"]
        );

        assert_eq!(delete_cases(&s, "apple", &[]).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn delete_problems() {
        let (_tmp, s) = session();
        make(&s, "apple", &MakeOptions::default()).unwrap();
        make(&s, "banana", &MakeOptions::default()).unwrap();

        delete_problem(&s, "apple").unwrap();
        assert!(!s.home.problem_dir("apple").exists());
        assert!(delete_problem(&s, "apple").is_err());

        assert_eq!(delete_all_problems(&s, false).unwrap(), vec!["banana"]);
        assert!(s.home.problem_names().unwrap().is_empty());
    }

    #[test]
    fn env_commands() {
        let (_tmp, s) = session();
        make(&s, "apple", &MakeOptions::default()).unwrap();

        change_env(&s, "apple", "python").unwrap();
        env_override(&s, "apple", "run_timelimit_msec", Some("1500")).unwrap();
        assert!(env_override(&s, "apple", "run_timelimit_msec", Some("fast")).is_err());

        let p = s.open_existing("apple").unwrap();
        assert_eq!(p.env_name(), "py3");
        assert_eq!(p.env().run_timelimit_msec, 1500);
        p.close();

        env_override(&s, "apple", "run_timelimit_msec", None).unwrap();
        assert!(s.open_existing("apple").unwrap().overrides().is_empty());

        assert!(matches!(
            change_env(&s, "apple", "cobol").unwrap_err().downcast_ref::<EngineError>(),
            Some(EngineError::UnknownEnvironment(_))
        ));
    }

    #[tokio::test]
    async fn run_end_to_end() {
        let (_tmp, s) = session();
        let opts = MakeOptions {
            env: Some("sh"),
            ..Default::default()
        };
        make(&s, "apple", &opts).unwrap();
        fsutil::write(s.cwd.join("apple.sh"), "read a b; echo $((a + b))").unwrap();
        set_slot(&s, "apple", "s1", TestSlot::Input, b"1 2\n").unwrap();
        set_slot(&s, "apple", "s1", TestSlot::Answer, b"3\n").unwrap();
        set_slot(&s, "apple", "s2", TestSlot::Input, b"2 2\n").unwrap();
        set_slot(&s, "apple", "s2", TestSlot::Answer, b"5\n").unwrap();

        let report = run(&s, "apple", &[], true).await.unwrap();
        assert_eq!(report.summary.total(), 2);
        assert_eq!(report.score, Some(50.0));

        let e = run(&s, "apple", &["s9".to_owned()], false).await.unwrap_err();
        assert!(matches!(
            e.downcast_ref::<EngineError>(),
            Some(EngineError::UnknownTestId { .. })
        ));
    }

    #[tokio::test]
    async fn run_without_source_fails() {
        let (_tmp, s) = session();
        make(&s, "apple", &MakeOptions::default()).unwrap();
        let e = run(&s, "apple", &[], false).await.unwrap_err();
        assert!(matches!(
            e.downcast_ref::<EngineError>(),
            Some(EngineError::SourceMissing(_))
        ));
    }
}
